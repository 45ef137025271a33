//! Integer coordinate algebra of the staggered grid
//!
//! [`Index`] is an absolute cell coordinate, [`Offset`] a signed stride
//! and [`Range`] an inclusive rectangle of indices.
use std::ops::{Add, Mul, Neg, Sub};

/// Absolute cell coordinate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Index {
    /// Column
    pub x: u16,
    /// Row
    pub y: u16,
}

/// Signed direction or stride between two indices
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    /// Column stride
    pub x: i32,
    /// Row stride
    pub y: i32,
}

/// Unit stride in x
pub const IX: Offset = Offset { x: 1, y: 0 };
/// Unit stride in y
pub const IY: Offset = Offset { x: 0, y: 1 };

impl Index {
    /// New index
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl Offset {
    /// New offset
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[inline]
fn shift(value: u16, by: i32) -> u16 {
    let shifted = i32::from(value) + by;
    debug_assert!(
        (0..=i32::from(u16::MAX)).contains(&shifted),
        "Index component {} shifted by {} leaves u16 range.",
        value,
        by
    );
    shifted as u16
}

impl Add<Offset> for Index {
    type Output = Index;

    #[inline]
    fn add(self, o: Offset) -> Index {
        Index::new(shift(self.x, o.x), shift(self.y, o.y))
    }
}

impl Sub<Offset> for Index {
    type Output = Index;

    #[inline]
    fn sub(self, o: Offset) -> Index {
        Index::new(shift(self.x, -o.x), shift(self.y, -o.y))
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, o: Offset) -> Offset {
        Offset::new(self.x + o.x, self.y + o.y)
    }
}

impl Sub for Offset {
    type Output = Offset;

    fn sub(self, o: Offset) -> Offset {
        Offset::new(self.x - o.x, self.y - o.y)
    }
}

impl Neg for Offset {
    type Output = Offset;

    fn neg(self) -> Offset {
        Offset::new(-self.x, -self.y)
    }
}

impl Mul<Offset> for i32 {
    type Output = Offset;

    fn mul(self, o: Offset) -> Offset {
        Offset::new(self * o.x, self * o.y)
    }
}

/// Inclusive rectangle `[begin, end]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// Lower left corner
    pub begin: Index,
    /// Upper right corner (inclusive)
    pub end: Index,
}

impl Range {
    /// New range
    ///
    /// # Panics
    /// Debug builds panic when `begin` is not below or left of `end`.
    pub fn new(begin: Index, end: Index) -> Self {
        debug_assert!(
            begin.x <= end.x && begin.y <= end.y,
            "Range begin {:?} exceeds end {:?}.",
            begin,
            end
        );
        Self { begin, end }
    }

    /// Number of cells in x and y
    pub fn count(&self) -> (usize, usize) {
        (
            usize::from(self.end.x - self.begin.x) + 1,
            usize::from(self.end.y - self.begin.y) + 1,
        )
    }

    /// Total number of cells
    pub fn size(&self) -> usize {
        let (nx, ny) = self.count();
        nx * ny
    }

    /// Whether `index` lies inside
    pub fn contains(&self, index: Index) -> bool {
        (self.begin.x..=self.end.x).contains(&index.x)
            && (self.begin.y..=self.end.y).contains(&index.y)
    }

    /// Whether `other` lies completely inside
    pub fn encloses(&self, other: &Range) -> bool {
        self.contains(other.begin) && self.contains(other.end)
    }

    /// Same rectangle widened by `cells` on every side
    pub fn grow(&self, cells: i32) -> Range {
        let o = Offset::new(cells, cells);
        Range::new(self.begin - o, self.end + o)
    }

    /// Row-major iterator, x runs fastest
    pub fn iter(&self) -> impl Iterator<Item = Index> {
        let Range { begin, end } = *self;
        (begin.y..=end.y).flat_map(move |y| (begin.x..=end.x).map(move |x| Index::new(x, y)))
    }
}

impl Add<Offset> for Range {
    type Output = Range;

    fn add(self, o: Offset) -> Range {
        Range::new(self.begin + o, self.end + o)
    }
}

impl Sub<Offset> for Range {
    type Output = Range;

    fn sub(self, o: Offset) -> Range {
        Range::new(self.begin - o, self.end - o)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_offset_round_trip() {
        let offsets = [IX, IY, -IX, -IY, IX + IY, 2 * IX, 3 * IY - IX];
        for x in 3..12 {
            for y in 3..12 {
                let index = Index::new(x, y);
                for o in offsets {
                    assert_eq!((index + o) - o, index);
                    assert_eq!((index - o) + o, index);
                }
            }
        }
    }

    #[test]
    fn test_range_count() {
        let range = Range::new(Index::new(1, 2), Index::new(4, 8));
        assert_eq!(range.count(), (4, 7));
        assert_eq!(range.size(), 28);
        assert_eq!(range.iter().count(), 28);
        assert_eq!(range.iter().next(), Some(Index::new(1, 2)));
        assert_eq!(range.iter().nth(4), Some(Index::new(1, 3)));
        let wide = range.grow(1);
        assert_eq!(wide.count(), (6, 9));
        assert!(wide.encloses(&range));
        assert!(!range.encloses(&wide));
        assert_eq!((range + IX).begin, Index::new(2, 2));
    }
}
