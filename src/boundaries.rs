//! Edge descriptor of a grid
//!
//! For every side of a grid the descriptor holds the ghost cells of that
//! side and the outward pointing offset. Stepping against the offset from
//! a ghost cell lands on the adjacent interior cell.
use crate::index::{Index, Offset, Range, IX, IY};

/// Side of a rectangular (sub)domain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Larger y
    Top,
    /// Smaller y
    Bottom,
    /// Smaller x
    Left,
    /// Larger x
    Right,
}

impl Side {
    /// All sides in canonical order
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    /// Position in [`Side::ALL`]
    pub fn id(self) -> usize {
        match self {
            Side::Top => 0,
            Side::Bottom => 1,
            Side::Left => 2,
            Side::Right => 3,
        }
    }

    /// Facing side of the neighbour
    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Outward pointing unit offset
    pub fn offset(self) -> Offset {
        match self {
            Side::Top => IY,
            Side::Bottom => -IY,
            Side::Left => -IX,
            Side::Right => IX,
        }
    }

    /// Whether the side is normal to x
    pub fn is_vertical(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }
}

/// Ghost ring of a grid, split into its four edges
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Boundaries {
    edges: [Range; 4],
}

impl Boundaries {
    /// Edges around the interior `[begin, end]`, corners included
    pub fn new(begin: Index, end: Index) -> Self {
        let top = Range::new(
            Index::new(begin.x, end.y) + IY - IX,
            end + IY + IX,
        );
        let bottom = Range::new(
            begin - IY - IX,
            Index::new(end.x, begin.y) + IX - IY,
        );
        let left = Range::new(
            begin - IX - IY,
            Index::new(begin.x, end.y) - IX + IY,
        );
        let right = Range::new(
            Index::new(end.x, begin.y) + IX - IY,
            end + IX + IY,
        );
        Self {
            edges: [top, bottom, left, right],
        }
    }

    /// Ghost cells of `side`, corners included
    pub fn edge(&self, side: Side) -> Range {
        self.edges[side.id()]
    }

    /// Ghost cells of `side` that a halo exchange fills.
    ///
    /// Left and right edges omit the corners, they arrive with the top and
    /// bottom transfers which run afterwards.
    pub fn halo(&self, side: Side) -> Range {
        let edge = self.edge(side);
        if side.is_vertical() {
            Range::new(edge.begin + IY, edge.end - IY)
        } else {
            edge
        }
    }

    /// Interior cells adjacent to the halo of `side`
    pub fn inner(&self, side: Side) -> Range {
        self.halo(side) - side.offset()
    }

    /// `(side, edge, outward offset)` for all four sides
    pub fn iter(&self) -> impl Iterator<Item = (Side, Range, Offset)> + '_ {
        Side::ALL
            .iter()
            .map(move |&side| (side, self.edge(side), side.offset()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_edges() {
        let b = Boundaries::new(Index::new(1, 1), Index::new(4, 3));
        assert_eq!(b.edge(Side::Top), Range::new(Index::new(0, 4), Index::new(5, 4)));
        assert_eq!(b.edge(Side::Bottom), Range::new(Index::new(0, 0), Index::new(5, 0)));
        assert_eq!(b.edge(Side::Left), Range::new(Index::new(0, 0), Index::new(0, 4)));
        assert_eq!(b.edge(Side::Right), Range::new(Index::new(5, 0), Index::new(5, 4)));
        assert_eq!(b.halo(Side::Left), Range::new(Index::new(0, 1), Index::new(0, 3)));
        assert_eq!(b.inner(Side::Right), Range::new(Index::new(4, 1), Index::new(4, 3)));
        assert_eq!(b.inner(Side::Top), Range::new(Index::new(0, 3), Index::new(5, 3)));
        for (side, edge, offset) in b.iter() {
            assert_eq!(offset, side.offset());
            assert_eq!(-side.opposite().offset(), offset);
            assert!(edge.size() > 0);
        }
    }
}
