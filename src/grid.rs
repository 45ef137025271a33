//! # Grid
//! Scalar field on a rectangular subdomain, surrounded by one ring of
//! ghost cells.
//!
//! The interior spans `[begin, end]`, the storage `[begin - 1, end + 1]`.
//! How a coordinate maps into the flat buffer is decided by a [`Layout`],
//! chosen when the grid is built.
//!
//! ```
//! use staggerflow::grid::Grid;
//! use staggerflow::index::{Index, IX};
//! let mut p = Grid::new(Index::new(1, 1), Index::new(4, 4));
//! p[Index::new(2, 3)] = 1.5;
//! assert!((p[Index::new(1, 3) + IX] - 1.5).abs() < 1e-12);
//! ```
use crate::boundaries::Boundaries;
use crate::comm::{Communicator, ReduceOp};
use crate::index::{Index, Range};
use ndarray::Array2;

/// Maps storage coordinates (origin at the lower left ghost cell) to a
/// position in the flat buffer
#[enum_dispatch]
pub trait Indexing {
    /// Buffer position of storage coordinate `(x, y)`
    fn linear(&self, x: usize, y: usize) -> usize;
    /// Required buffer length
    fn capacity(&self) -> usize;
}

/// Row-major layout, x runs fastest
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cartesian {
    size_x: usize,
    size_y: usize,
}

impl Cartesian {
    /// Layout of a `size_x * size_y` buffer
    pub fn new(size_x: usize, size_y: usize) -> Self {
        Self { size_x, size_y }
    }
}

impl Indexing for Cartesian {
    #[inline]
    fn linear(&self, x: usize, y: usize) -> usize {
        x + self.size_x * y
    }

    fn capacity(&self) -> usize {
        self.size_x * self.size_y
    }
}

/// Morton order (z-curve); neighbouring cells stay close in memory in
/// both directions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZOrder {
    side: usize,
}

impl ZOrder {
    /// Layout covering at least `size_x * size_y` cells
    pub fn new(size_x: usize, size_y: usize) -> Self {
        Self {
            side: size_x.max(size_y).next_power_of_two(),
        }
    }
}

/// Spread the lower 16 bits of `v` onto the even bits
#[inline]
fn part1by1(v: usize) -> usize {
    let mut v = v & 0x0000_ffff;
    v = (v | (v << 8)) & 0x00ff_00ff;
    v = (v | (v << 4)) & 0x0f0f_0f0f;
    v = (v | (v << 2)) & 0x3333_3333;
    v = (v | (v << 1)) & 0x5555_5555;
    v
}

impl Indexing for ZOrder {
    #[inline]
    fn linear(&self, x: usize, y: usize) -> usize {
        part1by1(x) | (part1by1(y) << 1)
    }

    fn capacity(&self) -> usize {
        self.side * self.side
    }
}

/// Memory layout of a [`Grid`]
#[enum_dispatch(Indexing)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Row major
    Cartesian,
    /// Morton order
    ZOrder,
}

/// Layout choice without dimensions, as read from settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// See [`Cartesian`]
    Cartesian,
    /// See [`ZOrder`]
    ZOrder,
}

impl LayoutKind {
    fn build(self, size_x: usize, size_y: usize) -> Layout {
        match self {
            LayoutKind::Cartesian => Cartesian::new(size_x, size_y).into(),
            LayoutKind::ZOrder => ZOrder::new(size_x, size_y).into(),
        }
    }
}

/// Scalar field with ghost ring.
///
/// Grids are moved, never cloned.
#[derive(Debug)]
pub struct Grid {
    begin: Index,
    end: Index,
    size_x: usize,
    size_y: usize,
    layout: Layout,
    data: Vec<f64>,
    boundaries: Boundaries,
}

impl Grid {
    /// Zero initialized row-major grid with interior `[begin, end]`
    ///
    /// # Panics
    /// Panics if `begin` is 0 in any direction, there is no room
    /// for the ghost ring then.
    pub fn new(begin: Index, end: Index) -> Self {
        Self::with_layout(begin, end, LayoutKind::Cartesian)
    }

    /// Zero initialized grid with the given memory layout
    ///
    /// # Panics
    /// Panics if `begin` is 0 in any direction.
    pub fn with_layout(begin: Index, end: Index, kind: LayoutKind) -> Self {
        assert!(
            begin.x > 0 && begin.y > 0,
            "Interior must start at 1 or higher, got {:?}.",
            begin
        );
        let range = Range::new(begin, end);
        let (nx, ny) = range.count();
        let (size_x, size_y) = (nx + 2, ny + 2);
        let layout = kind.build(size_x, size_y);
        Self {
            begin,
            end,
            size_x,
            size_y,
            layout,
            data: vec![0.; layout.capacity()],
            boundaries: Boundaries::new(begin, end),
        }
    }

    /// Zero initialized grid of the same shape and layout
    pub fn zeros_like(other: &Grid) -> Self {
        Self {
            begin: other.begin,
            end: other.end,
            size_x: other.size_x,
            size_y: other.size_y,
            layout: other.layout,
            data: vec![0.; other.data.len()],
            boundaries: other.boundaries,
        }
    }

    /// First interior index
    pub fn begin(&self) -> Index {
        self.begin
    }

    /// Last interior index
    pub fn end(&self) -> Index {
        self.end
    }

    /// Interior cells
    pub fn range(&self) -> Range {
        Range::new(self.begin, self.end)
    }

    /// Interior plus ghost ring
    pub fn full_range(&self) -> Range {
        self.range().grow(1)
    }

    /// Ghost ring edges
    pub fn boundaries(&self) -> &Boundaries {
        &self.boundaries
    }

    /// Number of stored columns, ghosts included
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Number of stored rows, ghosts included
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    /// Memory layout
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Storage row of index row `y`, valid for the cartesian layout
    pub(crate) fn storage_row(&self, y: u16) -> usize {
        usize::from(y + 1 - self.begin.y)
    }

    /// Storage column of index column `x`
    pub(crate) fn storage_col(&self, x: u16) -> usize {
        usize::from(x + 1 - self.begin.x)
    }

    /// Raw buffer
    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline]
    fn linear(&self, index: Index) -> usize {
        debug_assert!(
            self.full_range().contains(index),
            "Index {:?} outside of grid {:?}.",
            index,
            self.full_range()
        );
        self.layout
            .linear(self.storage_col(index.x), self.storage_row(index.y))
    }

    /// Copy `range` row by row into `buffer`
    ///
    /// # Panics
    /// Debug builds panic if `range` leaves the grid or `buffer` has
    /// the wrong length.
    pub fn pack(&self, range: Range, buffer: &mut [f64]) {
        debug_assert!(self.full_range().encloses(&range));
        debug_assert_eq!(buffer.len(), range.size());
        let (nx, _) = range.count();
        match self.layout {
            Layout::Cartesian(_) => {
                for (row, y) in buffer.chunks_mut(nx).zip(range.begin.y..=range.end.y) {
                    let start = self.linear(Index::new(range.begin.x, y));
                    row.copy_from_slice(&self.data[start..start + nx]);
                }
            }
            Layout::ZOrder(_) => {
                for (value, index) in buffer.iter_mut().zip(range.iter()) {
                    *value = self[index];
                }
            }
        }
    }

    /// Inverse of [`Grid::pack`]
    ///
    /// # Panics
    /// Debug builds panic if `range` leaves the grid or `buffer` has
    /// the wrong length.
    pub fn unpack(&mut self, range: Range, buffer: &[f64]) {
        debug_assert!(self.full_range().encloses(&range));
        debug_assert_eq!(buffer.len(), range.size());
        let (nx, _) = range.count();
        match self.layout {
            Layout::Cartesian(_) => {
                for (row, y) in buffer.chunks(nx).zip(range.begin.y..=range.end.y) {
                    let start = self.linear(Index::new(range.begin.x, y));
                    self.data[start..start + nx].copy_from_slice(row);
                }
            }
            Layout::ZOrder(_) => {
                for (value, index) in buffer.iter().zip(range.iter()) {
                    self[index] = *value;
                }
            }
        }
    }

    /// Set every stored cell, ghosts included
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Set every cell of `range` from a function of its index
    pub fn fill_with<F: FnMut(Index) -> f64>(&mut self, range: Range, mut f: F) {
        for index in range.iter() {
            self[index] = f(index);
        }
    }

    /// Copy all stored values of a grid with equal shape
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn copy_from(&mut self, other: &Grid) {
        assert!(
            self.begin == other.begin && self.end == other.end && self.layout == other.layout,
            "Shape mismatch in copy_from."
        );
        self.data.copy_from_slice(&other.data);
    }

    /// Largest interior value on this rank
    pub fn local_max(&self) -> f64 {
        self.range()
            .iter()
            .map(|i| self[i])
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest interior value on this rank
    pub fn local_min(&self) -> f64 {
        self.range()
            .iter()
            .map(|i| self[i])
            .fold(f64::INFINITY, f64::min)
    }

    /// Largest interior value over all ranks (collective)
    pub fn max(&self, comm: &dyn Communicator) -> f64 {
        comm.all_reduce(self.local_max(), ReduceOp::Max)
    }

    /// Smallest interior value over all ranks (collective)
    pub fn min(&self, comm: &dyn Communicator) -> f64 {
        comm.all_reduce(self.local_min(), ReduceOp::Min)
    }

    /// Copy `range` into an array indexed `[x, y]`
    pub fn to_array(&self, range: Range) -> Array2<f64> {
        let Range { begin, .. } = range;
        Array2::from_shape_fn(range.count(), |(i, j)| {
            self[Index::new(begin.x + i as u16, begin.y + j as u16)]
        })
    }

    /// Overwrite `range` from an array indexed `[x, y]`
    ///
    /// # Panics
    /// Panics if the array shape does not match `range`.
    pub fn assign(&mut self, range: Range, array: &Array2<f64>) {
        assert_eq!(array.dim(), range.count(), "Shape mismatch in assign.");
        for ((i, j), v) in array.indexed_iter() {
            self[Index::new(range.begin.x + i as u16, range.begin.y + j as u16)] = *v;
        }
    }
}

impl std::ops::Index<Index> for Grid {
    type Output = f64;

    #[inline]
    fn index(&self, index: Index) -> &f64 {
        &self.data[self.linear(index)]
    }
}

impl std::ops::IndexMut<Index> for Grid {
    #[inline]
    fn index_mut(&mut self, index: Index) -> &mut f64 {
        let i = self.linear(index);
        &mut self.data[i]
    }
}
