//! # Iteration engine
//!
//! Traversals that apply an operator to every cell of a [`Range`]:
//! - [`broadcast`]: plain sequential loop, for in-place updates with
//!   dependencies between cells
//! - [`par_broadcast`], [`par_update`]: writes into independent cells,
//!   spread over the rayon pool in tiles of [`BLOCK`] x [`BLOCK`]
//! - [`par_broadcast_parity`]: one colour of a checkerboard, in place
//! - [`broadcast_boundary`]: ghost edges at physical walls only
//! - [`par_reduce`]: parallel reduction with a fixed combination order
//!
//! Each visits every cell of its range exactly once per call.
use crate::boundaries::Side;
use crate::comm::ReduceOp;
use crate::grid::{Grid, Layout};
use crate::index::{Index, Offset, Range, IX};
use crate::partition::Partition;
use rayon::prelude::*;

/// Tile edge length of the parallel traversals
pub const BLOCK: usize = 32;

/// Checkerboard colour, by parity of the global `x + y`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    /// Even `x + y`
    Red,
    /// Odd `x + y`
    Black,
}

impl Parity {
    fn of(self, sum: usize) -> bool {
        match self {
            Parity::Red => sum % 2 == 0,
            Parity::Black => sum % 2 == 1,
        }
    }
}

/// Visit every index of `range` in row-major order
pub fn broadcast<F: FnMut(Index)>(range: Range, mut op: F) {
    for y in range.begin.y..=range.end.y {
        for x in range.begin.x..=range.end.x {
            op(Index::new(x, y));
        }
    }
}

/// `out[I] = op(I)` for every `I` in `range`, in parallel.
///
/// `op` must not read `out`.
pub fn par_broadcast<F>(out: &mut Grid, range: Range, op: F)
where
    F: Fn(Index) -> f64 + Sync,
{
    par_update(out, range, |index, _| op(index));
}

/// `out[I] = op(I, out[I])` for every `I` in `range`, in parallel
pub fn par_update<F>(out: &mut Grid, range: Range, op: F)
where
    F: Fn(Index, f64) -> f64 + Sync,
{
    debug_assert!(out.full_range().encloses(&range));
    if matches!(out.layout(), Layout::Cartesian(_)) {
        update_tiled(out, range, op);
    } else {
        let grid: &Grid = out;
        let rows = per_row(range, |y| {
            (range.begin.x..=range.end.x)
                .map(|x| {
                    let index = Index::new(x, y);
                    op(index, grid[index])
                })
                .collect::<Vec<f64>>()
        });
        for (y, row) in (range.begin.y..=range.end.y).zip(rows) {
            for (x, value) in (range.begin.x..=range.end.x).zip(row) {
                out[Index::new(x, y)] = value;
            }
        }
    }
}

/// Row-major buffers: bands of `BLOCK` rows go to the workers, each
/// band is walked tile by tile
fn update_tiled<F>(out: &mut Grid, range: Range, op: F)
where
    F: Fn(Index, f64) -> f64 + Sync,
{
    let stride = out.size_x();
    let first_row = out.storage_row(range.begin.y);
    let last_row = out.storage_row(range.end.y);
    let first_col = out.storage_col(range.begin.x);
    let rows = &mut out.data_mut()[first_row * stride..(last_row + 1) * stride];

    rows.par_chunks_mut(BLOCK * stride)
        .enumerate()
        .for_each(|(band, chunk)| {
            let y0 = usize::from(range.begin.y) + band * BLOCK;
            let nrows = chunk.len() / stride;
            for bx in (usize::from(range.begin.x)..=usize::from(range.end.x)).step_by(BLOCK) {
                let bx_end = (bx + BLOCK - 1).min(usize::from(range.end.x));
                for r in 0..nrows {
                    let y = (y0 + r) as u16;
                    let row = &mut chunk[r * stride..(r + 1) * stride];
                    for x in bx..=bx_end {
                        let cell = &mut row[first_col + x - usize::from(range.begin.x)];
                        *cell = op(Index::new(x as u16, y), *cell);
                    }
                }
            }
        });
}

/// Evaluate `f` for every row of `range` in parallel, results in row order
fn per_row<T, F>(range: Range, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(u16) -> T + Sync,
{
    (usize::from(range.begin.y)..=usize::from(range.end.y))
        .into_par_iter()
        .map(|y| f(y as u16))
        .collect()
}

/// In-place update of the cells of one colour: `grid[I] = op(grid, I)`
/// for every `I` in `range` whose global `x + y` has `parity`.
///
/// `origin` is added to local indices to get the global parity. All
/// new values are computed from the old grid, then written back, so
/// `op` may read any cell of the other colour.
pub fn par_broadcast_parity<F>(grid: &mut Grid, range: Range, parity: Parity, origin: [usize; 2], op: F)
where
    F: Fn(&Grid, Index) -> f64 + Sync,
{
    let first_x = |y: u16| {
        let sum = origin[0] + origin[1] + usize::from(range.begin.x) + usize::from(y);
        if parity.of(sum) {
            range.begin.x
        } else {
            range.begin.x + 1
        }
    };
    let old: &Grid = grid;
    let rows = per_row(range, |y| {
        (first_x(y)..=range.end.x)
            .step_by(2)
            .map(|x| op(old, Index::new(x, y)))
            .collect::<Vec<f64>>()
    });
    for (y, row) in (range.begin.y..=range.end.y).zip(rows) {
        for (x, value) in (first_x(y)..=range.end.x).step_by(2).zip(row) {
            grid[Index::new(x, y)] = value;
        }
    }
}

/// Apply `op(grid, side, I, outward)` to every ghost cell on the sides
/// where `partition` has a wall. Halos facing other ranks are skipped.
///
/// A corner between two walls belongs to the left or right wall, which
/// runs after top and bottom.
pub fn broadcast_boundary<F>(grid: &mut Grid, partition: &Partition, mut op: F)
where
    F: FnMut(&mut Grid, Side, Index, Offset),
{
    let boundaries = *grid.boundaries();
    for (side, edge, offset) in boundaries.iter() {
        if !partition.is_wall(side) {
            continue;
        }
        let mut edge = edge;
        if !side.is_vertical() {
            if partition.is_wall(Side::Left) {
                edge.begin = edge.begin + IX;
            }
            if partition.is_wall(Side::Right) {
                edge.end = edge.end - IX;
            }
        }
        broadcast(edge, |index| op(grid, side, index, offset));
    }
}

/// Reduce `op(I)` over `range` with `kind`.
///
/// Rows are reduced in parallel, the row results in order, so the
/// result does not depend on scheduling.
pub fn par_reduce<F>(range: Range, kind: ReduceOp, op: F) -> f64
where
    F: Fn(Index) -> f64 + Sync,
{
    let identity = match kind {
        ReduceOp::Sum => 0.,
        ReduceOp::Max => f64::NEG_INFINITY,
        ReduceOp::Min => f64::INFINITY,
    };
    per_row(range, |y| {
        (range.begin.x..=range.end.x).fold(identity, |acc, x| kind.apply(acc, op(Index::new(x, y))))
    })
    .into_iter()
    .fold(identity, |a, b| kind.apply(a, b))
}
