//! # Domain decomposition
//!
//! The global `nx * ny` cells are split over a `px * py` process grid.
//! Rank `r` sits in column `r % px` and row `r / px`; row 0 is the top
//! row. Each rank gets `floor(nx / px) * floor(ny / py)` cells, the
//! rightmost column and the bottom row of ranks take the remainder.
//!
//! ```
//! use staggerflow::partition::{Neighbour, Partition};
//! use staggerflow::boundaries::Side;
//! let info = Partition::new([20, 20], 0, 4).unwrap();
//! assert_eq!(info.dims, [2, 2]);
//! assert_eq!(info.neighbour(Side::Right), Neighbour::Rank(1));
//! assert_eq!(info.neighbour(Side::Bottom), Neighbour::Rank(2));
//! assert_eq!(info.neighbour(Side::Top).code(), -2);
//! ```
use crate::boundaries::Side;
use crate::error::{Error, Result};
use crate::index::{Index, Range};
use std::fmt;

/// Smallest number of cells a rank may own per direction
pub const MIN_LOCAL_CELLS: usize = 2;

/// What lies beyond one side of a subdomain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbour {
    /// Another rank, ghost cells come from a halo exchange
    Rank(usize),
    /// Physical domain boundary, ghost cells come from boundary conditions
    Wall(Side),
}

impl Neighbour {
    /// Rank id, or a negative code for walls (-1 left, -2 top, -3 right,
    /// -4 bottom)
    pub fn code(&self) -> i64 {
        match *self {
            Neighbour::Rank(r) => r as i64,
            Neighbour::Wall(Side::Left) => -1,
            Neighbour::Wall(Side::Top) => -2,
            Neighbour::Wall(Side::Right) => -3,
            Neighbour::Wall(Side::Bottom) => -4,
        }
    }

    /// Rank id, `None` at walls
    pub fn rank(&self) -> Option<usize> {
        match *self {
            Neighbour::Rank(r) => Some(r),
            Neighbour::Wall(_) => None,
        }
    }
}

/// Subdomain of one rank
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// Id of this rank
    pub rank: usize,
    /// Number of ranks
    pub size: usize,
    /// Process grid `[px, py]`
    pub dims: [usize; 2],
    /// Position `[column, row]` in the process grid, row 0 on top
    pub coords: [usize; 2],
    /// Global cell counts
    pub global_cells: [usize; 2],
    /// Local cell counts
    pub cells: [usize; 2],
    /// Global index of the first local cell, counted from the lower left
    pub offset: [usize; 2],
    neighbours: [Neighbour; 4],
}

impl Partition {
    /// Subdomain of `rank` when `global_cells` are split over `size` ranks
    ///
    /// # Errors
    /// When no process grid gives every rank at least
    /// [`MIN_LOCAL_CELLS`] cells per direction, or when local
    /// grids would overflow the index type.
    pub fn new(global_cells: [usize; 2], rank: usize, size: usize) -> Result<Self> {
        if rank >= size {
            return Err(Error::Decomposition(format!(
                "rank {} out of {} ranks",
                rank, size
            )));
        }
        let dims = Self::process_grid(global_cells, size)?;
        let [px, py] = dims;
        let coords = [rank % px, rank / px];
        let [col, row] = coords;

        let base = [global_cells[0] / px, global_cells[1] / py];
        let rem = [global_cells[0] % px, global_cells[1] % py];
        let cells = [
            base[0] + if col == px - 1 { rem[0] } else { 0 },
            base[1] + if row == py - 1 { rem[1] } else { 0 },
        ];
        // bottom row starts at y = 0 and holds the remainder
        let rows_below = py - 1 - row;
        let offset = [
            col * base[0],
            if rows_below == 0 {
                0
            } else {
                rem[1] + rows_below * base[1]
            },
        ];

        if cells.iter().any(|&n| n + 2 > usize::from(u16::MAX)) {
            return Err(Error::Decomposition(format!(
                "local grid {:?} exceeds the index range",
                cells
            )));
        }

        let neighbours = [
            if row == 0 {
                Neighbour::Wall(Side::Top)
            } else {
                Neighbour::Rank(rank - px)
            },
            if row == py - 1 {
                Neighbour::Wall(Side::Bottom)
            } else {
                Neighbour::Rank(rank + px)
            },
            if col == 0 {
                Neighbour::Wall(Side::Left)
            } else {
                Neighbour::Rank(rank - 1)
            },
            if col == px - 1 {
                Neighbour::Wall(Side::Right)
            } else {
                Neighbour::Rank(rank + 1)
            },
        ];

        Ok(Self {
            rank,
            size,
            dims,
            coords,
            global_cells,
            cells,
            offset,
            neighbours,
        })
    }

    /// Process grid `[px, py]` with `px * py = size` whose aspect ratio
    /// is closest to that of the cell grid
    ///
    /// # Errors
    /// When no factorization leaves at least [`MIN_LOCAL_CELLS`]
    /// cells per rank and direction.
    pub fn process_grid(global_cells: [usize; 2], size: usize) -> Result<[usize; 2]> {
        let [nx, ny] = global_cells;
        if size == 0 || nx == 0 || ny == 0 {
            return Err(Error::Decomposition(format!(
                "{} ranks for {}x{} cells",
                size, nx, ny
            )));
        }
        let aspect = nx as f64 / ny as f64;
        (1..=size)
            .filter(|px| size % px == 0)
            .map(|px| [px, size / px])
            .filter(|[px, py]| nx / px >= MIN_LOCAL_CELLS && ny / py >= MIN_LOCAL_CELLS)
            .fold(None, |best: Option<([usize; 2], f64)>, dims| {
                let misfit = (dims[0] as f64 / dims[1] as f64 - aspect).abs();
                match best {
                    Some((_, m)) if m <= misfit => best,
                    _ => Some((dims, misfit)),
                }
            })
            .map(|(dims, _)| dims)
            .ok_or_else(|| {
                Error::Decomposition(format!(
                    "{} ranks can not share {}x{} cells with at least {} cells each way",
                    size, nx, ny, MIN_LOCAL_CELLS
                ))
            })
    }

    /// Neighbour beyond `side`
    pub fn neighbour(&self, side: Side) -> Neighbour {
        self.neighbours[side.id()]
    }

    /// Whether `side` is a physical domain boundary
    pub fn is_wall(&self, side: Side) -> bool {
        matches!(self.neighbour(side), Neighbour::Wall(_))
    }

    /// Interior index range of the local cells
    pub fn range(&self) -> Range {
        Range::new(
            Index::new(1, 1),
            Index::new(self.cells[0] as u16, self.cells[1] as u16),
        )
    }

    /// Global cell coordinate of a local index, counted from the lower
    /// left interior cell
    pub fn global(&self, index: Index) -> [usize; 2] {
        [
            self.offset[0] + usize::from(index.x) - 1,
            self.offset[1] + usize::from(index.y) - 1,
        ]
    }

    /// Total number of cells of the global domain
    pub fn global_size(&self) -> usize {
        self.global_cells[0] * self.global_cells[1]
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<i64> = Side::ALL.iter().map(|&s| self.neighbour(s).code()).collect();
        write!(
            f,
            "rank {}/{} at {:?} of {:?}: {}x{} cells from {:?}, neighbours (t,b,l,r) {:?}",
            self.rank,
            self.size,
            self.coords,
            self.dims,
            self.cells[0],
            self.cells[1],
            self.offset,
            codes
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_process_grid() {
        assert_eq!(Partition::process_grid([20, 20], 4).unwrap(), [2, 2]);
        assert_eq!(Partition::process_grid([40, 10], 4).unwrap(), [4, 1]);
        assert_eq!(Partition::process_grid([10, 40], 4).unwrap(), [1, 4]);
        assert_eq!(Partition::process_grid([30, 20], 6).unwrap(), [3, 2]);
        assert_eq!(Partition::process_grid([7, 7], 1).unwrap(), [1, 1]);
        assert!(Partition::process_grid([3, 3], 4).is_err());
        assert!(Partition::process_grid([20, 20], 0).is_err());
    }

    #[test]
    fn test_cells_cover_domain() {
        for (nx, ny) in [(20, 20), (23, 17), (9, 31), (64, 5)] {
            for size in 1..=8 {
                let parts: Vec<Partition> = match (0..size)
                    .map(|r| Partition::new([nx, ny], r, size))
                    .collect::<Result<Vec<_>>>()
                {
                    Ok(parts) => parts,
                    Err(_) => continue,
                };
                let total: usize = parts.iter().map(|p| p.cells[0] * p.cells[1]).sum();
                assert_eq!(total, nx * ny);

                let mut owner = vec![0usize; nx * ny];
                for p in &parts {
                    assert!(p.cells[0] >= MIN_LOCAL_CELLS && p.cells[1] >= MIN_LOCAL_CELLS);
                    for i in p.range().iter() {
                        let [gx, gy] = p.global(i);
                        owner[gx + nx * gy] += 1;
                    }
                }
                assert!(owner.iter().all(|&n| n == 1));
            }
        }
    }

    #[test]
    fn test_neighbours() {
        // 3 x 2 process grid
        let p = Partition::new([30, 20], 4, 6).unwrap();
        assert_eq!(p.coords, [1, 1]);
        assert_eq!(p.neighbour(Side::Top), Neighbour::Rank(1));
        assert_eq!(p.neighbour(Side::Bottom).code(), -4);
        assert_eq!(p.neighbour(Side::Left), Neighbour::Rank(3));
        assert_eq!(p.neighbour(Side::Right), Neighbour::Rank(5));
        assert_eq!(p.offset, [10, 0]);

        let q = Partition::new([30, 20], 2, 6).unwrap();
        assert!(q.is_wall(Side::Top) && q.is_wall(Side::Right));
        assert_eq!(q.neighbour(Side::Left).code(), 1);
        assert_eq!(q.offset, [20, 10]);
    }
}
