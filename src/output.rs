//! # Output
//!
//! A [`Snapshot`] copies the state of one rank: the raw grids with
//! their ghost rings, and `u`, `v`, `p` interpolated to the cell
//! corners. [`Writer`]s turn snapshots into files:
//! - [`TextWriter`]: human readable tables, one file per rank and output
//! - [`Hdf5Writer`] (feature `hdf5`): corner fields as hdf5 datasets
use crate::discretization::Gridsize;
use crate::error::Result;
use crate::grid::Grid;
use crate::index::{Index, Range, IX, IY};
use crate::system::PdeSystem;
use ndarray::Array2;
use std::fmt;
use std::path::PathBuf;

/// `u` at the upper right corner of cell `i`
pub fn u_corner(u: &Grid, i: Index) -> f64 {
    (u[i] + u[i + IY]) / 2.
}

/// `v` at the upper right corner of cell `i`
pub fn v_corner(v: &Grid, i: Index) -> f64 {
    (v[i] + v[i + IX]) / 2.
}

/// `p` at the upper right corner of cell `i`
pub fn p_corner(p: &Grid, i: Index) -> f64 {
    (p[i] + p[i + IX] + p[i + IY] + p[i + IX + IY]) / 4.
}

/// `u` at the centre of cell `i`
pub fn u_center(u: &Grid, i: Index) -> f64 {
    (u[i - IX] + u[i]) / 2.
}

/// `v` at the centre of cell `i`
pub fn v_center(v: &Grid, i: Index) -> f64 {
    (v[i - IY] + v[i]) / 2.
}

/// State of one rank at one instant
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Simulated time
    pub time: f64,
    /// Rank id
    pub rank: usize,
    /// Global cell counts
    pub global_cells: [usize; 2],
    /// Global index of the first local cell
    pub offset: [usize; 2],
    /// Cell spacing
    pub h: Gridsize,
    /// `u`, `v`, `p`, `F`, `G` and `rhs` including ghost cells, indexed
    /// `[x, y]` from the lower left ghost cell
    pub raw: Vec<(&'static str, Array2<f64>)>,
    /// Corner values of `u`, lower left corner of the subdomain first
    pub ux: Array2<f64>,
    /// Corner values of `v`
    pub uy: Array2<f64>,
    /// Corner values of `p`
    pub pres: Array2<f64>,
}

impl Snapshot {
    /// Copy the current state of `system`
    pub fn capture(system: &PdeSystem<'_>) -> Self {
        let range = system.p.range();
        // corners of all local cells, the lower left ones belong to the
        // ghost cells below and left
        let corners = Range::new(range.begin - IX - IY, range.end);
        let at_corners = |grid: &Grid, f: fn(&Grid, Index) -> f64| {
            let (nx, ny) = corners.count();
            Array2::from_shape_fn((nx, ny), |(i, j)| {
                f(grid, Index::new(corners.begin.x + i as u16, corners.begin.y + j as u16))
            })
        };
        let raw = [
            ("u", &system.u),
            ("v", &system.v),
            ("p", &system.p),
            ("F", &system.f),
            ("G", &system.g),
            ("rhs", &system.rhs),
        ]
        .iter()
        .map(|(name, grid)| (*name, grid.to_array(grid.full_range())))
        .collect();

        Self {
            time: system.time,
            rank: system.partition.rank,
            global_cells: system.partition.global_cells,
            offset: system.partition.offset,
            h: system.h,
            raw,
            ux: at_corners(&system.u, u_corner),
            uy: at_corners(&system.v, v_corner),
            pres: at_corners(&system.p, p_corner),
        }
    }
}

/// Sink for snapshots
pub trait Writer {
    /// Persist one snapshot
    ///
    /// # Errors
    /// When the output can not be written.
    fn write(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Tables of all raw grids, `<dir>/output_<rank>_<nnnn>.txt`
#[derive(Debug)]
pub struct TextWriter {
    dir: PathBuf,
    count: usize,
}

impl TextWriter {
    /// Writer into `dir`, created on first write
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            count: 0,
        }
    }

    /// Table of one grid, top row first
    pub fn format_grid(name: &str, array: &Array2<f64>) -> String {
        GridTable { name, array }.to_string()
    }
}

/// Display of one grid as a table, top row first. Rows and columns are
/// labelled with their index relative to the first interior cell.
pub struct GridTable<'a> {
    /// Heading
    pub name: &'a str,
    /// Values, `[x, y]`
    pub array: &'a Array2<f64>,
}

impl fmt::Display for GridTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 9;
        let (sx, sy) = self.array.dim();
        writeln!(f, "{} ({}x{}):", self.name, sx, sy)?;
        write!(f, "{}|", " ".repeat(WIDTH))?;
        for i in 0..sx {
            write!(f, "{:>w$}", i as isize - 1, w = WIDTH)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(WIDTH * (sx + 1) + 1))?;
        for j in (0..sy).rev() {
            write!(f, "{:>w$}|", j as isize - 1, w = WIDTH)?;
            for i in 0..sx {
                write!(f, "{:>w$.3e}", self.array[[i, j]], w = WIDTH + 1)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Writer for TextWriter {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let filename = self
            .dir
            .join(format!("output_{}_{:04}.txt", snapshot.rank, self.count));
        self.count += 1;

        let mut text = format!(
            "t: {}\nnCells: {}x{}, dx: {}, dy: {}, offset: {:?}\n\n",
            snapshot.time,
            snapshot.global_cells[0],
            snapshot.global_cells[1],
            snapshot.h.x,
            snapshot.h.y,
            snapshot.offset
        );
        for (name, array) in &snapshot.raw {
            text.push_str(&Self::format_grid(name, array));
            text.push('\n');
        }
        std::fs::write(&filename, text)?;
        log::debug!(" ==> {:?}", filename);
        Ok(())
    }
}

#[cfg(feature = "hdf5")]
pub use self::hdf5_writer::{write_to_hdf5, Hdf5Writer};

#[cfg(feature = "hdf5")]
mod hdf5_writer {
    use super::{Snapshot, Writer};
    use crate::error::Result;
    use ndarray::{Array1, ArrayBase, Data, Dimension};
    use std::path::{Path, PathBuf};

    /// Write an array to an hdf5 file, creating file and dataset
    /// as needed
    ///
    /// # Errors
    /// When the file can not be opened or the dataset exists with a
    /// different shape.
    pub fn write_to_hdf5<S, D>(
        filename: &Path,
        varname: &str,
        array: &ArrayBase<S, D>,
    ) -> hdf5::Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let file = if filename.exists() {
            hdf5::File::append(filename)?
        } else {
            hdf5::File::create(filename)?
        };
        let dset = match file.dataset(varname) {
            Ok(dset) => dset,
            Err(..) => file
                .new_dataset::<f64>()
                .no_chunk()
                .shape(array.shape())
                .create(varname)?,
        };
        dset.write(&array.view())?;
        Ok(())
    }

    /// Corner fields of every rank into `<dir>/flow<time>_<rank>.h5`
    #[derive(Debug)]
    pub struct Hdf5Writer {
        dir: PathBuf,
    }

    impl Hdf5Writer {
        /// Writer into `dir`, created on first write
        pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
            Self { dir: dir.into() }
        }
    }

    impl Writer for Hdf5Writer {
        fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
            std::fs::create_dir_all(&self.dir)?;
            let filename = self
                .dir
                .join(format!("flow{:08.2}_{}.h5", snapshot.time, snapshot.rank));
            write_to_hdf5(&filename, "ux", &snapshot.ux)?;
            write_to_hdf5(&filename, "uy", &snapshot.uy)?;
            write_to_hdf5(&filename, "pres", &snapshot.pres)?;
            write_to_hdf5(&filename, "time", &Array1::from_elem(1, snapshot.time))?;
            let offset = Array1::from_iter(snapshot.offset.iter().map(|&o| o as f64));
            write_to_hdf5(&filename, "offset", &offset)?;
            log::debug!(" ==> {:?}", filename);
            Ok(())
        }
    }
}
