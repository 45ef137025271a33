//! # Settings
//!
//! Run parameters, read from a text file with one `key = value` pair per
//! line. `#` starts a comment.
//!
//! ```
//! use staggerflow::settings::Settings;
//! let settings = Settings::parse("nCellsX = 40 # cells\nre = 100").unwrap();
//! assert_eq!(settings.n_cells, [40, 20]);
//! ```
use crate::error::{Error, Result};
use crate::grid::LayoutKind;
use crate::solver::SolverKind;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Lid-driven cavity sample configuration
pub const LID_DRIVEN_CAVITY: &str = "\
# Problem description
physicalSizeX = 2.0   # physical size of the domain
physicalSizeY = 2.0
endTime = 10.0        # duration of the simulation
re = 1000             # Reynolds number
gX = 0.0              # external forces
gY = 0.0

# Dirichlet boundary conditions
dirichletBottomX = 0
dirichletBottomY = 0
dirichletTopX    = 1
dirichletTopY    = 0
dirichletLeftX   = 0
dirichletLeftY   = 0
dirichletRightX  = 0
dirichletRightY  = 0

# Discretization parameters
nCellsX = 20
nCellsY = 20
useDonorCell = true
alpha = 0.5
tau = 0.5
maximumDt = 0.1

# Solver parameters
pressureSolver = SOR
omega = 1.6
epsilon = 1e-5
maximumNumberOfIterations = 1e4
";

/// Parameters of one run
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Global number of cells in x and y
    pub n_cells: [usize; 2],
    /// Physical extent of the domain
    pub physical_size: [f64; 2],
    /// Reynolds number
    pub re: f64,
    /// Simulated time span
    pub end_time: f64,
    /// Safety factor of the adaptive time step, in `(0, 1]`
    pub tau: f64,
    /// Upper bound of the time step
    pub maximum_dt: f64,
    /// External forces
    pub g: [f64; 2],
    /// Blend in donor cell differences for the convective terms
    pub use_donor_cell: bool,
    /// Donor cell weight, 0 is central differences
    pub alpha: f64,
    /// Wall velocity `(u, v)` at the bottom
    pub dirichlet_bottom: [f64; 2],
    /// Wall velocity `(u, v)` at the top
    pub dirichlet_top: [f64; 2],
    /// Wall velocity `(u, v)` at the left
    pub dirichlet_left: [f64; 2],
    /// Wall velocity `(u, v)` at the right
    pub dirichlet_right: [f64; 2],
    /// Pressure solver
    pub pressure_solver: SolverKind,
    /// Over-relaxation factor of SOR, in `(0, 2)`
    pub omega: f64,
    /// Residual tolerance of the pressure solver
    pub epsilon: f64,
    /// Iteration cap of the pressure solver
    pub maximum_number_of_iterations: usize,
    /// Simulated time between two snapshots, `None` writes nothing
    pub output_interval: Option<f64>,
    /// Memory layout of all grids
    pub layout: LayoutKind,
}

impl Default for Settings {
    /// The lid-driven cavity
    fn default() -> Self {
        Self {
            n_cells: [20, 20],
            physical_size: [2., 2.],
            re: 1000.,
            end_time: 10.,
            tau: 0.5,
            maximum_dt: 0.1,
            g: [0., 0.],
            use_donor_cell: true,
            alpha: 0.5,
            dirichlet_bottom: [0., 0.],
            dirichlet_top: [1., 0.],
            dirichlet_left: [0., 0.],
            dirichlet_right: [0., 0.],
            pressure_solver: SolverKind::Sor,
            omega: 1.6,
            epsilon: 1e-5,
            maximum_number_of_iterations: 10_000,
            output_interval: Some(1.),
            layout: LayoutKind::Cartesian,
        }
    }
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(key, format!("can not parse `{}`", value)))
}

fn boolean(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::config(key, format!("expected true or false, got `{}`", value))),
    }
}

/// Counts may be written in float notation (`1e4`)
fn count(key: &str, value: &str) -> Result<usize> {
    let v: f64 = number(key, value)?;
    if v < 0. || v.fract() != 0. || !v.is_finite() {
        return Err(Error::config(key, format!("expected a count, got `{}`", value)));
    }
    Ok(v as usize)
}

impl Settings {
    /// Read settings from a file, starting from the defaults
    ///
    /// # Errors
    /// When the file can not be read or a value is invalid.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let text = std::fs::read_to_string(filename)?;
        Self::parse(&text)
    }

    /// Read settings from text, starting from the defaults.
    ///
    /// Unknown keys and lines without `=` are skipped with a warning.
    ///
    /// # Errors
    /// When a value can not be parsed or the result fails
    /// [`Settings::validate`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut settings = Self::default();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => settings.set(key.trim(), value.trim())?,
                None => log::warn!("Ignoring settings line {}: `{}`", line_number + 1, line),
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Assign one value by its file key
    ///
    /// # Errors
    /// When the value does not parse. Unknown keys are only logged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key_bc = key.replacen("dirichletBc", "dirichlet", 1);
        match key_bc.as_str() {
            "nCellsX" => self.n_cells[0] = count(key, value)?,
            "nCellsY" => self.n_cells[1] = count(key, value)?,
            "physicalSizeX" => self.physical_size[0] = number(key, value)?,
            "physicalSizeY" => self.physical_size[1] = number(key, value)?,
            "re" => self.re = number(key, value)?,
            "endTime" => self.end_time = number(key, value)?,
            "tau" => self.tau = number(key, value)?,
            "maximumDt" => self.maximum_dt = number(key, value)?,
            "gX" => self.g[0] = number(key, value)?,
            "gY" => self.g[1] = number(key, value)?,
            "useDonorCell" => self.use_donor_cell = boolean(key, value)?,
            "alpha" => self.alpha = number(key, value)?,
            "dirichletBottomX" => self.dirichlet_bottom[0] = number(key, value)?,
            "dirichletBottomY" => self.dirichlet_bottom[1] = number(key, value)?,
            "dirichletTopX" => self.dirichlet_top[0] = number(key, value)?,
            "dirichletTopY" => self.dirichlet_top[1] = number(key, value)?,
            "dirichletLeftX" => self.dirichlet_left[0] = number(key, value)?,
            "dirichletLeftY" => self.dirichlet_left[1] = number(key, value)?,
            "dirichletRightX" => self.dirichlet_right[0] = number(key, value)?,
            "dirichletRightY" => self.dirichlet_right[1] = number(key, value)?,
            "pressureSolver" => self.pressure_solver = number(key, value)?,
            "omega" => self.omega = number(key, value)?,
            "epsilon" => self.epsilon = number(key, value)?,
            "maximumNumberOfIterations" => {
                self.maximum_number_of_iterations = count(key, value)?;
            }
            "outputInterval" => {
                let interval: f64 = number(key, value)?;
                self.output_interval = if interval > 0. { Some(interval) } else { None };
            }
            "layout" => {
                self.layout = match value.to_ascii_lowercase().as_str() {
                    "cartesian" => LayoutKind::Cartesian,
                    "zorder" => LayoutKind::ZOrder,
                    _ => return Err(Error::config(key, format!("unknown layout `{}`", value))),
                }
            }
            _ => log::warn!("Ignoring unknown setting `{}`", key),
        }
        Ok(())
    }

    /// Reject values the solver can not work with
    ///
    /// # Errors
    /// On the first offending value.
    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, key: &str, message: &str| {
            if ok {
                Ok(())
            } else {
                Err(Error::config(key, message))
            }
        };
        check(self.n_cells[0] > 0, "nCellsX", "must be positive")?;
        check(self.n_cells[1] > 0, "nCellsY", "must be positive")?;
        check(self.physical_size[0] > 0., "physicalSizeX", "must be positive")?;
        check(self.physical_size[1] > 0., "physicalSizeY", "must be positive")?;
        check(self.re > 0., "re", "must be positive")?;
        check(self.end_time >= 0., "endTime", "must not be negative")?;
        check(self.tau > 0. && self.tau <= 1., "tau", "must lie in (0, 1]")?;
        check(self.maximum_dt > 0., "maximumDt", "must be positive")?;
        check((0. ..=1.).contains(&self.alpha), "alpha", "must lie in [0, 1]")?;
        check(self.omega > 0. && self.omega < 2., "omega", "must lie in (0, 2)")?;
        check(self.epsilon >= 0., "epsilon", "must not be negative")?;
        check(
            self.maximum_number_of_iterations > 0,
            "maximumNumberOfIterations",
            "must be positive",
        )?;
        Ok(())
    }

    /// Donor cell weight in effect
    pub fn donor_cell_alpha(&self) -> f64 {
        if self.use_donor_cell {
            self.alpha
        } else {
            0.
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Settings: physicalSize: {} x {}, nCells: {} x {}",
            self.physical_size[0], self.physical_size[1], self.n_cells[0], self.n_cells[1]
        )?;
        writeln!(
            f,
            "  endTime: {} s, re: {}, g: ({},{}), tau: {}, maximum dt: {}",
            self.end_time, self.re, self.g[0], self.g[1], self.tau, self.maximum_dt
        )?;
        writeln!(
            f,
            "  dirichletBC: bottom: ({},{}), top: ({},{}), left: ({},{}), right: ({},{})",
            self.dirichlet_bottom[0],
            self.dirichlet_bottom[1],
            self.dirichlet_top[0],
            self.dirichlet_top[1],
            self.dirichlet_left[0],
            self.dirichlet_left[1],
            self.dirichlet_right[0],
            self.dirichlet_right[1]
        )?;
        writeln!(
            f,
            "  useDonorCell: {}, alpha: {}, layout: {:?}",
            self.use_donor_cell, self.alpha, self.layout
        )?;
        write!(
            f,
            "  pressureSolver: {:?}, omega: {}, epsilon: {}, maximumNumberOfIterations: {}",
            self.pressure_solver, self.omega, self.epsilon, self.maximum_number_of_iterations
        )
    }
}
