//! # `staggerflow`: Distributed Navier-Stokes solver on a staggered grid
//!
//! # Dependencies
//! - cargo >= v1.63
//! - mpi installation and libclang (feature `mpi`, on by default)
//! - `hdf5` (feature `hdf5`, sudo apt-get install -y libhdf5-dev)
//!
//! # Details
//!
//! Solves the 2-D incompressible Navier-Stokes equations with finite
//! differences on a uniform staggered grid. Pressure lives in the cell
//! centres, `u` on the right and `v` on the top cell faces. Each time step
//! computes momentum predictors, solves a Poisson equation for the
//! pressure and projects the velocity onto a divergence free field.
//!
//! The domain is split into a cartesian process grid, see
//! [`partition::Partition`]. Every rank owns one subdomain surrounded
//! by a ring of ghost cells, which [`halo::HaloExchange`] keeps
//! consistent with the neighbours.
//!
//! ## Pressure solver
//!
//! - Jacobi, see [`solver::Jacobi`]
//! - Gauss-Seidel and SOR, see [`solver::GaussSeidel`], [`solver::Sor`]
//! - Red-Black Gauss-Seidel, see [`solver::RedBlack`]
//! - Conjugate gradients, see [`solver::ConjugateGradient`]
//!
//! # Example
//! Lid driven cavity on in-process ranks (Run with
//! `cargo mpirun --np 4 --bin staggerflow` for real MPI ranks)
//! ```
//! use staggerflow::comm::LocalComm;
//! use staggerflow::profiler::Profiler;
//! use staggerflow::settings::Settings;
//! use staggerflow::system::PdeSystem;
//! use staggerflow::integrate;
//!
//! let mut settings = Settings::default();
//! settings.n_cells = [8, 8];
//! settings.end_time = 0.05;
//! let comm = LocalComm::solo();
//! let profiler = Profiler::default();
//! let mut system = PdeSystem::new(&comm, &settings, &profiler).unwrap();
//! integrate(&mut system, settings.end_time, None).unwrap();
//! assert!(system.time >= 0.05 - 1e-12);
//! ```
//!
//! ## Documentation
//!
//! Download and run:
//!
//! `cargo doc --open`
#![warn(missing_docs)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod boundaries;
pub mod broadcast;
pub mod comm;
pub mod discretization;
pub mod error;
pub mod grid;
pub mod halo;
pub mod index;
pub mod output;
pub mod partition;
pub mod profiler;
pub mod settings;
pub mod solver;
pub mod system;

use error::Result;

/// Hard limit on the number of time steps of [`integrate`]
pub const MAX_TIMESTEP: usize = 10_000_000;

/// Integrate trait, step forward in time, and write results
pub trait Integrate {
    /// Update solution
    ///
    /// # Errors
    /// Fatal failures of the step, e.g. a diverging pressure solve.
    fn update(&mut self) -> Result<()>;
    /// Receive current time
    fn get_time(&self) -> f64;
    /// Get timestep
    fn get_dt(&self) -> f64;
    /// Callback function (can be used for i/o)
    ///
    /// # Errors
    /// When output can not be written.
    fn callback(&mut self) -> Result<()>;
    /// Additional break criteria
    fn exit(&mut self) -> bool;
}

/// Integrate pde, that implements the Integrate trait.
///
/// Specify `save_intervall` to call [`Integrate::callback`] every time
/// the simulated time passes a multiple of it.
///
/// Stop Criteria:
/// 1. Timestep limit
/// 2. Time limit
/// 3. [`Integrate::exit`]
///
/// # Errors
/// The first error of [`Integrate::update`] or [`Integrate::callback`].
pub fn integrate<T: Integrate>(pde: &mut T, max_time: f64, save_intervall: Option<f64>) -> Result<()> {
    let mut timestep: usize = 0;
    let mut next_save = save_intervall.map(|dt_save| pde.get_time() + dt_save);
    loop {
        // Update
        pde.update()?;
        timestep += 1;
        let eps_dt = pde.get_dt() * 1e-4;

        // Save
        if let (Some(dt_save), Some(next)) = (save_intervall, next_save.as_mut()) {
            if pde.get_time() + eps_dt >= *next {
                pde.callback()?;
                while *next <= pde.get_time() + eps_dt {
                    *next += dt_save;
                }
            }
        }

        // Break
        if pde.get_time() + eps_dt >= max_time {
            log::info!("time limit reached: {:?}", pde.get_time());
            break;
        }
        if timestep >= MAX_TIMESTEP {
            log::info!("timestep limit reached: {:?}", timestep);
            break;
        }
        if pde.exit() {
            log::info!("break criteria triggered");
            break;
        }
    }
    Ok(())
}
