//! # Pressure solvers
//!
//! Iterative solvers of the pressure Poisson equation `Δp = rhs` with
//! homogeneous Neumann conditions at walls. All of them work with the
//! positive semi-definite form `A p = -rhs`, `A = -Δh` (see [`Laplace`]).
//!
//! The residual is `sqrt(Σ r² / N)` over all `N` cells of the global
//! domain, `r = -rhs - A p`. A solve stops once it drops below `epsilon`
//! or after the iteration cap. Missing the tolerance is no error; a
//! residual above [`DIVERGENCE_LIMIT`] or not finite is.
//!
//! Every collective (residual, dot products, halo exchange) runs on all
//! ranks in the same order.
#![allow(clippy::module_name_repetitions)]
pub mod cg;
pub mod gauss_seidel;
pub mod jacobi;
pub mod laplace;
pub mod red_black;
pub use cg::ConjugateGradient;
pub use gauss_seidel::{GaussSeidel, Sor};
pub use jacobi::Jacobi;
pub use laplace::Laplace;
pub use red_black::RedBlack;

use crate::broadcast::{broadcast_boundary, par_reduce};
use crate::comm::{Communicator, ReduceOp};
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::halo::HaloExchange;
use crate::partition::Partition;
use crate::profiler::Profiler;
use crate::settings::Settings;
use std::str::FromStr;

/// Residuals above this count as diverged
pub const DIVERGENCE_LIMIT: f64 = 1e10;

/// Available pressure solvers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverKind {
    /// See [`Jacobi`]
    Jacobi,
    /// See [`GaussSeidel`]
    GaussSeidel,
    /// See [`Sor`]
    Sor,
    /// See [`RedBlack`]
    RedBlack,
    /// See [`ConjugateGradient`]
    Cg,
}

impl FromStr for SolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jacobi" | "jacoby" => Ok(SolverKind::Jacobi),
            "gaussseidel" => Ok(SolverKind::GaussSeidel),
            "sor" => Ok(SolverKind::Sor),
            "redblack" | "blackred" => Ok(SolverKind::RedBlack),
            "cg" => Ok(SolverKind::Cg),
            _ => Err(Error::config(
                "pressureSolver",
                format!("unknown solver `{}`", s),
            )),
        }
    }
}

/// Outcome of one pressure solve
#[derive(Clone, Debug, PartialEq)]
pub struct Convergence {
    /// Iterations performed
    pub iterations: usize,
    /// Final residual
    pub residual: f64,
    /// Whether the residual dropped below the tolerance
    pub converged: bool,
    /// Residual before each iteration, and the final one
    pub history: Vec<f64>,
}

/// One pressure equation of one rank, borrowed from its owner
pub struct Poisson<'s> {
    /// Communicator of the run
    pub comm: &'s dyn Communicator,
    /// Subdomain of this rank
    pub partition: &'s Partition,
    /// Timings
    pub profiler: &'s Profiler,
    /// Stencil
    pub laplace: Laplace,
    /// Pressure, initial guess on entry, solution on exit. The halo is
    /// up to date on exit.
    pub p: &'s mut Grid,
    /// Right hand side of `Δp = rhs`
    pub rhs: &'s Grid,
    /// Residual tolerance
    pub epsilon: f64,
    /// Iteration cap
    pub max_iterations: usize,
}

impl Poisson<'_> {
    /// Refresh all ghost cells of `p`
    pub fn refresh(&mut self) {
        refresh_neumann(self.comm, self.partition, self.profiler, self.p);
    }

    /// Global residual norm of the current `p`, needs a fresh halo
    pub fn residual(&self) -> f64 {
        let (p, rhs, laplace) = (&*self.p, self.rhs, self.laplace);
        let local = par_reduce(p.range(), ReduceOp::Sum, |i| {
            let r = -rhs[i] - laplace.apply(p, i);
            r * r
        });
        let n = self.partition.global_size() as f64;
        (self.comm.all_reduce(local, ReduceOp::Sum) / n).sqrt()
    }

    /// Global dot product over the interior
    pub fn dot(&self, a: &Grid, b: &Grid) -> f64 {
        let local = par_reduce(self.p.range(), ReduceOp::Sum, |i| a[i] * b[i]);
        self.comm.all_reduce(local, ReduceOp::Sum)
    }

    /// Energy `½ pᵀAp + rhsᵀp` of the current `p`, needs a fresh halo.
    ///
    /// Its minimiser solves `A p = -rhs`. Conjugate gradients decrease it
    /// in every iteration, the residual norm may rise in between.
    pub fn energy(&self) -> f64 {
        let (p, rhs, laplace) = (&*self.p, self.rhs, self.laplace);
        let local = par_reduce(p.range(), ReduceOp::Sum, |i| {
            p[i] * (0.5 * laplace.apply(p, i) + rhs[i])
        });
        self.comm.all_reduce(local, ReduceOp::Sum)
    }

    /// Fail on a diverged residual. Every rank logs its state in turn.
    ///
    /// # Errors
    /// [`Error::Diverged`] if `residual` is not finite or exceeds
    /// [`DIVERGENCE_LIMIT`].
    pub fn check(&self, residual: f64, iteration: usize) -> Result<()> {
        if residual.is_finite() && residual <= DIVERGENCE_LIMIT {
            return Ok(());
        }
        for rank in 0..self.comm.size() {
            if rank == self.comm.rank() {
                log::error!(
                    "Pressure solver diverged at iteration {} (residual {:e}). {}, p in [{:e}, {:e}], rhs in [{:e}, {:e}]",
                    iteration,
                    residual,
                    self.partition,
                    self.p.local_min(),
                    self.p.local_max(),
                    self.rhs.local_min(),
                    self.rhs.local_max(),
                );
            }
            self.comm.barrier();
        }
        Err(Error::Diverged {
            residual,
            iteration,
        })
    }

    /// Generic stationary iteration: refresh, measure, stop or `sweep`
    ///
    /// # Errors
    /// When the residual diverges.
    pub fn iterate<F: FnMut(&mut Self)>(&mut self, mut sweep: F) -> Result<Convergence> {
        let mut history = Vec::new();
        for iteration in 0..self.max_iterations {
            self.refresh();
            let residual = self.residual();
            history.push(residual);
            self.check(residual, iteration)?;
            if residual < self.epsilon {
                return Ok(Convergence {
                    iterations: iteration,
                    residual,
                    converged: true,
                    history,
                });
            }
            sweep(self);
        }
        self.refresh();
        let residual = self.residual();
        history.push(residual);
        self.check(residual, self.max_iterations)?;
        Ok(Convergence {
            iterations: self.max_iterations,
            residual,
            converged: residual < self.epsilon,
            history,
        })
    }
}

/// Mirror the interior into the ghost cells at walls (zero normal
/// derivative), then exchange halos with the neighbours
pub fn refresh_neumann(
    comm: &dyn Communicator,
    partition: &Partition,
    profiler: &Profiler,
    grid: &mut Grid,
) {
    broadcast_boundary(grid, partition, |g, _, i, o| g[i] = g[i - o]);
    let _scope = profiler.scope("halo exchange");
    HaloExchange::new(comm, partition).refresh(grid);
}

/// Solve the pressure equation in place
#[enum_dispatch]
pub trait PressureSolve {
    /// Iterate on `problem.p` until converged or out of iterations
    ///
    /// # Errors
    /// [`Error::Diverged`] when the residual explodes.
    fn solve(&mut self, problem: &mut Poisson<'_>) -> Result<Convergence>;
}

/// Any of the pressure solvers
#[enum_dispatch(PressureSolve)]
#[derive(Debug)]
pub enum PressureSolver {
    /// Jacobi
    Jacobi,
    /// Gauss-Seidel
    GaussSeidel,
    /// Successive over-relaxation
    Sor,
    /// Red-black Gauss-Seidel
    RedBlack,
    /// Conjugate gradients
    ConjugateGradient,
}

impl PressureSolver {
    /// Solver chosen in `settings`, scratch grids shaped like `p`
    pub fn new(settings: &Settings, p: &Grid) -> Self {
        Self::of_kind(settings.pressure_solver, settings.omega, p)
    }

    /// Solver of `kind`; `omega` is used by SOR only
    pub fn of_kind(kind: SolverKind, omega: f64, p: &Grid) -> Self {
        match kind {
            SolverKind::Jacobi => Jacobi::new(p).into(),
            SolverKind::GaussSeidel => GaussSeidel::new().into(),
            SolverKind::Sor => Sor::new(omega).into(),
            SolverKind::RedBlack => RedBlack::new().into(),
            SolverKind::Cg => ConjugateGradient::new(p).into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::comm::{launch, LocalComm};
    use crate::discretization::Gridsize;
    use ndarray::Array2;
    use std::f64::consts::PI;

    fn approx_eq(result: f64, expected: f64, tol: f64) {
        let dif = (result - expected).abs();
        if dif > tol {
            panic!(
                "Large difference of values, got {} expected {}.",
                result, expected
            );
        }
    }

    const CELLS: [usize; 2] = [16, 16];

    /// Sum of two discrete Neumann eigenfunctions on the unit square
    fn rhs_value(gx: usize, gy: usize) -> f64 {
        let x = (gx as f64 + 0.5) / CELLS[0] as f64;
        let y = (gy as f64 + 0.5) / CELLS[1] as f64;
        (PI * x).cos() + 0.5 * (2. * PI * y).cos()
    }

    fn exact(gx: usize, gy: usize) -> f64 {
        let h = Gridsize::new([1., 1.], CELLS);
        let lambda = |k: f64, h: f64| (2. - 2. * (k * PI * h).cos()) / (h * h);
        let x = (gx as f64 + 0.5) * h.x;
        let y = (gy as f64 + 0.5) * h.y;
        -(PI * x).cos() / lambda(1., h.x) - 0.5 * (2. * PI * y).cos() / lambda(2., h.y)
    }

    /// Solve on one rank of a universe, returns the interior of `p` in
    /// global coordinates
    pub(crate) fn solve_on(
        comm: &dyn Communicator,
        kind: SolverKind,
        epsilon: f64,
        max_iterations: usize,
    ) -> (Partition, Array2<f64>, Convergence) {
        let partition = Partition::new(CELLS, comm.rank(), comm.size()).unwrap();
        let range = partition.range();
        let mut p = Grid::new(range.begin, range.end);
        let mut rhs = Grid::new(range.begin, range.end);
        rhs.fill_with(range, |i| {
            let [gx, gy] = partition.global(i);
            rhs_value(gx, gy)
        });
        let profiler = Profiler::new();
        let mut solver = PressureSolver::of_kind(kind, 1.6, &p);
        let mut problem = Poisson {
            comm,
            partition: &partition,
            profiler: &profiler,
            laplace: Laplace::new(&Gridsize::new([1., 1.], CELLS)),
            p: &mut p,
            rhs: &rhs,
            epsilon,
            max_iterations,
        };
        let convergence = solver.solve(&mut problem).unwrap();
        let field = p.to_array(range);
        (partition, field, convergence)
    }

    fn global_field(parts: &[(Partition, Array2<f64>, Convergence)]) -> Array2<f64> {
        let mut field = Array2::zeros((CELLS[0], CELLS[1]));
        for (part, local, _) in parts {
            for ((i, j), v) in local.indexed_iter() {
                field[[part.offset[0] + i, part.offset[1] + j]] = *v;
            }
        }
        field
    }

    fn without_mean(field: &Array2<f64>) -> Array2<f64> {
        let mean = field.mean().unwrap_or(0.);
        field.mapv(|v| v - mean)
    }

    #[test]
    fn test_cg_exact() {
        let comm = LocalComm::solo();
        let (_, p, convergence) = solve_on(&comm, SolverKind::Cg, 1e-10, 500);
        assert!(convergence.converged);
        assert!(convergence.residual < 1e-10);
        assert_eq!(convergence.history.len(), convergence.iterations + 1);
        for ((gx, gy), v) in p.indexed_iter() {
            approx_eq(*v, exact(gx, gy), 1e-8);
        }
    }

    #[test]
    fn test_cg_energy_decreases() {
        let comm = LocalComm::solo();
        let cells = [32, 24];
        let partition = Partition::new(cells, 0, 1).unwrap();
        let range = partition.range();
        let value = |i| {
            let [gx, gy] = partition.global(i);
            let x = (gx as f64 + 0.5) / cells[0] as f64;
            let y = (gy as f64 + 0.5) / cells[1] as f64;
            (x - 0.5).powi(3) + (y - 0.5) * x * x
        };
        let mean = range.iter().map(value).sum::<f64>() / partition.global_size() as f64;
        let mut rhs = Grid::new(range.begin, range.end);
        rhs.fill_with(range, |i| value(i) - mean);
        let profiler = Profiler::new();

        // the k-th iterate is the result of a solve capped at k iterations
        let mut energies = Vec::new();
        let mut needed = None;
        for cap in 0..1000 {
            let mut p = Grid::new(range.begin, range.end);
            let mut solver = ConjugateGradient::new(&p);
            let mut problem = Poisson {
                comm: &comm,
                partition: &partition,
                profiler: &profiler,
                laplace: Laplace::new(&Gridsize::new([1., 1.], cells)),
                p: &mut p,
                rhs: &rhs,
                epsilon: 1e-9,
                max_iterations: cap,
            };
            let convergence = solver.solve(&mut problem).unwrap();
            energies.push(problem.energy());
            if convergence.converged {
                needed = Some(convergence.iterations);
                break;
            }
        }
        let needed = needed.unwrap();
        assert!(needed > 20, "too easy: {} iterations", needed);
        assert_eq!(energies.len(), needed + 1);
        for pair in energies.windows(2) {
            assert!(
                pair[1] <= pair[0] + 1e-12 * pair[0].abs(),
                "energy increased: {:?}",
                pair
            );
        }
        assert!(energies[needed] < energies[0]);
    }

    #[test]
    fn test_solvers_agree_with_cg() {
        let comm = LocalComm::solo();
        let (_, reference, _) = solve_on(&comm, SolverKind::Cg, 1e-11, 500);
        for kind in [
            SolverKind::Jacobi,
            SolverKind::GaussSeidel,
            SolverKind::Sor,
            SolverKind::RedBlack,
        ] {
            let (_, p, convergence) = solve_on(&comm, kind, 1e-9, 20_000);
            assert!(convergence.converged, "{:?} did not converge", kind);
            let diff = &without_mean(&p) - &without_mean(&reference);
            let max = diff.iter().fold(0_f64, |m, d| m.max(d.abs()));
            approx_eq(max, 0., 1e-6);
        }
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let comm = LocalComm::solo();
        let (_, _, convergence) = solve_on(&comm, SolverKind::GaussSeidel, 1e-12, 3);
        assert!(!convergence.converged);
        assert_eq!(convergence.iterations, 3);
        assert_eq!(convergence.history.len(), 4);
    }

    #[test]
    fn test_four_ranks_match_one() {
        // decomposition invariant solvers only; GS and SOR sweep order
        // depends on the subdomain shape
        for kind in [SolverKind::Jacobi, SolverKind::RedBlack, SolverKind::Cg] {
            let single = {
                let comm = LocalComm::solo();
                solve_on(&comm, kind, 0., 40)
            };
            let parts = launch(4, |comm| solve_on(&comm, kind, 0., 40));
            let field = global_field(&parts);
            for (a, b) in field.iter().zip(single.1.iter()) {
                approx_eq(*a, *b, 1e-10);
            }
        }
    }

    #[test]
    fn test_divergence_is_reported() {
        let comm = LocalComm::solo();
        let partition = Partition::new([4, 4], 0, 1).unwrap();
        let range = partition.range();
        let mut p = Grid::new(range.begin, range.end);
        let mut rhs = Grid::new(range.begin, range.end);
        rhs.fill(f64::NAN);
        let profiler = Profiler::new();
        let mut problem = Poisson {
            comm: &comm,
            partition: &partition,
            profiler: &profiler,
            laplace: Laplace::new(&Gridsize::new([1., 1.], [4, 4])),
            p: &mut p,
            rhs: &rhs,
            epsilon: 1e-5,
            max_iterations: 10,
        };
        let result = Sor::new(1.5).solve(&mut problem);
        assert!(matches!(
            result,
            Err(Error::Diverged { iteration: 0, .. })
        ));
    }

    #[test]
    fn test_divergence_is_reported_on_every_rank() {
        for kind in [SolverKind::Jacobi, SolverKind::RedBlack, SolverKind::Cg] {
            let iterations = launch(4, |comm| {
                let partition = Partition::new([8, 8], comm.rank(), comm.size()).unwrap();
                let range = partition.range();
                let mut p = Grid::new(range.begin, range.end);
                let mut rhs = Grid::new(range.begin, range.end);
                // a single rank holds a broken right hand side
                if comm.rank() == 3 {
                    rhs.fill(f64::NAN);
                }
                let profiler = Profiler::new();
                let mut solver = PressureSolver::of_kind(kind, 1.5, &p);
                let mut problem = Poisson {
                    comm: &comm,
                    partition: &partition,
                    profiler: &profiler,
                    laplace: Laplace::new(&Gridsize::new([1., 1.], [8, 8])),
                    p: &mut p,
                    rhs: &rhs,
                    epsilon: 1e-5,
                    max_iterations: 10,
                };
                match solver.solve(&mut problem) {
                    Err(Error::Diverged { iteration, .. }) => Some(iteration),
                    _ => None,
                }
            });
            assert_eq!(iterations, vec![Some(0); 4], "{:?}", kind);
        }
    }
}
