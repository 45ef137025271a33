//! Jacobi iteration
use super::{Convergence, Poisson, PressureSolve};
use crate::broadcast::par_broadcast;
use crate::error::Result;
use crate::grid::Grid;

/// Every cell is relaxed from the old values into a scratch grid, which
/// then replaces the pressure
#[derive(Debug)]
pub struct Jacobi {
    tmp: Grid,
}

impl Jacobi {
    /// Scratch grid shaped like `p`
    pub fn new(p: &Grid) -> Self {
        Self {
            tmp: Grid::zeros_like(p),
        }
    }
}

impl PressureSolve for Jacobi {
    fn solve(&mut self, problem: &mut Poisson<'_>) -> Result<Convergence> {
        let tmp = &mut self.tmp;
        problem.iterate(|problem| {
            let (p, rhs, laplace) = (&*problem.p, problem.rhs, problem.laplace);
            par_broadcast(tmp, p.range(), |i| laplace.relax(p, i, -rhs[i]));
            // ghosts of the swapped in grid are stale until the next refresh
            std::mem::swap(problem.p, tmp);
        })
    }
}
