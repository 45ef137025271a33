//! Red-black Gauss-Seidel
use super::{Convergence, Poisson, PressureSolve};
use crate::broadcast::{par_broadcast_parity, Parity};
use crate::error::Result;

/// Gauss-Seidel in checkerboard order. Cells of one colour only depend
/// on cells of the other, so each half sweep runs in parallel. Colours
/// follow global indices, the result does not depend on the
/// decomposition.
#[derive(Debug, Default)]
pub struct RedBlack;

impl RedBlack {
    /// New solver
    pub fn new() -> Self {
        Self
    }
}

impl PressureSolve for RedBlack {
    fn solve(&mut self, problem: &mut Poisson<'_>) -> Result<Convergence> {
        problem.iterate(|problem| {
            for (n, parity) in [Parity::Red, Parity::Black].into_iter().enumerate() {
                if n > 0 {
                    problem.refresh();
                }
                let (rhs, laplace) = (problem.rhs, problem.laplace);
                let origin = problem.partition.offset;
                let range = problem.p.range();
                par_broadcast_parity(problem.p, range, parity, origin, |p, i| {
                    laplace.relax(p, i, -rhs[i])
                });
            }
        })
    }
}
