//! Gauss-Seidel and successive over-relaxation
//!
//! Both update in place, each cell sees the values already written in
//! this sweep. The sweep is therefore sequential.
use super::{Convergence, Poisson, PressureSolve};
use crate::broadcast::broadcast;
use crate::error::Result;

/// Lexicographic Gauss-Seidel
#[derive(Debug, Default)]
pub struct GaussSeidel;

impl GaussSeidel {
    /// New solver
    pub fn new() -> Self {
        Self
    }
}

impl PressureSolve for GaussSeidel {
    fn solve(&mut self, problem: &mut Poisson<'_>) -> Result<Convergence> {
        Sor::new(1.).solve(problem)
    }
}

/// Gauss-Seidel with the new value blended by `omega`:
/// `p = (1 - omega) p + omega p_gs`
#[derive(Debug)]
pub struct Sor {
    omega: f64,
}

impl Sor {
    /// Relaxation factor `omega` in `(0, 2)`
    ///
    /// # Panics
    /// Panics if `omega` lies outside `(0, 2)`.
    pub fn new(omega: f64) -> Self {
        assert!(
            omega > 0. && omega < 2.,
            "SOR needs 0 < omega < 2, got {}.",
            omega
        );
        Self { omega }
    }
}

impl PressureSolve for Sor {
    fn solve(&mut self, problem: &mut Poisson<'_>) -> Result<Convergence> {
        let omega = self.omega;
        problem.iterate(|problem| {
            let (rhs, laplace) = (problem.rhs, problem.laplace);
            let p = &mut *problem.p;
            broadcast(p.range(), |i| {
                let relaxed = laplace.relax(p, i, -rhs[i]);
                p[i] = (1. - omega) * p[i] + omega * relaxed;
            });
        })
    }
}
