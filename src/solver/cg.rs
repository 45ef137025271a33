//! Conjugate gradients, matrix free
use super::{Convergence, Poisson, PressureSolve};
use crate::broadcast::{par_broadcast, par_update};
use crate::error::Result;
use crate::grid::Grid;

/// Conjugate gradients on `A p = -rhs`.
///
/// Each iteration refreshes the halo of the search direction once and
/// performs two global reductions, `d·Ad` and `r·r`.
#[derive(Debug)]
pub struct ConjugateGradient {
    residual: Grid,
    search_direction: Grid,
    a_search_direction: Grid,
}

impl ConjugateGradient {
    /// Scratch grids shaped like `p`
    pub fn new(p: &Grid) -> Self {
        Self {
            residual: Grid::zeros_like(p),
            search_direction: Grid::zeros_like(p),
            a_search_direction: Grid::zeros_like(p),
        }
    }
}

impl PressureSolve for ConjugateGradient {
    fn solve(&mut self, problem: &mut Poisson<'_>) -> Result<Convergence> {
        let range = problem.p.range();
        let n = problem.partition.global_size() as f64;
        let laplace = problem.laplace;
        let Self {
            residual: r,
            search_direction: d,
            a_search_direction: ad,
        } = self;

        problem.refresh();
        {
            let (p, rhs) = (&*problem.p, problem.rhs);
            par_broadcast(r, range, |i| -rhs[i] - laplace.apply(p, i));
        }
        d.copy_from(r);
        let mut rr = problem.dot(r, r);

        let mut history = Vec::new();
        let mut iterations = 0;
        while iterations < problem.max_iterations {
            let residual = (rr / n).sqrt();
            history.push(residual);
            problem.check(residual, iterations)?;
            if residual < problem.epsilon {
                problem.refresh();
                return Ok(Convergence {
                    iterations,
                    residual,
                    converged: true,
                    history,
                });
            }

            super::refresh_neumann(problem.comm, problem.partition, problem.profiler, d);
            {
                let d: &Grid = d;
                par_broadcast(ad, range, |i| laplace.apply(d, i));
            }
            let dad = problem.dot(d, ad);
            // only reached with a zero direction or a defect in the null space
            if !(dad > 0.) {
                log::debug!("CG stopped, d·Ad = {:e}", dad);
                break;
            }
            let alpha = rr / dad;
            {
                let (d, ad): (&Grid, &Grid) = (d, ad);
                par_update(problem.p, range, |i, p| p + alpha * d[i]);
                par_update(r, range, |i, r| r - alpha * ad[i]);
            }
            let rr_new = problem.dot(r, r);
            iterations += 1;
            if rr_new == 0. {
                rr = 0.;
                break;
            }
            let beta = rr_new / rr;
            {
                let r: &Grid = r;
                par_update(d, range, |i, d| r[i] + beta * d);
            }
            rr = rr_new;
        }

        problem.refresh();
        let residual = (rr / n).sqrt();
        history.push(residual);
        problem.check(residual, iterations)?;
        Ok(Convergence {
            iterations,
            residual,
            converged: residual < problem.epsilon,
            history,
        })
    }
}
