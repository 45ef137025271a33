//! Matrix free five point Laplacian
use crate::discretization::Gridsize;
use crate::grid::Grid;
use crate::index::{Index, IX, IY};

/// The operator `A = -Δh`, symmetric positive semi-definite on a grid
/// whose ghost cells mirror the interior (Neumann walls)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Laplace {
    /// `1 / hx²`
    pub h_x_squared_inv: f64,
    /// `1 / hy²`
    pub h_y_squared_inv: f64,
    /// Diagonal entry `2 / hx² + 2 / hy²`
    pub a_ij: f64,
}

impl Laplace {
    /// Operator on a grid with spacing `h`
    pub fn new(h: &Gridsize) -> Self {
        let h_x_squared_inv = 1. / h.x_squared;
        let h_y_squared_inv = 1. / h.y_squared;
        Self {
            h_x_squared_inv,
            h_y_squared_inv,
            a_ij: 2. * (h_x_squared_inv + h_y_squared_inv),
        }
    }

    /// Weighted sum of the four neighbours of `i`
    #[inline]
    pub fn neighbours(&self, x: &Grid, i: Index) -> f64 {
        (x[i - IX] + x[i + IX]) * self.h_x_squared_inv
            + (x[i - IY] + x[i + IY]) * self.h_y_squared_inv
    }

    /// Row `i` of `A x`
    #[inline]
    pub fn apply(&self, x: &Grid, i: Index) -> f64 {
        self.a_ij * x[i] - self.neighbours(x, i)
    }

    /// Value of `x[i]` that satisfies row `i` of `A x = b` exactly,
    /// given the neighbours
    #[inline]
    pub fn relax(&self, x: &Grid, i: Index, b: f64) -> f64 {
        (b + self.neighbours(x, i)) / self.a_ij
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_relax_solves_row() {
        let h = Gridsize::new([1., 2.], [4, 4]);
        let laplace = Laplace::new(&h);
        let mut x = Grid::new(Index::new(1, 1), Index::new(4, 4));
        let full = x.full_range();
        x.fill_with(full, |i| f64::from(i.x * i.y) * 0.1 + f64::from(i.x));
        let i = Index::new(2, 3);
        let b = 0.7;
        x[i] = laplace.relax(&x, i, b);
        assert!((laplace.apply(&x, i) - b).abs() < 1e-12);
        // constants are in the null space
        x.fill(3.);
        assert!(laplace.apply(&x, i).abs() < 1e-12);
    }
}
