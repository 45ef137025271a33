//! Finite difference stencils on the staggered grid
//!
//! All functions take the direction of differentiation as an [`Offset`]
//! (`IX` or `IY`), so one stencil serves both momentum equations.
use crate::grid::Grid;
use crate::index::{Index, Offset};

/// Cell spacing of the uniform grid
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gridsize {
    /// Spacing in x
    pub x: f64,
    /// Spacing in y
    pub y: f64,
    /// `x * x`
    pub x_squared: f64,
    /// `y * y`
    pub y_squared: f64,
}

impl Gridsize {
    /// Spacing of `cells` cells over a domain of `length`
    pub fn new(length: [f64; 2], cells: [usize; 2]) -> Self {
        let x = length[0] / cells[0] as f64;
        let y = length[1] / cells[1] as f64;
        Self {
            x,
            y,
            x_squared: x * x,
            y_squared: y * y,
        }
    }
}

/// Forward difference `(f[I + o] - f[I]) / h`
#[inline]
pub fn d(o: Offset, f: &Grid, i: Index, h: f64) -> f64 {
    (f[i + o] - f[i]) / h
}

/// Central second difference `(f[I + o] - 2 f[I] + f[I - o]) / h²`
#[inline]
pub fn dd(o: Offset, f: &Grid, i: Index, h_squared: f64) -> f64 {
    (f[i + o] - 2. * f[i] + f[i - o]) / h_squared
}

/// Convective term `d(f²)` along `o`, central differences blended with
/// donor cell by `alpha`
#[inline]
pub fn dsquare(o: Offset, f: &Grid, i: Index, h: f64, alpha: f64) -> f64 {
    let plus = (f[i] + f[i + o]) / 2.;
    let minus = (f[i - o] + f[i]) / 2.;
    let central = (plus * plus - minus * minus) / h;
    let donor = (plus.abs() * (f[i] - f[i + o]) / 2. - minus.abs() * (f[i - o] - f[i]) / 2.) / h;
    central + alpha * donor
}

/// Convective term `d(w phi)` along `o`.
///
/// The transporting velocity `w` lives on the faces normal to `o`; it is
/// averaged along `t` onto the faces of the `phi` cell.
#[inline]
pub fn dproduct(o: Offset, t: Offset, w: &Grid, phi: &Grid, i: Index, h: f64, alpha: f64) -> f64 {
    let w_plus = (w[i] + w[i + t]) / 2.;
    let w_minus = (w[i - o] + w[i - o + t]) / 2.;
    let central = (w_plus * (phi[i] + phi[i + o]) / 2. - w_minus * (phi[i - o] + phi[i]) / 2.) / h;
    let donor = (w_plus.abs() * (phi[i] - phi[i + o]) / 2.
        - w_minus.abs() * (phi[i - o] - phi[i]) / 2.)
        / h;
    central + alpha * donor
}
