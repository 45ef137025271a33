//! # PDE system
//!
//! Owns all grids of one rank and advances the flow by one time step per
//! call to [`PdeSystem::step`]:
//!
//! 1. velocity boundary conditions at walls
//! 2. adaptive time step (global)
//! 3. momentum predictors `F`, `G`, halos exchanged
//! 4. right hand side of the pressure equation
//! 5. pressure solve
//! 6. velocity correction, halos exchanged
//! 7. velocity boundary conditions at walls
//!
//! Staggered placement: `p[i, j]` sits in the centre of cell `(i, j)`,
//! `u[i, j]` on its right face, `v[i, j]` on its top face. At a right
//! wall `u[nx, j]` is the wall face, at a top wall `v[i, ny]`; those
//! are excluded from the update ranges.
use crate::boundaries::Side;
use crate::broadcast::{broadcast_boundary, par_broadcast};
use crate::comm::{Communicator, ReduceOp};
use crate::discretization::{d, dd, dproduct, dsquare, Gridsize};
use crate::error::Result;
use crate::grid::Grid;
use crate::halo::HaloExchange;
use crate::index::{Range, IX, IY};
use crate::output::{Snapshot, Writer};
use crate::partition::Partition;
use crate::profiler::Profiler;
use crate::settings::Settings;
use crate::solver::{Convergence, Laplace, Poisson, PressureSolve, PressureSolver};
use crate::Integrate;
use std::collections::HashMap;

/// Distributed incompressible Navier-Stokes solver, one rank
pub struct PdeSystem<'a> {
    comm: &'a dyn Communicator,
    settings: &'a Settings,
    profiler: &'a Profiler,
    /// Subdomain of this rank
    pub partition: Partition,
    /// Cell spacing
    pub h: Gridsize,
    /// Pressure
    pub p: Grid,
    /// Velocity in x
    pub u: Grid,
    /// Velocity in y
    pub v: Grid,
    /// Momentum predictor of `u`
    pub f: Grid,
    /// Momentum predictor of `v`
    pub g: Grid,
    /// Right hand side of the pressure equation
    pub rhs: Grid,
    /// Current time step
    pub dt: f64,
    /// Simulated time
    pub time: f64,
    /// Residual of the latest pressure solve
    pub residual: f64,
    /// Outcome of the latest pressure solve
    pub last_solve: Option<Convergence>,
    /// Time series of `time`, `dt`, `residual` and `iterations`
    pub diagnostics: HashMap<String, Vec<f64>>,
    /// Receives a snapshot on every [`Integrate::callback`]
    pub writer: Option<Box<dyn Writer + 'a>>,
    u_range: Range,
    v_range: Range,
    solver: PressureSolver,
}

impl<'a> PdeSystem<'a> {
    /// Zero initialized flow on the subdomain of `comm.rank()`
    ///
    /// # Errors
    /// When the settings are invalid or the domain can not be split
    /// over `comm.size()` ranks.
    pub fn new(
        comm: &'a dyn Communicator,
        settings: &'a Settings,
        profiler: &'a Profiler,
    ) -> Result<Self> {
        settings.validate()?;
        let partition = Partition::new(settings.n_cells, comm.rank(), comm.size())?;
        let range = partition.range();
        let grid = || Grid::with_layout(range.begin, range.end, settings.layout);
        let p = grid();

        let mut u_end = range.end;
        if partition.is_wall(Side::Right) {
            u_end = u_end - IX;
        }
        let mut v_end = range.end;
        if partition.is_wall(Side::Top) {
            v_end = v_end - IY;
        }

        if comm.rank() == 0 {
            log::info!("{}", settings);
        }
        log::debug!("{}", partition);

        let solver = PressureSolver::new(settings, &p);
        Ok(Self {
            comm,
            settings,
            profiler,
            h: Gridsize::new(settings.physical_size, settings.n_cells),
            p,
            u: grid(),
            v: grid(),
            f: grid(),
            g: grid(),
            rhs: grid(),
            dt: 0.,
            time: 0.,
            residual: 0.,
            last_solve: None,
            diagnostics: HashMap::new(),
            writer: None,
            u_range: Range::new(range.begin, u_end),
            v_range: Range::new(range.begin, v_end),
            solver,
            partition,
        })
    }

    /// Rank id
    pub fn nrank(&self) -> usize {
        self.comm.rank()
    }

    /// Number of ranks
    pub fn nprocs(&self) -> usize {
        self.comm.size()
    }

    /// Run parameters
    pub fn settings(&self) -> &Settings {
        self.settings
    }

    /// Cells of `u` updated by the momentum equation
    pub fn u_range(&self) -> Range {
        self.u_range
    }

    /// Cells of `v` updated by the momentum equation
    pub fn v_range(&self) -> Range {
        self.v_range
    }

    /// Advance by one time step
    ///
    /// # Errors
    /// [`crate::error::Error::Diverged`] when the pressure solver blows up.
    pub fn step(&mut self) -> Result<()> {
        let _scope = self.profiler.scope("time step");
        self.set_velocity_boundary();
        self.compute_dt();
        self.compute_momentum();
        self.compute_rhs();
        self.solve_pressure()?;
        self.update_velocity();
        self.set_velocity_boundary();
        self.time += self.dt;
        self.record();
        Ok(())
    }

    /// Wall velocities into the ghost cells (and wall faces) of `u`, `v`
    pub fn set_velocity_boundary(&mut self) {
        let s = self.settings;
        let wall = move |side: Side| match side {
            Side::Top => s.dirichlet_top,
            Side::Bottom => s.dirichlet_bottom,
            Side::Left => s.dirichlet_left,
            Side::Right => s.dirichlet_right,
        };
        // u is normal to left and right walls, tangential to the others
        broadcast_boundary(&mut self.u, &self.partition, |u, side, i, o| {
            let value = wall(side)[0];
            match side {
                Side::Left => u[i] = value,
                Side::Right => {
                    u[i - o] = value;
                    u[i] = value;
                }
                Side::Top | Side::Bottom => u[i] = 2. * value - u[i - o],
            }
        });
        broadcast_boundary(&mut self.v, &self.partition, |v, side, i, o| {
            let value = wall(side)[1];
            match side {
                Side::Bottom => v[i] = value,
                Side::Top => {
                    v[i - o] = value;
                    v[i] = value;
                }
                Side::Left | Side::Right => v[i] = 2. * value - v[i - o],
            }
        });
    }

    /// `dt = tau * min(re/2 * hx²hy²/(hx²+hy²), hx/|u|max, hy/|v|max)`,
    /// capped by `maximumDt` and the remaining simulation time
    pub fn compute_dt(&mut self) {
        let h = self.h;
        let u_max = self.u.max(self.comm).max(-self.u.min(self.comm));
        let v_max = self.v.max(self.comm).max(-self.v.min(self.comm));
        let diffusive = self.settings.re / 2. * h.x_squared * h.y_squared
            / (h.x_squared + h.y_squared);
        let convective = |h: f64, max: f64| if max > 0. { h / max } else { f64::INFINITY };
        let dt = self.settings.tau
            * diffusive
                .min(convective(h.x, u_max))
                .min(convective(h.y, v_max));
        let mut dt = dt.min(self.settings.maximum_dt);
        let remaining = self.settings.end_time - self.time;
        if remaining > 0. && dt > remaining {
            dt = remaining;
        }
        self.dt = dt;
    }

    /// Momentum predictors `F`, `G` with fresh halos. Wall values are
    /// taken over from `u`, `v`.
    pub fn compute_momentum(&mut self) {
        let _scope = self.profiler.scope("momentum");
        self.f.copy_from(&self.u);
        self.g.copy_from(&self.v);

        let (u, v, h, dt) = (&self.u, &self.v, self.h, self.dt);
        let re = self.settings.re;
        let alpha = self.settings.donor_cell_alpha();
        let [gx, gy] = self.settings.g;
        let (u_range, v_range) = (self.u_range, self.v_range);

        par_broadcast(&mut self.f, u_range, |i| {
            let diffusion = (dd(IX, u, i, h.x_squared) + dd(IY, u, i, h.y_squared)) / re;
            let convection = dsquare(IX, u, i, h.x, alpha) + dproduct(IY, IX, v, u, i, h.y, alpha);
            u[i] + dt * (diffusion - convection + gx)
        });

        let g = &mut self.g;
        HaloExchange::new(self.comm, &self.partition).exchange(&mut [&mut self.f], &mut || {
            par_broadcast(g, v_range, |i| {
                let diffusion = (dd(IX, v, i, h.x_squared) + dd(IY, v, i, h.y_squared)) / re;
                let convection =
                    dsquare(IY, v, i, h.y, alpha) + dproduct(IX, IY, u, v, i, h.x, alpha);
                v[i] + dt * (diffusion - convection + gy)
            });
        });
        HaloExchange::new(self.comm, &self.partition).refresh(&mut self.g);
    }

    /// Discrete divergence of `(F, G) / dt`
    pub fn compute_rhs(&mut self) {
        let (f, g, h, dt) = (&self.f, &self.g, self.h, self.dt);
        let range = self.rhs.range();
        par_broadcast(&mut self.rhs, range, |i| {
            ((f[i] - f[i - IX]) / h.x + (g[i] - g[i - IY]) / h.y) / dt
        });
    }

    /// Solve for `p` with the configured solver
    ///
    /// # Errors
    /// [`crate::error::Error::Diverged`] when the solver blows up.
    pub fn solve_pressure(&mut self) -> Result<()> {
        let _scope = self.profiler.scope("pressure solve");
        let mut problem = Poisson {
            comm: self.comm,
            partition: &self.partition,
            profiler: self.profiler,
            laplace: Laplace::new(&self.h),
            p: &mut self.p,
            rhs: &self.rhs,
            epsilon: self.settings.epsilon,
            max_iterations: self.settings.maximum_number_of_iterations,
        };
        let convergence = self.solver.solve(&mut problem)?;
        if self.comm.rank() == 0 {
            if convergence.converged {
                log::debug!(
                    "pressure solve: {} iterations, residual {:e}",
                    convergence.iterations,
                    convergence.residual
                );
            } else {
                log::warn!(
                    "pressure solve hit {} iterations, residual {:e}",
                    convergence.iterations,
                    convergence.residual
                );
            }
        }
        self.residual = convergence.residual;
        self.last_solve = Some(convergence);
        Ok(())
    }

    /// `u = F - dt dp/dx`, `v = G - dt dp/dy`, halos exchanged.
    ///
    /// The `u` halo travels while `v` is corrected.
    pub fn update_velocity(&mut self) {
        let (p, h, dt) = (&self.p, self.h, self.dt);
        let (f, g) = (&self.f, &self.g);
        let v_range = self.v_range;
        par_broadcast(&mut self.u, self.u_range, |i| f[i] - dt * d(IX, p, i, h.x));

        let v = &mut self.v;
        HaloExchange::new(self.comm, &self.partition).exchange(&mut [&mut self.u], &mut || {
            par_broadcast(v, v_range, |i| g[i] - dt * d(IY, p, i, h.y));
        });
        HaloExchange::new(self.comm, &self.partition).refresh(&mut self.v);
    }

    fn record(&mut self) {
        let iterations = self.last_solve.as_ref().map_or(0, |c| c.iterations) as f64;
        for (key, value) in [
            ("time", self.time),
            ("dt", self.dt),
            ("residual", self.residual),
            ("iterations", iterations),
        ] {
            self.diagnostics
                .entry(key.to_string())
                .or_insert_with(Vec::new)
                .push(value);
        }
    }
}

impl Integrate for PdeSystem<'_> {
    fn update(&mut self) -> Result<()> {
        self.step()
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn get_dt(&self) -> f64 {
        self.dt
    }

    fn callback(&mut self) -> Result<()> {
        if self.comm.rank() == 0 {
            log::info!(
                "time = {:10.5}, dt = {:10.3e}, pressure residual = {:10.3e}",
                self.time,
                self.dt,
                self.residual
            );
        }
        if self.writer.is_none() {
            return Ok(());
        }
        let _scope = self.profiler.scope("output");
        let snapshot = Snapshot::capture(self);
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&snapshot)?;
        }
        Ok(())
    }

    fn exit(&mut self) -> bool {
        let p = &self.p;
        let local = if p.range().iter().all(|i| p[i].is_finite()) {
            0.
        } else {
            1.
        };
        !self.dt.is_finite() || self.comm.all_reduce(local, ReduceOp::Max) > 0.
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::comm::{launch, LocalComm};
    use crate::grid::LayoutKind;
    use crate::index::Index;
    use crate::solver::SolverKind;
    use ndarray::Array2;

    fn approx_eq(result: f64, expected: f64, tol: f64) {
        let dif = (result - expected).abs();
        if dif > tol {
            panic!(
                "Large difference of values, got {} expected {}.",
                result, expected
            );
        }
    }

    fn cavity(cells: usize, kind: SolverKind) -> Settings {
        let mut settings = Settings::default();
        settings.n_cells = [cells, cells];
        settings.pressure_solver = kind;
        settings
    }

    fn divergence(system: &PdeSystem<'_>) -> f64 {
        let (u, v, h) = (&system.u, &system.v, system.h);
        system
            .p
            .range()
            .iter()
            .map(|i| ((u[i] - u[i - IX]) / h.x + (v[i] - v[i - IY]) / h.y).abs())
            .fold(0., f64::max)
    }

    #[test]
    fn test_dt_respects_all_limits() {
        let comm = LocalComm::solo();
        let mut settings = cavity(10, SolverKind::Sor);
        settings.maximum_dt = 10.;
        settings.end_time = 100.;
        let profiler = Profiler::new();
        let mut system = PdeSystem::new(&comm, &settings, &profiler).unwrap();
        let range = system.u.range();
        system.u.fill_with(range, |i| f64::from(i.x) * 0.5);
        system.v.fill_with(range, |i| -f64::from(i.y));
        system.compute_dt();
        let h = system.h;
        // |u|max = 5, |v|max = 10
        let expected = settings.tau
            * (settings.re / 2. * h.x_squared * h.y_squared / (h.x_squared + h.y_squared))
                .min(h.x / 5.)
                .min(h.y / 10.);
        approx_eq(system.dt, expected, 1e-14);

        let mut capped_settings = settings.clone();
        capped_settings.maximum_dt = 1e-3;
        let mut capped = PdeSystem::new(&comm, &capped_settings, &profiler).unwrap();
        capped.compute_dt();
        approx_eq(capped.dt, 1e-3, 1e-14);

        // never past the end time
        capped.time = capped_settings.end_time - 1e-4;
        capped.compute_dt();
        approx_eq(capped.dt, 1e-4, 1e-12);
    }

    #[test]
    fn test_wall_velocities() {
        let comm = LocalComm::solo();
        let settings = cavity(6, SolverKind::Sor);
        let profiler = Profiler::new();
        let mut system = PdeSystem::new(&comm, &settings, &profiler).unwrap();
        let range = system.u.full_range();
        system.u.fill_with(range, |i| 0.1 * f64::from(i.x + i.y));
        system.set_velocity_boundary();
        // the right wall column is excluded, its corner ghosts belong to the wall
        for x in 1..6 {
            // lid moves with 1, ghost mirrors around it
            let top = Index::new(x, 7);
            approx_eq((system.u[top] + system.u[top - IY]) / 2., 1., 1e-14);
            let bottom = Index::new(x, 0);
            approx_eq((system.u[bottom] + system.u[bottom + IY]) / 2., 0., 1e-14);
        }
        for y in 1..=6 {
            approx_eq(system.u[Index::new(0, y)], 0., 0.);
            approx_eq(system.u[Index::new(6, y)], 0., 0.);
            approx_eq(system.v[Index::new(y, 6)], 0., 0.);
        }
    }

    #[test]
    fn test_cavity_steps() {
        let comm = LocalComm::solo();
        let settings = cavity(20, SolverKind::Sor);
        let profiler = Profiler::new();
        let mut system = PdeSystem::new(&comm, &settings, &profiler).unwrap();
        for _ in 0..5 {
            system.step().unwrap();
        }
        let convergence = system.last_solve.clone().unwrap();
        assert!(convergence.converged);
        assert!(system.residual < settings.epsilon);
        assert!(system.p.max(&comm).is_finite() && system.p.min(&comm).is_finite());
        assert!(!system.exit());
        assert_eq!(system.diagnostics["dt"].len(), 5);
        approx_eq(system.time, system.diagnostics["dt"].iter().sum(), 1e-12);
        assert_eq!(profiler.calls("time step"), 5);
        // the lid drags the fluid along
        assert!(system.u.max(&comm) > 0.);
    }

    #[test]
    fn test_velocity_is_divergence_free() {
        let comm = LocalComm::solo();
        let mut settings = cavity(12, SolverKind::Cg);
        settings.epsilon = 1e-11;
        let profiler = Profiler::new();
        let mut system = PdeSystem::new(&comm, &settings, &profiler).unwrap();
        for _ in 0..3 {
            system.step().unwrap();
            approx_eq(divergence(&system), 0., 1e-7);
        }
    }

    #[test]
    fn test_non_finite_pressure_exits() {
        let comm = LocalComm::solo();
        let settings = cavity(4, SolverKind::Jacobi);
        let profiler = Profiler::new();
        let mut system = PdeSystem::new(&comm, &settings, &profiler).unwrap();
        assert!(!system.exit());
        system.p[Index::new(2, 3)] = f64::NAN;
        assert!(system.exit());
    }

    type Fields = ([usize; 2], Array2<f64>, Array2<f64>, Array2<f64>);

    fn run(comm: &dyn Communicator, settings: &Settings, steps: usize) -> Fields {
        let profiler = Profiler::new();
        let mut system = PdeSystem::new(comm, settings, &profiler).unwrap();
        for _ in 0..steps {
            system.step().unwrap();
        }
        let range = system.p.range();
        (
            system.partition.offset,
            system.u.to_array(range),
            system.v.to_array(range),
            system.p.to_array(range),
        )
    }

    fn gather(parts: &[Fields], cells: usize) -> [Array2<f64>; 3] {
        let mut global = [
            Array2::zeros((cells, cells)),
            Array2::zeros((cells, cells)),
            Array2::zeros((cells, cells)),
        ];
        for (offset, u, v, p) in parts {
            for (field, local) in global.iter_mut().zip([u, v, p]) {
                for ((i, j), value) in local.indexed_iter() {
                    field[[offset[0] + i, offset[1] + j]] = *value;
                }
            }
        }
        global
    }

    #[test]
    fn test_four_ranks_match_one() {
        for kind in [SolverKind::Jacobi, SolverKind::RedBlack, SolverKind::Cg] {
            let mut settings = cavity(12, kind);
            settings.epsilon = 0.;
            settings.maximum_number_of_iterations = 30;
            let single = {
                let comm = LocalComm::solo();
                gather(&[run(&comm, &settings, 3)], 12)
            };
            let mut zorder = settings.clone();
            zorder.layout = LayoutKind::ZOrder;
            let parts = launch(4, |comm| run(&comm, &zorder, 3));
            let split = gather(&parts, 12);
            for (a, b) in split.iter().zip(single.iter()) {
                for (x, y) in a.iter().zip(b.iter()) {
                    approx_eq(*x, *y, 1e-10);
                }
            }
        }
    }
}
