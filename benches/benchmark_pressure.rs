use criterion::{criterion_group, criterion_main, Criterion};
use staggerflow::comm::LocalComm;
use staggerflow::discretization::Gridsize;
use staggerflow::grid::Grid;
use staggerflow::partition::Partition;
use staggerflow::profiler::Profiler;
use staggerflow::solver::{Laplace, Poisson, PressureSolve, PressureSolver, SolverKind};
use std::f64::consts::PI;

const SIZES: [usize; 2] = [64, 128];
const ITERATIONS: usize = 50;

fn rhs(partition: &Partition) -> Grid {
    let range = partition.range();
    let [nx, ny] = partition.global_cells;
    let mut rhs = Grid::new(range.begin, range.end);
    rhs.fill_with(range, |i| {
        let [gx, gy] = partition.global(i);
        let x = (gx as f64 + 0.5) / nx as f64;
        let y = (gy as f64 + 0.5) / ny as f64;
        (PI * x).cos() * (2. * PI * y).cos()
    });
    rhs
}

pub fn bench_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pressure");
    group.significance_level(0.1).sample_size(10);
    let comm = LocalComm::solo();
    let profiler = Profiler::new();
    for n in SIZES.iter() {
        let partition = Partition::new([*n, *n], 0, 1).unwrap();
        let rhs = rhs(&partition);
        let laplace = Laplace::new(&Gridsize::new([1., 1.], [*n, *n]));
        for kind in [
            SolverKind::Jacobi,
            SolverKind::Sor,
            SolverKind::RedBlack,
            SolverKind::Cg,
        ] {
            let name = format!("Size: {} x {}, {:?}", *n, *n, kind);
            let mut p = Grid::zeros_like(&rhs);
            let mut solver = PressureSolver::of_kind(kind, 1.7, &p);
            group.bench_function(&name, |b| {
                b.iter(|| {
                    p.fill(0.);
                    let mut problem = Poisson {
                        comm: &comm,
                        partition: &partition,
                        profiler: &profiler,
                        laplace,
                        p: &mut p,
                        rhs: &rhs,
                        epsilon: 0.,
                        max_iterations: ITERATIONS,
                    };
                    solver.solve(&mut problem).unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_pressure);
criterion_main!(benches);
