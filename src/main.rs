//! Run example:
//!
//! cargo mpirun --np 4 --bin staggerflow --release -- parameters/lid_driven_cavity.txt
//!
//! Without the `mpi` feature the run is a single rank. Set `RUST_LOG=info`
//! (or `debug`) to see progress.
use staggerflow::comm::Communicator;
use staggerflow::error::Result;
use staggerflow::integrate;
use staggerflow::output::Writer;
use staggerflow::profiler::Profiler;
use staggerflow::settings::Settings;
use staggerflow::system::PdeSystem;

fn writer<'a>() -> Box<dyn Writer + 'a> {
    #[cfg(feature = "hdf5")]
    {
        Box::new(staggerflow::output::Hdf5Writer::new("data"))
    }
    #[cfg(not(feature = "hdf5"))]
    {
        Box::new(staggerflow::output::TextWriter::new("out"))
    }
}

fn run(comm: &dyn Communicator, filename: &str) -> Result<()> {
    let settings = Settings::from_file(filename)?;
    let profiler = Profiler::new();
    let mut system = PdeSystem::new(comm, &settings, &profiler)?;
    system.writer = Some(writer());
    integrate(&mut system, settings.end_time, settings.output_interval)?;
    if comm.rank() == 0 {
        profiler.report();
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let filename = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "parameters.txt".to_string());

    #[cfg(feature = "mpi")]
    let result = match staggerflow::comm::initialize() {
        Some(universe) => run(&staggerflow::comm::MpiWorld::new(&universe), &filename),
        None => {
            log::error!("MPI was initialized before");
            std::process::exit(1);
        }
    };
    #[cfg(not(feature = "mpi"))]
    let result = run(&staggerflow::comm::LocalComm::solo(), &filename);

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
