//! MPI backend, one process per rank
use super::{Communicator, ReduceOp, Transfer};
use mpi::collective::SystemOperation;
use mpi::request::{multiple_scope, RequestCollection};
use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::*;
pub use mpi::environment::Universe;

/// Initialize MPI, `None` if it was initialized before
pub fn initialize() -> Option<Universe> {
    mpi::initialize()
}

/// All ranks of `MPI_COMM_WORLD`
pub struct MpiWorld<'a> {
    /// Keeps MPI alive as long as the communicator is in use
    pub universe: &'a Universe,
    world: SimpleCommunicator,
}

impl<'a> MpiWorld<'a> {
    /// World communicator of an initialized universe
    pub fn new(universe: &'a Universe) -> Self {
        Self {
            universe,
            world: universe.world(),
        }
    }
}

impl Communicator for MpiWorld<'_> {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn all_reduce(&self, value: f64, op: ReduceOp) -> f64 {
        let mut result = 0.;
        let operation = match op {
            ReduceOp::Sum => SystemOperation::sum(),
            ReduceOp::Max => SystemOperation::max(),
            ReduceOp::Min => SystemOperation::min(),
        };
        self.world.all_reduce_into(&value, &mut result, operation);
        result
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn exchange(&self, transfers: &mut [Transfer], overlap: &mut dyn FnMut()) -> Vec<usize> {
        let world = &self.world;
        let mut order = Vec::with_capacity(transfers.len());
        multiple_scope(
            2 * transfers.len(),
            |scope, requests: &mut RequestCollection<'_, [f64]>| {
                for t in transfers.iter_mut() {
                    let peer = world.process_at_rank(t.peer as Rank);
                    requests.add(peer.immediate_send_with_tag(scope, &t.send[..], t.send_tag));
                    requests.add(peer.immediate_receive_into_with_tag(
                        scope,
                        &mut t.recv[..],
                        t.recv_tag,
                    ));
                }

                overlap();

                // requests alternate send, receive
                while let Some((i, _status)) = requests.wait_any() {
                    if i % 2 == 1 {
                        order.push(i / 2);
                    }
                }
            },
        );
        order
    }
}
