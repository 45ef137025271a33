//! # Communication between ranks
//!
//! Every rank owns one subdomain. Ranks meet only in collective
//! reductions and in neighbour transfers issued by the halo exchange.
//! Both are blocking, so every rank has to call them the same number of
//! times in the same order.
//!
//! Two backends implement [`Communicator`]:
//! - [`MpiWorld`] (feature `mpi`), one process per rank
//! - [`LocalComm`], one thread per rank inside a single process
mod local;
#[cfg(feature = "mpi")]
mod mpi_world;

pub use local::{launch, LocalComm};
#[cfg(feature = "mpi")]
pub use mpi_world::{initialize, MpiWorld};

/// Reduction operator of [`Communicator::all_reduce`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    /// Sum over ranks
    Sum,
    /// Maximum over ranks
    Max,
    /// Minimum over ranks
    Min,
}

impl ReduceOp {
    /// Combine two values
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }
}

/// One neighbour transfer: `send` goes to `peer` tagged `send_tag`,
/// `recv` is filled from `peer` with a message tagged `recv_tag`
#[derive(Clone, Debug)]
pub struct Transfer {
    /// Neighbour rank
    pub peer: usize,
    /// Tag of the outgoing message
    pub send_tag: i32,
    /// Tag of the incoming message
    pub recv_tag: i32,
    /// Outgoing payload
    pub send: Vec<f64>,
    /// Incoming payload, sized by the caller
    pub recv: Vec<f64>,
}

/// Message passing between the ranks of one run
pub trait Communicator {
    /// Id of this rank
    fn rank(&self) -> usize;

    /// Number of ranks
    fn size(&self) -> usize;

    /// Combine `value` over all ranks, the result is identical on every rank
    fn all_reduce(&self, value: f64, op: ReduceOp) -> f64;

    /// Block until every rank arrived
    fn barrier(&self);

    /// Post all sends and receives of `transfers` without blocking, run
    /// `overlap`, then wait until every transfer completed.
    ///
    /// Returns the transfer positions in the order their receives
    /// completed. The wait always happens before this returns.
    fn exchange(&self, transfers: &mut [Transfer], overlap: &mut dyn FnMut()) -> Vec<usize>;
}
