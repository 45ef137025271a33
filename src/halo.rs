//! # Halo exchange
//!
//! Refreshes the ghost cells that face another rank with that rank's
//! adjacent interior cells. Ghost cells at walls are left alone, they
//! belong to the boundary conditions.
//!
//! An exchange runs in two phases. Left and right halos (without
//! corners) go first, then full top and bottom rows including the
//! ghost columns. The corner ghost cells therefore end up with the
//! values of the diagonal neighbour.
use crate::boundaries::Side;
use crate::comm::{Communicator, Transfer};
use crate::grid::Grid;
use crate::index::Range;
use crate::partition::Partition;

/// Tag stride between grids exchanged in one region
const TAG_STRIDE: i32 = 8;

/// Halo exchange of one rank
pub struct HaloExchange<'a> {
    comm: &'a dyn Communicator,
    partition: &'a Partition,
}

impl<'a> HaloExchange<'a> {
    /// Exchange between the neighbours listed in `partition`
    pub fn new(comm: &'a dyn Communicator, partition: &'a Partition) -> Self {
        Self { comm, partition }
    }

    /// Refresh the halo of one grid
    pub fn refresh(&self, grid: &mut Grid) {
        self.exchange(&mut [grid], &mut || {});
    }

    /// Refresh the halos of several grids at once.
    ///
    /// `overlap` runs after all transfers of the first phase are posted
    /// and before they are awaited. It must not touch the exchanged
    /// grids.
    pub fn exchange(&self, grids: &mut [&mut Grid], overlap: &mut dyn FnMut()) {
        self.phase([Side::Left, Side::Right], grids, overlap);
        self.phase([Side::Top, Side::Bottom], grids, &mut || {});
    }

    fn phase(&self, sides: [Side; 2], grids: &mut [&mut Grid], overlap: &mut dyn FnMut()) {
        let mut transfers = Vec::new();
        let mut targets: Vec<(usize, Range)> = Vec::new();
        for (k, grid) in grids.iter().enumerate() {
            let base = TAG_STRIDE * k as i32;
            for side in sides {
                if let Some(peer) = self.partition.neighbour(side).rank() {
                    let inner = grid.boundaries().inner(side);
                    let halo = grid.boundaries().halo(side);
                    let mut send = vec![0.; inner.size()];
                    grid.pack(inner, &mut send);
                    transfers.push(Transfer {
                        peer,
                        send_tag: base + side.id() as i32,
                        recv_tag: base + side.opposite().id() as i32,
                        send,
                        recv: vec![0.; halo.size()],
                    });
                    targets.push((k, halo));
                }
            }
        }

        if transfers.is_empty() {
            overlap();
            return;
        }
        for n in self.comm.exchange(&mut transfers, overlap) {
            let (k, halo) = targets[n];
            grids[k].unpack(halo, &transfers[n].recv);
        }
    }
}
