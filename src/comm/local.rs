//! In-process backend: every rank is a thread, messages travel through
//! channels and reductions through a shared slot table.
use super::{Communicator, ReduceOp, Transfer};
use std::cell::RefCell;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: i32,
    payload: Vec<f64>,
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<f64>>,
}

/// One rank of an in-process universe.
///
/// Reductions fold the contributions in rank order, so results do not
/// depend on thread scheduling.
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    outboxes: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    /// Arrived, not yet matched messages (in arrival order)
    pending: RefCell<Vec<Envelope>>,
    shared: Arc<Shared>,
}

impl LocalComm {
    /// Connected ranks `0..size`
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        assert!(size > 0, "A universe needs at least one rank.");
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![0.; size]),
        });
        let (outboxes, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| channel()).unzip();
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalComm {
                rank,
                size,
                outboxes: outboxes.clone(),
                inbox,
                pending: RefCell::new(Vec::new()),
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Universe with a single rank
    pub fn solo() -> Self {
        Self::universe(1).remove(0)
    }

    fn slots(&self) -> MutexGuard<'_, Vec<f64>> {
        self.shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Next message accepted by `wanted`; earlier arrivals are searched
    /// first, so messages with equal source and tag never overtake
    fn next_matching<P: Fn(&Envelope) -> bool>(&self, wanted: P) -> Envelope {
        let mut pending = self.pending.borrow_mut();
        if let Some(pos) = pending.iter().position(|e| wanted(e)) {
            return pending.remove(pos);
        }
        loop {
            let envelope = self
                .inbox
                .recv()
                .unwrap_or_else(|_| panic!("Rank {} lost its inbox.", self.rank));
            if wanted(&envelope) {
                return envelope;
            }
            pending.push(envelope);
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce(&self, value: f64, op: ReduceOp) -> f64 {
        if self.size == 1 {
            return value;
        }
        self.slots()[self.rank] = value;
        self.shared.barrier.wait();
        let result = self
            .slots()
            .iter()
            .copied()
            .reduce(|a, b| op.apply(a, b))
            .unwrap_or(value);
        // nobody may overwrite a slot before everyone has read
        self.shared.barrier.wait();
        result
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    /// # Panics
    /// Panics if a peer rank is gone or a payload has the wrong length.
    fn exchange(&self, transfers: &mut [Transfer], overlap: &mut dyn FnMut()) -> Vec<usize> {
        for t in transfers.iter() {
            let envelope = Envelope {
                source: self.rank,
                tag: t.send_tag,
                payload: t.send.clone(),
            };
            if self.outboxes[t.peer].send(envelope).is_err() {
                panic!("Rank {} can not reach rank {}.", self.rank, t.peer);
            }
        }

        overlap();

        let mut open: Vec<usize> = (0..transfers.len()).collect();
        let mut order = Vec::with_capacity(open.len());
        while !open.is_empty() {
            let matches = |e: &Envelope, n: usize| {
                transfers[n].peer == e.source && transfers[n].recv_tag == e.tag
            };
            let envelope = self.next_matching(|e| open.iter().any(|&n| matches(e, n)));
            let pos = open
                .iter()
                .position(|&n| matches(&envelope, n))
                .unwrap_or_else(|| panic!("Unmatched message on rank {}.", self.rank));
            let n = open.remove(pos);
            assert_eq!(
                transfers[n].recv.len(),
                envelope.payload.len(),
                "Payload length mismatch from rank {}.",
                envelope.source
            );
            transfers[n].recv.copy_from_slice(&envelope.payload);
            order.push(n);
        }
        order
    }
}

/// Run `f` once per rank of a fresh universe of `size` ranks, each on its
/// own thread, and collect the results in rank order.
///
/// # Panics
/// Re-raises the panic of any rank.
pub fn launch<R, F>(size: usize, f: F) -> Vec<R>
where
    F: Fn(LocalComm) -> R + Sync,
    R: Send,
{
    let comms = LocalComm::universe(size);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_all_reduce() {
        let results = launch(4, |comm| {
            let x = comm.rank() as f64;
            (
                comm.all_reduce(x, ReduceOp::Sum),
                comm.all_reduce(x, ReduceOp::Max),
                comm.all_reduce(x, ReduceOp::Min),
            )
        });
        for r in results {
            assert_eq!(r, (6., 3., 0.));
        }
    }

    #[test]
    fn test_ring_exchange() {
        let size = 3;
        let results = launch(size, |comm| {
            let rank = comm.rank();
            let right = (rank + 1) % size;
            let left = (rank + size - 1) % size;
            let mut transfers = vec![
                Transfer {
                    peer: right,
                    send_tag: 3,
                    recv_tag: 2,
                    send: vec![rank as f64; 2],
                    recv: vec![0.; 2],
                },
                Transfer {
                    peer: left,
                    send_tag: 2,
                    recv_tag: 3,
                    send: vec![10. * rank as f64; 2],
                    recv: vec![0.; 2],
                },
            ];
            let mut overlapped = false;
            let order = comm.exchange(&mut transfers, &mut || overlapped = true);
            assert!(overlapped);
            assert_eq!(order.len(), 2);
            (transfers[0].recv[0], transfers[1].recv[0])
        });
        for (rank, (from_right, from_left)) in results.into_iter().enumerate() {
            let right = (rank + 1) % size;
            let left = (rank + size - 1) % size;
            assert_eq!(from_right, 10. * right as f64);
            assert_eq!(from_left, left as f64);
        }
    }
}
