//! Best-effort fan-out of one chunk to a set of peers.
//!
//! Every write is a single non-blocking attempt. A peer that cannot take the
//! whole chunk right now loses the remainder; nothing is queued or retried,
//! so one slow consumer never holds up the others.

use std::io;

use tracing::{debug, warn};

use crate::registry::{ConnectionTable, SlotIndex};

/// Write end of a broadcast destination.
pub trait PeerSink {
    /// One non-blocking write attempt. Returns the bytes accepted.
    fn offer(&self, chunk: &[u8]) -> io::Result<usize>;
}

/// Result of offering one chunk to one peer.
#[derive(Debug)]
pub enum Delivery {
    /// The whole chunk was accepted.
    Complete,
    /// Only the first `n` bytes were accepted.
    Partial(usize),
    /// The peer's buffer is full.
    WouldBlock,
    /// The write failed.
    Failed(io::Error),
}

/// Offer a chunk to one sink.
pub fn deliver<S: PeerSink + ?Sized>(sink: &S, chunk: &[u8]) -> Delivery {
    match sink.offer(chunk) {
        Ok(n) if n == chunk.len() => Delivery::Complete,
        Ok(n) => Delivery::Partial(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Delivery::WouldBlock,
        Err(e) => Delivery::Failed(e),
    }
}

/// Outcome of a fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers that took the whole chunk.
    pub delivered: usize,
    /// Peers that took part of it or nothing.
    pub dropped: usize,
}

/// Offer `chunk` to every occupied slot except `origin`, in table order.
pub fn fan_out<S: PeerSink>(
    table: &ConnectionTable<S>,
    chunk: &[u8],
    origin: Option<SlotIndex>,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for (slot, peer) in table.iter_active() {
        if Some(slot) == origin {
            continue;
        }
        match deliver(peer, chunk) {
            Delivery::Complete => report.delivered += 1,
            Delivery::Partial(written) => {
                warn!(slot = %slot, written, bytes = chunk.len(), "Partial write to peer, remainder dropped");
                report.dropped += 1;
            }
            Delivery::WouldBlock => {
                warn!(slot = %slot, bytes = chunk.len(), "Peer not writable, chunk dropped");
                report.dropped += 1;
            }
            Delivery::Failed(e) => {
                debug!(slot = %slot, error = %e, "Write to peer failed");
                report.dropped += 1;
            }
        }
    }
    report
}
