//! Per-peer intake counter.

use crate::ports::IntakeEventCounter;
use parking_lot::Mutex;
use shared_types::NodeId;
use std::collections::HashMap;
use tracing::warn;

/// Counts, per peer, events that entered the pipeline and have not left it.
#[derive(Debug, Default)]
pub struct PeerIntakeCounter {
    unprocessed: Mutex<HashMap<NodeId, u64>>,
}

impl PeerIntakeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events from `peer` still inside the pipeline.
    pub fn unprocessed(&self, peer: NodeId) -> u64 {
        self.unprocessed.lock().get(&peer).copied().unwrap_or(0)
    }

    /// Forget every peer, e.g. after a reconnect.
    pub fn reset(&self) {
        self.unprocessed.lock().clear();
    }
}

impl IntakeEventCounter for PeerIntakeCounter {
    fn event_entered(&self, peer: NodeId) {
        *self.unprocessed.lock().entry(peer).or_insert(0) += 1;
    }

    fn event_exited(&self, peer: NodeId) {
        let mut unprocessed = self.unprocessed.lock();
        match unprocessed.get_mut(&peer) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                unprocessed.remove(&peer);
            }
            None => warn!(%peer, "Event exited pipeline without entering"),
        }
    }

    fn has_unprocessed_events(&self, peer: NodeId) -> bool {
        self.unprocessed(peer) > 0
    }
}
