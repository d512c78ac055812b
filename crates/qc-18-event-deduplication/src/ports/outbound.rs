//! Outbound Ports (Driven Ports)
//!
//! Dependencies the deduplicator needs from the rest of the node.

use shared_types::NodeId;

/// Per-peer accounting of events travelling through the intake pipeline.
///
/// Gossip calls [`event_entered`](Self::event_entered) when it admits an
/// event from a peer; every stage that drops the event calls
/// [`event_exited`](Self::event_exited) so the peer's budget is released.
pub trait IntakeEventCounter: Send + Sync {
    /// An event from `peer` entered the pipeline.
    fn event_entered(&self, peer: NodeId);

    /// An event from `peer` left the pipeline without reaching consensus.
    fn event_exited(&self, peer: NodeId);

    /// Whether `peer` still has events inside the pipeline.
    fn has_unprocessed_events(&self, peer: NodeId) -> bool;
}

/// Counter that tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpIntakeEventCounter;

impl IntakeEventCounter for NoOpIntakeEventCounter {
    fn event_entered(&self, _: NodeId) {}
    fn event_exited(&self, _: NodeId) {}
    fn has_unprocessed_events(&self, _: NodeId) -> bool {
        false
    }
}
