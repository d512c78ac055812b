//! Inbound Ports (Driving Ports)
//!
//! The API the intake pipeline uses to drive deduplication.

use crate::metrics::DedupMetricsSnapshot;
use shared_types::{EventWindow, PlatformEvent};

/// Deduplication of candidate events within the current non-ancient window.
pub trait EventDeduplicationApi {
    /// Returns the event if it has not been seen with this signature inside
    /// the current window, `None` if it is ancient or a duplicate.
    fn handle_event(&mut self, event: PlatformEvent) -> Option<PlatformEvent>;

    /// Replace the current window, evicting descriptors that became ancient.
    fn set_event_window(&mut self, window: EventWindow);

    /// Forget every recorded descriptor.
    fn clear(&mut self);

    /// Current window.
    fn event_window(&self) -> EventWindow;

    fn metrics(&self) -> DedupMetricsSnapshot;
}
