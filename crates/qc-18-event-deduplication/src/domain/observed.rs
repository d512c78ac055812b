//! Signatures observed per event descriptor within the non-ancient window.

use super::sequence_map::SequenceMap;
use shared_types::{AncientMode, EventDescriptor, EventWindow, PlatformEvent};
use std::collections::HashSet;

/// What happened to one candidate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Below the ancient threshold; not recorded.
    Ancient,
    /// First signature seen for this descriptor.
    Novel,
    /// New signature for a descriptor that already had one.
    DisparateSignature { signatures: usize },
    /// Descriptor and signature both seen before.
    Duplicate,
}

impl DedupOutcome {
    /// Whether the event continues down the pipeline.
    #[must_use]
    pub fn is_forwarded(self) -> bool {
        matches!(self, DedupOutcome::Novel | DedupOutcome::DisparateSignature { .. })
    }
}

/// Descriptor to signature-set map, keyed by the descriptor's ancient
/// indicator so it can be trimmed as the window advances.
#[derive(Debug)]
pub struct ObservedEvents {
    ancient_mode: AncientMode,
    signatures: SequenceMap<EventDescriptor, HashSet<Vec<u8>>>,
}

impl ObservedEvents {
    pub fn new(window: &EventWindow) -> Self {
        Self {
            ancient_mode: window.ancient_mode,
            signatures: SequenceMap::new(window.ancient_threshold),
        }
    }

    /// Classify `event` against `window`, recording its signature when it
    /// is not ancient.
    pub fn observe(&mut self, event: &PlatformEvent, window: &EventWindow) -> DedupOutcome {
        if window.is_ancient(&event.descriptor) {
            return DedupOutcome::Ancient;
        }
        let sequence = event.ancient_indicator(self.ancient_mode);
        let Some(seen) = self
            .signatures
            .get_or_insert_with(event.descriptor, sequence, HashSet::new)
        else {
            return DedupOutcome::Ancient;
        };

        if !seen.insert(event.signature.clone()) {
            DedupOutcome::Duplicate
        } else if seen.len() > 1 {
            DedupOutcome::DisparateSignature {
                signatures: seen.len(),
            }
        } else {
            DedupOutcome::Novel
        }
    }

    /// Evict descriptors that are ancient under `window`. Returns how many
    /// were evicted.
    pub fn shift_window(&mut self, window: &EventWindow) -> usize {
        self.ancient_mode = window.ancient_mode;
        self.signatures.shift_window(window.ancient_threshold)
    }

    pub fn clear(&mut self) {
        self.signatures.clear();
    }

    /// Number of descriptors currently tracked.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn contains(&self, descriptor: &EventDescriptor) -> bool {
        self.signatures.contains_key(descriptor)
    }
}
