//! # Core Domain Entities
//!
//! Defines the gossip/consensus event entities shared by the intake pipeline.
//!
//! ## Clusters
//!
//! - **Identity**: `NodeId`, `Hash`
//! - **Events**: `EventDescriptor`, `PlatformEvent`
//! - **Horizon**: `AncientMode`, `EventWindow`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte event hash.
pub type Hash = [u8; 32];

/// Unique identifier for a node in the address book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

// =============================================================================
// CLUSTER B: EVENTS
// =============================================================================

/// The ordering key used to decide whether an event is ancient.
///
/// Networks migrate from generation-based to birth-round-based ancient
/// thresholds, so both are carried on every descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AncientMode {
    /// Ancient threshold is expressed in event generations.
    #[default]
    GenerationThreshold,
    /// Ancient threshold is expressed in birth rounds.
    BirthRoundThreshold,
}

/// Immutable identity of an event, independent of its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Hash of the unsigned event.
    pub hash: Hash,
    /// Node that created the event.
    pub creator: NodeId,
    /// Generation of the event (max parent generation + 1).
    pub generation: u64,
    /// Consensus round in which the event was created.
    pub birth_round: u64,
}

impl EventDescriptor {
    pub fn new(hash: Hash, creator: NodeId, generation: u64, birth_round: u64) -> Self {
        Self {
            hash,
            creator,
            generation,
            birth_round,
        }
    }

    /// The ordering key compared against an [`EventWindow`] threshold.
    #[must_use]
    pub fn ancient_indicator(&self, mode: AncientMode) -> u64 {
        match mode {
            AncientMode::GenerationThreshold => self.generation,
            AncientMode::BirthRoundThreshold => self.birth_round,
        }
    }
}

impl fmt::Display for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} gen={} br={} {})",
            self.creator,
            self.generation,
            self.birth_round,
            hex::encode(&self.hash[..6])
        )
    }
}

/// A candidate event received from gossip, prior to validation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Identity of the event.
    pub descriptor: EventDescriptor,
    /// Raw signature bytes over the event hash.
    #[serde_as(as = "Bytes")]
    pub signature: Vec<u8>,
    /// Peer the event was received from, `None` for self-events.
    pub sender: Option<NodeId>,
}

impl PlatformEvent {
    pub fn new(descriptor: EventDescriptor, signature: Vec<u8>) -> Self {
        Self {
            descriptor,
            signature,
            sender: None,
        }
    }

    /// Tag the event with the peer it was gossiped by.
    #[must_use]
    pub fn with_sender(mut self, sender: NodeId) -> Self {
        self.sender = Some(sender);
        self
    }

    #[must_use]
    pub fn descriptor(&self) -> &EventDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn ancient_indicator(&self, mode: AncientMode) -> u64 {
        self.descriptor.ancient_indicator(mode)
    }
}

// =============================================================================
// CLUSTER C: HORIZON
// =============================================================================

/// First generation any event can have.
pub const FIRST_GENERATION: u64 = 0;

/// First round of consensus.
pub const ROUND_FIRST: u64 = 1;

/// The current non-ancient window, replaced wholesale as consensus advances.
///
/// An event is ancient when its ordering key is strictly below
/// `ancient_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    /// Most recent round to have reached consensus.
    pub latest_consensus_round: u64,
    /// Minimum non-ancient ordering key.
    pub ancient_threshold: u64,
    /// Ordering key the threshold is expressed in.
    pub ancient_mode: AncientMode,
}

impl EventWindow {
    pub fn new(
        latest_consensus_round: u64,
        ancient_threshold: u64,
        ancient_mode: AncientMode,
    ) -> Self {
        Self {
            latest_consensus_round,
            ancient_threshold,
            ancient_mode,
        }
    }

    /// The window in effect before any round has reached consensus.
    #[must_use]
    pub fn genesis(ancient_mode: AncientMode) -> Self {
        let threshold = match ancient_mode {
            AncientMode::GenerationThreshold => FIRST_GENERATION,
            AncientMode::BirthRoundThreshold => ROUND_FIRST,
        };
        Self::new(0, threshold, ancient_mode)
    }

    /// Whether the descriptor falls below the ancient threshold.
    #[must_use]
    pub fn is_ancient(&self, descriptor: &EventDescriptor) -> bool {
        descriptor.ancient_indicator(self.ancient_mode) < self.ancient_threshold
    }
}
