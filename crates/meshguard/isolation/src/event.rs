//! Events emitted when a peer's isolation state changes.
//!
//! Events are collected while the record store is locked and dispatched
//! only after the lock is released, so a subscriber may call back into
//! the manager without deadlocking.

use meshguard_types::{IsolationLevel, PeerId};
use serde::{Deserialize, Serialize};

use crate::record::IsolationRecord;

/// Isolation state change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsolationEvent {
    /// A new record was created for the peer.
    PeerIsolated {
        record: IsolationRecord,
    },

    /// An existing record was re-applied or stepped up its ladder.
    PeerEscalated {
        record: IsolationRecord,
        previous_level: IsolationLevel,
    },

    /// The peer has no records left; it is unrestricted again.
    PeerReleased {
        peer_id: PeerId,
        /// Always `IsolationLevel::None`; carried so subscribers observe
        /// the level transition without a follow-up query.
        level: IsolationLevel,
        /// Whether an operator forced the release.
        forced: bool,
    },
}

impl IsolationEvent {
    /// Peer this event concerns.
    pub fn peer_id(&self) -> &PeerId {
        match self {
            IsolationEvent::PeerIsolated { record } => &record.peer_id,
            IsolationEvent::PeerEscalated { record, .. } => &record.peer_id,
            IsolationEvent::PeerReleased { peer_id, .. } => peer_id,
        }
    }

    /// Level the peer holds after this event.
    pub fn level(&self) -> IsolationLevel {
        match self {
            IsolationEvent::PeerIsolated { record } => record.level,
            IsolationEvent::PeerEscalated { record, .. } => record.level,
            IsolationEvent::PeerReleased { level, .. } => *level,
        }
    }
}
