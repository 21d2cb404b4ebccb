//! Per-peer isolation records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use meshguard_types::{IsolationLevel, IsolationReason, PeerId};
use serde::{Deserialize, Serialize};

/// Live isolation state for one `(peer, reason)` pair.
///
/// Invariant: `expires_at` is `None` (never expires) or `>= started_at`.
/// Re-isolation under the same reason overwrites this record in place;
/// it is never duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationRecord {
    /// Peer under isolation.
    pub peer_id: PeerId,

    /// Current restriction level.
    pub level: IsolationLevel,

    /// Violation that triggered this record.
    pub reason: IsolationReason,

    /// When the record was created.
    pub started_at: DateTime<Utc>,

    /// When the record expires; `None` means it never does.
    pub expires_at: Option<DateTime<Utc>>,

    /// Escalation steps taken so far.
    pub escalation_count: u32,

    /// Free-text context supplied by the detector.
    pub details: String,

    /// Whether expiry alone clears this record.
    pub auto_recover: bool,
}

impl IsolationRecord {
    /// Whether the record has expired at the given instant. Pure function
    /// of the supplied time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires| now >= expires)
    }

    /// Time left until expiry, if any.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .and_then(|expires| expires.signed_duration_since(now).to_std().ok())
    }
}
