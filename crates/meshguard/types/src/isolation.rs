//! Isolation vocabulary shared between the engine and its callers.
//!
//! Detectors report an [`IsolationReason`]; dispatch layers branch on the
//! resulting [`IsolationLevel`]. Both sides speak these types without
//! linking the engine itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of restriction applied to a peer, in ascending order.
///
/// The derived `Ord` follows declaration order; admission checks branch on
/// it and escalation never moves a peer down a level without an explicit
/// release.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum IsolationLevel {
    /// No restriction.
    #[default]
    None,

    /// Interactions are allowed but observed.
    Monitor,

    /// Interactions are allowed; the caller's limiter throttles them.
    RateLimit,

    /// Only essential operations are allowed.
    Restricted,

    /// Only health checks are allowed.
    Quarantine,

    /// All interactions are denied.
    Blocked,
}

impl IsolationLevel {
    /// Whether this level restricts the peer at all.
    pub fn is_isolated(&self) -> bool {
        *self != IsolationLevel::None
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::None => "none",
            IsolationLevel::Monitor => "monitor",
            IsolationLevel::RateLimit => "rate_limit",
            IsolationLevel::Restricted => "restricted",
            IsolationLevel::Quarantine => "quarantine",
            IsolationLevel::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

/// Why a peer was isolated. A record's reason selects the policy that
/// governs its escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationReason {
    /// A threat detector flagged the peer.
    ThreatDetected,

    /// The peer's trust score degraded below tolerance.
    TrustDegraded,

    /// Behavioral anomaly detected.
    AnomalyDetected,

    /// Authentication failure.
    AuthFailure,

    /// The peer violated the mesh protocol.
    ProtocolViolation,

    /// Operator-initiated isolation.
    AdminAction,

    /// Other peers voted to isolate.
    PeerConsensus,

    /// The peer abused shared resources.
    ResourceAbuse,
}

impl fmt::Display for IsolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationReason::ThreatDetected => "threat_detected",
            IsolationReason::TrustDegraded => "trust_degraded",
            IsolationReason::AnomalyDetected => "anomaly_detected",
            IsolationReason::AuthFailure => "auth_failure",
            IsolationReason::ProtocolViolation => "protocol_violation",
            IsolationReason::AdminAction => "admin_action",
            IsolationReason::PeerConsensus => "peer_consensus",
            IsolationReason::ResourceAbuse => "resource_abuse",
        };
        write!(f, "{}", s)
    }
}
