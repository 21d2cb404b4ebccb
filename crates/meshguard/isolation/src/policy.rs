//! Escalation policies keyed by violation reason.
//!
//! A policy is an ordered level ladder plus the arithmetic that maps an
//! escalation count to a level and a duration. Lookups and arithmetic are
//! pure; no I/O, no locking.

use std::collections::HashMap;
use std::time::Duration;

use meshguard_types::{IsolationLevel, IsolationReason};
use serde::{Deserialize, Serialize};

use crate::error::{IsolationError, IsolationResult};

/// Immutable escalation rule for one violation reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationPolicy {
    /// Ordered level ladder; escalation walks it upward and clamps at the top.
    pub levels: Vec<IsolationLevel>,

    /// Violations per escalation step.
    pub escalation_threshold: u32,

    /// Duration applied at escalation count zero.
    pub initial_duration: Duration,

    /// Geometric growth factor for the duration per escalation step.
    pub escalation_multiplier: f64,

    /// Upper bound on the computed duration.
    pub max_duration: Duration,

    /// Whether records under this policy clear themselves on expiry.
    pub auto_recover: bool,
}

impl IsolationPolicy {
    /// Level for the given escalation count; clamps at the ladder's top.
    pub fn level_for(&self, escalation_count: u32) -> IsolationLevel {
        let idx = (escalation_count as usize).min(self.levels.len().saturating_sub(1));
        self.levels.get(idx).copied().unwrap_or_default()
    }

    /// Duration for the given escalation count:
    /// `min(initial * multiplier^count, max)`.
    pub fn duration_for(&self, escalation_count: u32) -> Duration {
        let secs = self.initial_duration.as_secs_f64()
            * self.escalation_multiplier.powi(escalation_count as i32);
        Duration::from_secs_f64(secs.min(self.max_duration.as_secs_f64()))
    }

    /// Escalation count derived from a monotone violation counter.
    pub fn escalation_count_for(&self, violations: u32) -> u32 {
        violations / self.escalation_threshold.max(1)
    }

    /// Policy applied when a reason has no registered policy: a single
    /// `Restricted` step of 300 seconds that recovers on its own.
    pub fn fallback() -> Self {
        Self {
            levels: vec![IsolationLevel::Restricted],
            escalation_threshold: 1,
            initial_duration: Duration::from_secs(300),
            escalation_multiplier: 1.0,
            max_duration: Duration::from_secs(300),
            auto_recover: true,
        }
    }

    fn threat_response() -> Self {
        Self {
            levels: vec![
                IsolationLevel::Restricted,
                IsolationLevel::Quarantine,
                IsolationLevel::Blocked,
            ],
            escalation_threshold: 2,
            initial_duration: Duration::from_secs(300),
            escalation_multiplier: 4.0,
            max_duration: Duration::from_secs(86_400),
            auto_recover: true,
        }
    }

    fn trust_degradation() -> Self {
        Self {
            levels: vec![
                IsolationLevel::RateLimit,
                IsolationLevel::Restricted,
                IsolationLevel::Quarantine,
            ],
            escalation_threshold: 3,
            initial_duration: Duration::from_secs(600),
            escalation_multiplier: 2.0,
            max_duration: Duration::from_secs(43_200),
            auto_recover: true,
        }
    }

    fn auth_failure() -> Self {
        Self {
            levels: vec![
                IsolationLevel::RateLimit,
                IsolationLevel::Restricted,
                IsolationLevel::Blocked,
            ],
            escalation_threshold: 5,
            initial_duration: Duration::from_secs(60),
            escalation_multiplier: 3.0,
            max_duration: Duration::from_secs(3_600),
            auto_recover: true,
        }
    }

    fn anomaly_detection() -> Self {
        Self {
            levels: vec![
                IsolationLevel::Monitor,
                IsolationLevel::RateLimit,
                IsolationLevel::Restricted,
            ],
            escalation_threshold: 3,
            initial_duration: Duration::from_secs(120),
            escalation_multiplier: 2.0,
            max_duration: Duration::from_secs(7_200),
            auto_recover: true,
        }
    }

    fn protocol_violation() -> Self {
        Self {
            levels: vec![IsolationLevel::Quarantine, IsolationLevel::Blocked],
            escalation_threshold: 1,
            initial_duration: Duration::from_secs(3_600),
            escalation_multiplier: 4.0,
            max_duration: Duration::from_secs(604_800),
            auto_recover: false,
        }
    }
}

/// Reason-keyed policy table with the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTable {
    policies: HashMap<IsolationReason, IsolationPolicy>,
    fallback: IsolationPolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            IsolationReason::ThreatDetected,
            IsolationPolicy::threat_response(),
        );
        policies.insert(
            IsolationReason::TrustDegraded,
            IsolationPolicy::trust_degradation(),
        );
        policies.insert(IsolationReason::AuthFailure, IsolationPolicy::auth_failure());
        policies.insert(
            IsolationReason::AnomalyDetected,
            IsolationPolicy::anomaly_detection(),
        );
        policies.insert(
            IsolationReason::ProtocolViolation,
            IsolationPolicy::protocol_violation(),
        );

        Self {
            policies,
            fallback: IsolationPolicy::fallback(),
        }
    }
}

impl PolicyTable {
    /// Policy governing a reason, falling back to the default rule when
    /// none is registered. Never an error.
    pub fn policy_for(&self, reason: IsolationReason) -> &IsolationPolicy {
        self.policies.get(&reason).unwrap_or(&self.fallback)
    }

    /// Registered policy for a reason, if any.
    pub fn get(&self, reason: IsolationReason) -> Option<&IsolationPolicy> {
        self.policies.get(&reason)
    }

    /// Register or replace the policy for a reason.
    pub fn set_policy(
        &mut self,
        reason: IsolationReason,
        policy: IsolationPolicy,
    ) -> IsolationResult<()> {
        if policy.levels.is_empty() {
            return Err(IsolationError::InvalidPolicy {
                reason,
                detail: "level ladder must not be empty".to_string(),
            });
        }
        if policy.escalation_threshold == 0 {
            return Err(IsolationError::InvalidPolicy {
                reason,
                detail: "escalation threshold must be at least 1".to_string(),
            });
        }
        if policy.escalation_multiplier < 1.0 {
            return Err(IsolationError::InvalidPolicy {
                reason,
                detail: "escalation multiplier must be at least 1.0".to_string(),
            });
        }

        self.policies.insert(reason, policy);
        Ok(())
    }
}
