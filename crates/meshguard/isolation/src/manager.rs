//! Auto-isolation manager.
//!
//! The manager owns all per-peer trust state: isolation records, violation
//! counters, and circuit breakers. Detectors call [`IsolationManager::isolate`],
//! dispatch layers call [`IsolationManager::is_allowed`] before every peer
//! interaction and report the outcome via `record_success`/`record_failure`.
//!
//! Locking: records and violation counters share one mutex so every
//! read-modify-write (isolate, escalate, release, reap) is atomic. Circuit
//! breakers live in a sharded map and carry their own locks, so the
//! admission hot path never waits behind a slow `isolate` call. No path
//! holds the store mutex and a breaker lock at the same time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use meshguard_types::{IsolationLevel, IsolationReason, PeerId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::clock::{Clock, SystemClock};
use crate::config::IsolationConfig;
use crate::error::IsolationResult;
use crate::event::IsolationEvent;
use crate::policy::{IsolationPolicy, PolicyTable};
use crate::record::IsolationRecord;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Callback invoked on every isolation state change, after the store lock
/// has been released.
pub type IsolationCallback = Arc<dyn Fn(&IsolationEvent) + Send + Sync>;

/// A violation report from a detector.
#[derive(Debug, Clone)]
pub struct IsolationRequest {
    /// Offending peer.
    pub peer_id: PeerId,

    /// Violation category; selects the governing policy.
    pub reason: IsolationReason,

    /// Free-text context from the detector.
    pub details: Option<String>,

    /// Bypass the policy's level ladder.
    pub level_override: Option<IsolationLevel>,

    /// Bypass the policy's duration arithmetic.
    pub duration_override: Option<Duration>,
}

impl IsolationRequest {
    /// Report a violation with no overrides.
    pub fn new(peer_id: PeerId, reason: IsolationReason) -> Self {
        Self {
            peer_id,
            reason,
            details: None,
            level_override: None,
            duration_override: None,
        }
    }

    /// Attach detector context.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Force a specific level regardless of policy.
    pub fn with_level(mut self, level: IsolationLevel) -> Self {
        self.level_override = Some(level);
        self
    }

    /// Force a specific duration regardless of policy.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_override = Some(duration);
        self
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Whether the operation may proceed.
    pub allowed: bool,

    /// Human-readable explanation.
    pub reason: String,
}

impl AccessDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Records and violation counters, guarded together by one mutex.
#[derive(Debug, Default)]
struct RecordStore {
    /// Live records per peer, one per triggering reason.
    records: HashMap<PeerId, HashMap<IsolationReason, IsolationRecord>>,

    /// Monotone violation counters; cleared only by explicit release.
    violations: HashMap<(PeerId, IsolationReason), u32>,
}

/// Process-local authority over peer trust state.
pub struct IsolationManager {
    config: IsolationConfig,
    policies: PolicyTable,
    clock: Arc<dyn Clock>,
    store: Mutex<RecordStore>,
    breakers: DashMap<PeerId, Arc<CircuitBreaker>>,
    callbacks: RwLock<Vec<IsolationCallback>>,
    event_tx: broadcast::Sender<IsolationEvent>,
}

impl IsolationManager {
    /// Create a manager with the built-in policies and the system clock.
    pub fn new(config: IsolationConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager with an injected clock.
    pub fn with_clock(config: IsolationConfig, clock: Arc<dyn Clock>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            policies: PolicyTable::default(),
            clock,
            store: Mutex::new(RecordStore::default()),
            breakers: DashMap::new(),
            callbacks: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    /// Register or replace the policy for a reason. Validates the policy.
    pub fn set_policy(
        &mut self,
        reason: IsolationReason,
        policy: IsolationPolicy,
    ) -> IsolationResult<()> {
        self.policies.set_policy(reason, policy)
    }

    /// Policy table currently in effect.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Subscribe to isolation events.
    pub fn subscribe(&self) -> broadcast::Receiver<IsolationEvent> {
        self.event_tx.subscribe()
    }

    /// Register a callback invoked on every isolation event.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&IsolationEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().unwrap().push(Arc::new(callback));
    }

    /// Apply a violation report: create a record for the peer or escalate
    /// the existing same-reason record in place.
    ///
    /// The violation counter for `(peer, reason)` is incremented first and
    /// the escalation step derives from it, so two near-simultaneous
    /// reports advance escalation by at most one step each and the final
    /// state reflects both.
    #[instrument(skip(self, request), fields(peer_id = %request.peer_id, reason = %request.reason))]
    pub fn isolate(&self, request: IsolationRequest) -> IsolationRecord {
        let IsolationRequest {
            peer_id,
            reason,
            details,
            level_override,
            duration_override,
        } = request;

        let now = self.clock.now();
        let policy = self.policies.policy_for(reason).clone();

        let (record, event) = {
            let mut store = self.store.lock().unwrap();

            let counter = store
                .violations
                .entry((peer_id.clone(), reason))
                .and_modify(|c| *c += 1)
                .or_insert(1);
            let violations = *counter;

            let escalation_count = policy.escalation_count_for(violations);
            let level = level_override.unwrap_or_else(|| policy.level_for(escalation_count));
            let duration =
                duration_override.unwrap_or_else(|| policy.duration_for(escalation_count));
            let expires_at = Some(
                now + chrono::Duration::from_std(duration)
                    .unwrap_or_else(|_| chrono::Duration::zero()),
            );

            let peer_records = store.records.entry(peer_id.clone()).or_default();
            match peer_records.get_mut(&reason) {
                Some(existing) if !existing.is_expired(now) => {
                    // Same reason while still active: overwrite in place,
                    // never create a second record for the pair.
                    let previous_level = existing.level;
                    existing.escalation_count = escalation_count;
                    existing.level = level;
                    existing.expires_at = expires_at;
                    existing.auto_recover = policy.auto_recover;
                    if let Some(details) = details {
                        existing.details = details;
                    }

                    info!(
                        peer_id = %existing.peer_id,
                        reason = %reason,
                        violations,
                        escalation_count,
                        level = %level,
                        "isolation escalated"
                    );
                    let record = existing.clone();
                    let event = IsolationEvent::PeerEscalated {
                        record: record.clone(),
                        previous_level,
                    };
                    (record, event)
                }
                _ => {
                    let record = IsolationRecord {
                        peer_id: peer_id.clone(),
                        level,
                        reason,
                        started_at: now,
                        expires_at,
                        escalation_count,
                        details: details.unwrap_or_default(),
                        auto_recover: policy.auto_recover,
                    };
                    peer_records.insert(reason, record.clone());

                    warn!(
                        peer_id = %peer_id,
                        reason = %reason,
                        violations,
                        level = %level,
                        "peer isolated"
                    );
                    let event = IsolationEvent::PeerIsolated {
                        record: record.clone(),
                    };
                    (record, event)
                }
            }
        };

        self.dispatch(vec![event]);
        record
    }

    /// Release a peer from isolation.
    ///
    /// Returns false when the peer has no records, or when any of them is
    /// non-auto-recoverable and `force` is false. A successful release
    /// clears the peer's records and violation counters and resets its
    /// circuit breaker.
    #[instrument(skip(self), fields(peer_id = %peer_id))]
    pub fn release(&self, peer_id: &PeerId, force: bool) -> bool {
        {
            let mut store = self.store.lock().unwrap();
            match store.records.get(peer_id) {
                None => return false,
                Some(records) if !force && records.values().any(|r| !r.auto_recover) => {
                    warn!(
                        peer_id = %peer_id,
                        "release refused: non-recoverable record requires force"
                    );
                    return false;
                }
                Some(_) => {}
            }

            store.records.remove(peer_id);
            store.violations.retain(|(p, _), _| p != peer_id);
        }

        if let Some(breaker) = self.breakers.get(peer_id) {
            breaker.reset();
        }

        info!(peer_id = %peer_id, forced = force, "peer released");
        self.dispatch(vec![IsolationEvent::PeerReleased {
            peer_id: peer_id.clone(),
            level: IsolationLevel::None,
            forced: force,
        }]);
        true
    }

    /// Current effective level for a peer: the max across its live
    /// records.
    ///
    /// Expired auto-recoverable records are released here as a side
    /// effect. An expired record that is not auto-recoverable keeps
    /// reporting its level until `release(peer, true)`.
    pub fn get_isolation_level(&self, peer_id: &PeerId) -> IsolationLevel {
        let now = self.clock.now();

        let (level, auto_released) = {
            let mut store = self.store.lock().unwrap();
            match store.records.get_mut(peer_id) {
                None => (IsolationLevel::None, false),
                Some(records) => {
                    records.retain(|_, r| !(r.auto_recover && r.is_expired(now)));
                    if records.is_empty() {
                        store.records.remove(peer_id);
                        (IsolationLevel::None, true)
                    } else {
                        let level = records
                            .values()
                            .map(|r| r.level)
                            .max()
                            .unwrap_or(IsolationLevel::None);
                        (level, false)
                    }
                }
            }
        };

        if auto_released {
            debug!(peer_id = %peer_id, "expired isolation auto-released");
            if let Some(breaker) = self.breakers.get(peer_id) {
                breaker.reset();
            }
            self.dispatch(vec![IsolationEvent::PeerReleased {
                peer_id: peer_id.clone(),
                level: IsolationLevel::None,
                forced: false,
            }]);
        }

        level
    }

    /// Admission check: may this peer perform this operation right now?
    ///
    /// Consults the circuit breaker first, then the peer's effective
    /// level. Read-only with respect to isolation state, so it is safe on
    /// every hot-path request; expired records are merely ignored here and
    /// reaped by `cleanup_expired`.
    pub fn is_allowed(&self, peer_id: &PeerId, operation: &str) -> AccessDecision {
        if let Some(breaker) = self.breakers.get(peer_id) {
            if !breaker.allow_request() {
                return AccessDecision::deny("Circuit breaker open");
            }
        }

        match self.effective_level(peer_id, self.clock.now()) {
            IsolationLevel::None => AccessDecision::allow("No isolation"),
            IsolationLevel::Monitor => {
                debug!(peer_id = %peer_id, operation, "operation observed under monitor");
                AccessDecision::allow("Monitored")
            }
            // Throttling is the caller-supplied limiter's job.
            IsolationLevel::RateLimit => AccessDecision::allow("Rate limited"),
            IsolationLevel::Restricted => {
                if self
                    .config
                    .essential_operations
                    .iter()
                    .any(|op| op == operation)
                {
                    AccessDecision::allow("Essential operation")
                } else {
                    AccessDecision::deny(format!(
                        "Operation '{}' not permitted while restricted",
                        operation
                    ))
                }
            }
            IsolationLevel::Quarantine => {
                if self
                    .config
                    .quarantine_operations
                    .iter()
                    .any(|op| op == operation)
                {
                    AccessDecision::allow("Quarantine-permitted operation")
                } else {
                    AccessDecision::deny("Peer quarantined")
                }
            }
            IsolationLevel::Blocked => AccessDecision::deny("Peer blocked"),
        }
    }

    /// Release every expired auto-recoverable record; returns how many
    /// were removed. Violation counters are retained, so a peer that
    /// re-offends after recovery escalates faster.
    #[instrument(skip(self))]
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0usize;
        let mut cleared_peers = Vec::new();

        {
            let mut store = self.store.lock().unwrap();
            for (peer_id, records) in store.records.iter_mut() {
                let before = records.len();
                records.retain(|_, r| !(r.auto_recover && r.is_expired(now)));
                removed += before - records.len();
                if records.is_empty() {
                    cleared_peers.push(peer_id.clone());
                }
            }
            for peer_id in &cleared_peers {
                store.records.remove(peer_id);
            }
        }

        let mut events = Vec::with_capacity(cleared_peers.len());
        for peer_id in cleared_peers {
            if let Some(breaker) = self.breakers.get(&peer_id) {
                breaker.reset();
            }
            events.push(IsolationEvent::PeerReleased {
                peer_id,
                level: IsolationLevel::None,
                forced: false,
            });
        }

        if removed > 0 {
            info!(removed, "expired isolation records reaped");
        }
        self.dispatch(events);
        removed
    }

    /// Report a successful interaction with a peer.
    pub fn record_success(&self, peer_id: &PeerId) {
        self.breaker(peer_id).record_success();
    }

    /// Report a failed interaction with a peer.
    pub fn record_failure(&self, peer_id: &PeerId) {
        self.breaker(peer_id).record_failure();
    }

    /// Get or lazily create the circuit breaker for a peer.
    pub fn breaker(&self, peer_id: &PeerId) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(peer_id.clone())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    peer_id.clone(),
                    self.config.circuit_breaker.clone(),
                    Arc::clone(&self.clock),
                ))
            })
            .clone()
    }

    /// Breaker state for a peer, if one has been created.
    pub fn breaker_state(&self, peer_id: &PeerId) -> Option<CircuitState> {
        self.breakers.get(peer_id).map(|b| b.state())
    }

    /// Live record for a `(peer, reason)` pair.
    pub fn record(&self, peer_id: &PeerId, reason: IsolationReason) -> Option<IsolationRecord> {
        let store = self.store.lock().unwrap();
        store
            .records
            .get(peer_id)
            .and_then(|records| records.get(&reason))
            .cloned()
    }

    /// Violation count for a `(peer, reason)` pair.
    pub fn violation_count(&self, peer_id: &PeerId, reason: IsolationReason) -> u32 {
        let store = self.store.lock().unwrap();
        store
            .violations
            .get(&(peer_id.clone(), reason))
            .copied()
            .unwrap_or(0)
    }

    /// Peers with at least one record on file.
    pub fn isolated_peers(&self) -> Vec<PeerId> {
        let store = self.store.lock().unwrap();
        store.records.keys().cloned().collect()
    }

    /// Read-only effective level: the max across records that are neither
    /// expired-and-auto-recoverable nor absent. Never mutates the store.
    fn effective_level(&self, peer_id: &PeerId, now: DateTime<Utc>) -> IsolationLevel {
        let store = self.store.lock().unwrap();
        store
            .records
            .get(peer_id)
            .map_or(IsolationLevel::None, |records| {
                records
                    .values()
                    .filter(|r| !(r.auto_recover && r.is_expired(now)))
                    .map(|r| r.level)
                    .max()
                    .unwrap_or(IsolationLevel::None)
            })
    }

    /// Two-phase notification: invoked strictly after the store lock has
    /// been released, so callbacks may re-enter the manager.
    fn dispatch(&self, events: Vec<IsolationEvent>) {
        if events.is_empty() {
            return;
        }

        let callbacks: Vec<IsolationCallback> = self.callbacks.read().unwrap().clone();
        for event in events {
            for callback in &callbacks {
                callback(&event);
            }
            // Send fails only when nobody is subscribed.
            let _ = self.event_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manager() -> (Arc<ManualClock>, IsolationManager) {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = IsolationManager::with_clock(IsolationConfig::default(), clock.clone());
        (clock, manager)
    }

    #[test]
    fn test_unknown_peer_defaults() {
        let (_clock, manager) = manager();
        let peer = PeerId::new("ghost");

        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::None);
        assert!(manager.is_allowed(&peer, "sync").allowed);
        assert!(!manager.release(&peer, true));
        assert_eq!(manager.violation_count(&peer, IsolationReason::AuthFailure), 0);
    }

    #[test]
    fn test_first_isolation_creates_record() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        let record = manager.isolate(
            IsolationRequest::new(peer.clone(), IsolationReason::AuthFailure)
                .with_details("bad signature"),
        );

        assert_eq!(record.level, IsolationLevel::RateLimit);
        assert_eq!(record.escalation_count, 0);
        assert_eq!(record.details, "bad signature");
        assert_eq!(
            record.expires_at,
            Some(clock.now() + chrono::Duration::seconds(60))
        );
        assert_eq!(manager.violation_count(&peer, IsolationReason::AuthFailure), 1);
    }

    #[test]
    fn test_same_reason_escalates_in_place() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        // Six auth failures cross the threshold (5) exactly once.
        for _ in 0..6 {
            manager.isolate(IsolationRequest::new(
                peer.clone(),
                IsolationReason::AuthFailure,
            ));
        }

        let record = manager
            .record(&peer, IsolationReason::AuthFailure)
            .unwrap();
        assert_eq!(record.escalation_count, 1);
        assert_eq!(record.level, IsolationLevel::Restricted);
        // 60s * 3^1
        assert_eq!(
            record.expires_at,
            Some(clock.now() + chrono::Duration::seconds(180))
        );
        assert_eq!(manager.violation_count(&peer, IsolationReason::AuthFailure), 6);
        // Still one record for the pair
        assert_eq!(manager.isolated_peers(), vec![peer]);
    }

    #[test]
    fn test_override_bypasses_policy() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        let record = manager.isolate(
            IsolationRequest::new(peer.clone(), IsolationReason::AdminAction)
                .with_level(IsolationLevel::Blocked)
                .with_duration(Duration::from_secs(7_200)),
        );
        assert_eq!(record.level, IsolationLevel::Blocked);
        assert_eq!(
            record.expires_at,
            Some(clock.now() + chrono::Duration::seconds(7_200))
        );
    }

    #[test]
    fn test_policyless_reason_uses_fallback() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        let record = manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::PeerConsensus,
        ));
        assert_eq!(record.level, IsolationLevel::Restricted);
        assert!(record.auto_recover);
        assert_eq!(
            record.expires_at,
            Some(clock.now() + chrono::Duration::seconds(300))
        );
    }

    #[test]
    fn test_release_round_trip() {
        let (_clock, manager) = manager();
        let peer = PeerId::new("p1");

        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::ThreatDetected,
        ));
        assert_ne!(manager.get_isolation_level(&peer), IsolationLevel::None);

        assert!(manager.release(&peer, true));
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::None);
        // Counters cleared by explicit release
        assert_eq!(
            manager.violation_count(&peer, IsolationReason::ThreatDetected),
            0
        );
    }

    #[test]
    fn test_non_recoverable_requires_force() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::ProtocolViolation,
        ));

        assert!(!manager.release(&peer, false));
        // threshold 1: the first violation is already escalation step 1
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::Blocked);

        // Expiry alone never frees it either (3600s * 4^1 = 14400s).
        clock.advance(Duration::from_secs(20_000));
        assert_eq!(manager.cleanup_expired(), 0);
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::Blocked);

        assert!(manager.release(&peer, true));
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::None);
    }

    #[test]
    fn test_expired_auto_recoverable_is_released_on_query() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::AnomalyDetected,
        ));
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::Monitor);

        clock.advance(Duration::from_secs(121));
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::None);
        assert!(manager.isolated_peers().is_empty());
        // Violation memory survives the auto-release
        assert_eq!(
            manager.violation_count(&peer, IsolationReason::AnomalyDetected),
            1
        );
    }

    #[test]
    fn test_cleanup_expired_counts_and_keeps_counters() {
        let (clock, manager) = manager();
        let p1 = PeerId::new("p1");
        let p2 = PeerId::new("p2");

        manager.isolate(IsolationRequest::new(
            p1.clone(),
            IsolationReason::AnomalyDetected,
        ));
        manager.isolate(IsolationRequest::new(
            p2.clone(),
            IsolationReason::AuthFailure,
        ));

        // Anomaly expires at 120s, auth at 60s.
        clock.advance(Duration::from_secs(90));
        assert_eq!(manager.cleanup_expired(), 1);
        assert_eq!(manager.get_isolation_level(&p2), IsolationLevel::None);
        assert_eq!(manager.get_isolation_level(&p1), IsolationLevel::Monitor);

        clock.advance(Duration::from_secs(60));
        assert_eq!(manager.cleanup_expired(), 1);
        assert!(manager.isolated_peers().is_empty());
        assert_eq!(manager.violation_count(&p2, IsolationReason::AuthFailure), 1);
    }

    #[test]
    fn test_effective_level_is_max_across_reasons() {
        let (_clock, manager) = manager();
        let peer = PeerId::new("p1");

        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::AnomalyDetected,
        ));
        assert_eq!(manager.get_isolation_level(&peer), IsolationLevel::Monitor);

        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::ThreatDetected,
        ));
        assert_eq!(
            manager.get_isolation_level(&peer),
            IsolationLevel::Restricted
        );

        // Counters accumulate independently per reason
        assert_eq!(
            manager.violation_count(&peer, IsolationReason::AnomalyDetected),
            1
        );
        assert_eq!(
            manager.violation_count(&peer, IsolationReason::ThreatDetected),
            1
        );
    }

    #[test]
    fn test_is_allowed_by_level() {
        let (_clock, manager) = manager();

        let restricted = PeerId::new("restricted");
        manager.isolate(
            IsolationRequest::new(restricted.clone(), IsolationReason::AdminAction)
                .with_level(IsolationLevel::Restricted),
        );
        assert!(manager.is_allowed(&restricted, "health").allowed);
        assert!(manager.is_allowed(&restricted, "heartbeat").allowed);
        assert!(manager.is_allowed(&restricted, "auth").allowed);
        assert!(!manager.is_allowed(&restricted, "sync").allowed);

        let quarantined = PeerId::new("quarantined");
        manager.isolate(
            IsolationRequest::new(quarantined.clone(), IsolationReason::AdminAction)
                .with_level(IsolationLevel::Quarantine),
        );
        assert!(manager.is_allowed(&quarantined, "health").allowed);
        assert!(!manager.is_allowed(&quarantined, "heartbeat").allowed);

        let blocked = PeerId::new("blocked");
        manager.isolate(
            IsolationRequest::new(blocked.clone(), IsolationReason::AdminAction)
                .with_level(IsolationLevel::Blocked),
        );
        assert!(!manager.is_allowed(&blocked, "health").allowed);

        let monitored = PeerId::new("monitored");
        manager.isolate(
            IsolationRequest::new(monitored.clone(), IsolationReason::AdminAction)
                .with_level(IsolationLevel::Monitor),
        );
        assert!(manager.is_allowed(&monitored, "sync").allowed);
    }

    #[test]
    fn test_breaker_denial_short_circuits() {
        let (_clock, manager) = manager();
        let peer = PeerId::new("p1");

        for _ in 0..5 {
            manager.record_failure(&peer);
        }
        assert_eq!(manager.breaker_state(&peer), Some(CircuitState::Open));

        let decision = manager.is_allowed(&peer, "health");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "Circuit breaker open");
    }

    #[test]
    fn test_release_resets_breaker() {
        let (_clock, manager) = manager();
        let peer = PeerId::new("p1");

        for _ in 0..5 {
            manager.record_failure(&peer);
        }
        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::ThreatDetected,
        ));

        assert!(manager.release(&peer, true));
        assert_eq!(manager.breaker_state(&peer), Some(CircuitState::Closed));
        assert!(manager.is_allowed(&peer, "sync").allowed);
    }

    #[test]
    fn test_is_allowed_does_not_mutate_store() {
        let (clock, manager) = manager();
        let peer = PeerId::new("p1");

        manager.isolate(IsolationRequest::new(
            peer.clone(),
            IsolationReason::AuthFailure,
        ));
        clock.advance(Duration::from_secs(61));

        // Expired auto-recoverable record is ignored but not removed here.
        assert!(manager.is_allowed(&peer, "sync").allowed);
        assert!(manager
            .record(&peer, IsolationReason::AuthFailure)
            .is_some());

        // The reaper removes it.
        assert_eq!(manager.cleanup_expired(), 1);
        assert!(manager.record(&peer, IsolationReason::AuthFailure).is_none());
    }
}
