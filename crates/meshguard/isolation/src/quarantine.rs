//! Group-level containment for isolated peers.
//!
//! A zone is a named blast radius: peers inside it may still talk to each
//! other, exempt peers may talk across the boundary, and only a small set
//! of operations remains available to contained peers.

use std::collections::HashSet;
use std::sync::RwLock;

use meshguard_types::PeerId;
use tracing::info;

/// A named containment group.
pub struct QuarantineZone {
    name: String,
    inner: RwLock<ZoneInner>,
}

#[derive(Debug, Default)]
struct ZoneInner {
    members: HashSet<PeerId>,
    exempt: HashSet<PeerId>,
    allowed_operations: HashSet<String>,
}

impl QuarantineZone {
    /// Create a zone. Health and heartbeat traffic stays allowed so
    /// contained peers remain observable.
    pub fn new(name: impl Into<String>) -> Self {
        let mut allowed_operations = HashSet::new();
        allowed_operations.insert("health".to_string());
        allowed_operations.insert("heartbeat".to_string());

        Self {
            name: name.into(),
            inner: RwLock::new(ZoneInner {
                members: HashSet::new(),
                exempt: HashSet::new(),
                allowed_operations,
            }),
        }
    }

    /// Zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a peer to the zone. Returns false if it was already contained.
    pub fn add_peer(&self, peer_id: PeerId) -> bool {
        let mut inner = self.inner.write().unwrap();
        let added = inner.members.insert(peer_id.clone());
        if added {
            info!(zone = %self.name, peer_id = %peer_id, "peer quarantined");
        }
        added
    }

    /// Remove a peer from the zone. Returns false if it was not contained.
    pub fn remove_peer(&self, peer_id: &PeerId) -> bool {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.members.remove(peer_id);
        if removed {
            info!(zone = %self.name, peer_id = %peer_id, "peer left quarantine");
        }
        removed
    }

    /// Whether a peer is contained in this zone.
    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.inner.read().unwrap().members.contains(peer_id)
    }

    /// Exempt a peer from containment rules (e.g. a monitoring node).
    pub fn add_exemption(&self, peer_id: PeerId) {
        self.inner.write().unwrap().exempt.insert(peer_id);
    }

    /// Remove a peer's exemption.
    pub fn remove_exemption(&self, peer_id: &PeerId) -> bool {
        self.inner.write().unwrap().exempt.remove(peer_id)
    }

    /// Allow an operation for contained peers.
    pub fn allow_operation(&self, operation: impl Into<String>) {
        self.inner
            .write()
            .unwrap()
            .allowed_operations
            .insert(operation.into());
    }

    /// Whether contained peers may perform this operation.
    pub fn is_operation_allowed(&self, operation: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .allowed_operations
            .contains(operation)
    }

    /// Whether two peers may communicate under this zone's rules.
    ///
    /// True when neither is contained, when both are (same blast radius),
    /// or when either side is exempt.
    pub fn can_communicate(&self, a: &PeerId, b: &PeerId) -> bool {
        let inner = self.inner.read().unwrap();
        let a_contained = inner.members.contains(a);
        let b_contained = inner.members.contains(b);

        if a_contained == b_contained {
            return true;
        }
        inner.exempt.contains(a) || inner.exempt.contains(b)
    }

    /// Contained peers, in no particular order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.inner.read().unwrap().members.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communication_rules() {
        let zone = QuarantineZone::new("blast-1");
        let a = PeerId::new("a");
        let b = PeerId::new("b");
        let c = PeerId::new("c");
        let d = PeerId::new("d");

        assert!(zone.add_peer(a.clone()));
        assert!(zone.add_peer(b.clone()));
        zone.add_exemption(c.clone());

        // Both contained: same blast radius
        assert!(zone.can_communicate(&a, &b));
        // Exempt peer crosses the boundary
        assert!(zone.can_communicate(&a, &c));
        // Contained to outside, no exemption: denied
        assert!(!zone.can_communicate(&a, &d));
        // Two outsiders are unaffected
        assert!(zone.can_communicate(&c, &d));
    }

    #[test]
    fn test_membership() {
        let zone = QuarantineZone::new("blast-1");
        let a = PeerId::new("a");

        assert!(zone.add_peer(a.clone()));
        assert!(!zone.add_peer(a.clone()));
        assert!(zone.contains(&a));
        assert_eq!(zone.peers(), vec![a.clone()]);

        assert!(zone.remove_peer(&a));
        assert!(!zone.remove_peer(&a));
        assert!(!zone.contains(&a));
    }

    #[test]
    fn test_operation_allow_list() {
        let zone = QuarantineZone::new("blast-1");
        assert!(zone.is_operation_allowed("health"));
        assert!(zone.is_operation_allowed("heartbeat"));
        assert!(!zone.is_operation_allowed("sync"));

        zone.allow_operation("sync");
        assert!(zone.is_operation_allowed("sync"));
    }

    #[test]
    fn test_exemption_removal() {
        let zone = QuarantineZone::new("blast-1");
        let a = PeerId::new("a");
        let c = PeerId::new("c");

        zone.add_peer(a.clone());
        zone.add_exemption(c.clone());
        assert!(zone.can_communicate(&a, &c));

        assert!(zone.remove_exemption(&c));
        assert!(!zone.can_communicate(&a, &c));
    }
}
