//! # MeshGuard Isolation - Zero-Trust Peer Isolation Engine
//!
//! A process-local authority over the trust state of remote mesh peers.
//! Detectors report violations, the engine applies escalation policies,
//! and every subsystem that talks to a peer asks it for admission first.
//!
//! ## Key Components
//!
//! - [`IsolationManager`]: applies policies, escalates records, answers
//!   admission checks, reaps expired records
//! - [`CircuitBreaker`]: per-peer failure gate, independent of isolation
//! - [`PolicyTable`]: reason-keyed escalation ladders with built-in defaults
//! - [`QuarantineZone`]: group-level containment rules
//!
//! ## Example
//!
//! ```rust
//! use meshguard_isolation::{IsolationConfig, IsolationManager, IsolationRequest};
//! use meshguard_types::{IsolationReason, PeerId};
//!
//! let manager = IsolationManager::new(IsolationConfig::default());
//! let peer = PeerId::new("node-7");
//!
//! // A detector reports a violation
//! let record = manager.isolate(IsolationRequest::new(
//!     peer.clone(),
//!     IsolationReason::AuthFailure,
//! ));
//! println!("isolated at {}", record.level);
//!
//! // The dispatch layer checks admission before every request
//! let decision = manager.is_allowed(&peer, "sync");
//! if decision.allowed {
//!     // ... send the request, then report the outcome
//!     manager.record_success(&peer);
//! }
//! ```
//!
//! ## Concurrency
//!
//! All operations are synchronous and bounded. Records and violation
//! counters share one mutex; each circuit breaker carries its own lock so
//! the admission hot path never contends with escalation. Events are
//! dispatched only after locks are released, so subscribers may call back
//! into the manager.

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod manager;
pub mod policy;
pub mod quarantine;
pub mod record;

// Re-export main types
pub use breaker::{CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CircuitBreakerConfig, IsolationConfig};
pub use error::{IsolationError, IsolationResult};
pub use event::IsolationEvent;
pub use manager::{AccessDecision, IsolationCallback, IsolationManager, IsolationRequest};
pub use policy::{IsolationPolicy, PolicyTable};
pub use quarantine::QuarantineZone;
pub use record::IsolationRecord;
