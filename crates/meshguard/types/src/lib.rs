//! # MeshGuard Types - Shared Vocabulary for Peer Isolation
//!
//! Core types consumed by every component that talks about peer trust:
//! detectors that report violations, dispatch layers that check admission,
//! and the isolation engine itself.
//!
//! - [`PeerId`]: strongly-typed peer identifier
//! - [`IsolationLevel`]: ordered restriction severity
//! - [`IsolationReason`]: closed set of violation triggers

pub mod ids;
pub mod isolation;

pub use ids::PeerId;
pub use isolation::{IsolationLevel, IsolationReason};
