//! Isolation engine configuration.
//!
//! Defines circuit breaker tuning and the operation allow-lists consulted
//! by admission checks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the isolation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Circuit breaker configuration applied to every peer's breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Operations a `Restricted` peer may still perform.
    pub essential_operations: Vec<String>,

    /// Operations a `Quarantine` peer may still perform.
    pub quarantine_operations: Vec<String>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            essential_operations: vec![
                "health".to_string(),
                "heartbeat".to_string(),
                "auth".to_string(),
            ],
            quarantine_operations: vec!["health".to_string()],
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time to wait after the last failure before probing recovery.
    pub recovery_timeout: Duration,

    /// Consecutive successes in half-open that close the circuit.
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_requests: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_lists() {
        let config = IsolationConfig::default();
        assert!(config.essential_operations.iter().any(|op| op == "auth"));
        assert_eq!(config.quarantine_operations, vec!["health".to_string()]);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = IsolationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: IsolationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.circuit_breaker.failure_threshold,
            config.circuit_breaker.failure_threshold
        );
        assert_eq!(back.essential_operations, config.essential_operations);
    }
}
