//! Configuration for the token estimator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::TokenMethod;

/// Default number of cached texts.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default maximum text length in characters.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 1_000_000;

/// Default maximum share of control characters.
pub const DEFAULT_MAX_CONTROL_RATIO: f64 = 0.10;

/// Default computation deadline in seconds.
pub const DEFAULT_COMPUTATION_TIMEOUT_SECS: u64 = 30;

/// Token estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Maximum cached texts; 0 disables caching
    pub cache_capacity: usize,

    /// Texts longer than this many characters are rejected
    pub max_text_chars: usize,

    /// Texts whose control-character share exceeds this are rejected
    pub max_control_ratio: f64,

    /// Deadline for a single calculation in seconds
    pub computation_timeout_secs: u64,

    /// Method used when the caller has no preference
    pub default_method: TokenMethod,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            max_control_ratio: DEFAULT_MAX_CONTROL_RATIO,
            computation_timeout_secs: DEFAULT_COMPUTATION_TIMEOUT_SECS,
            default_method: TokenMethod::Auto,
        }
    }
}

impl EstimatorConfig {
    /// Create a new estimator configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the maximum text length.
    pub fn with_max_text_chars(mut self, max: usize) -> Self {
        self.max_text_chars = max;
        self
    }

    /// Set the computation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.computation_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the default method.
    pub fn with_default_method(mut self, method: TokenMethod) -> Self {
        self.default_method = method;
        self
    }

    /// Computation deadline as a [`Duration`].
    pub fn computation_timeout(&self) -> Duration {
        Duration::from_secs(self.computation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_config_default() {
        let config = EstimatorConfig::default();
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.max_text_chars, 1_000_000);
        assert_eq!(config.computation_timeout(), Duration::from_secs(30));
        assert_eq!(config.default_method, TokenMethod::Auto);
    }

    #[test]
    fn test_timeout_has_floor() {
        let config = EstimatorConfig::new().with_timeout(Duration::from_millis(10));
        assert_eq!(config.computation_timeout_secs, 1);
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: EstimatorConfig =
            serde_json::from_str(r#"{"cache_capacity": 16, "default_method": "heuristic"}"#).unwrap();
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.default_method, TokenMethod::Heuristic);
        assert_eq!(config.max_text_chars, DEFAULT_MAX_TEXT_CHARS);
    }
}
