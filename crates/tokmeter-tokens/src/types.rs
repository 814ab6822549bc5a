//! Data types for token estimation.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TokenError;

/// Strategy used to turn text into a token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenMethod {
    /// Character-ratio approximation, always available
    Heuristic,
    /// Subword vocabulary through the injected tokenizer
    Exact,
    /// Exact when a tokenizer is available, heuristic otherwise
    #[default]
    Auto,
}

impl TokenMethod {
    /// Name used in usage records and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Exact => "exact",
            Self::Auto => "auto",
        }
    }
}

impl std::fmt::Display for TokenMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenMethod {
    type Err = TokenError;

    /// Parses a method name. The empty string means [`TokenMethod::Auto`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "exact" => Ok(Self::Exact),
            "auto" | "" => Ok(Self::Auto),
            other => Err(TokenError::InvalidInput(format!(
                "unknown token method '{other}' (expected heuristic, exact or auto)"
            ))),
        }
    }
}

/// Split of a token count between Latin-script and CJK text.
///
/// `total_tokens == english_tokens + chinese_tokens` always holds. With the
/// exact tokenizer the split is apportioned by character ratio rather than
/// counted per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDistribution {
    /// Tokens attributed to ASCII/Latin and other non-CJK characters
    pub english_tokens: usize,

    /// Tokens attributed to CJK ideographs
    pub chinese_tokens: usize,

    /// Total tokens
    pub total_tokens: usize,

    /// Strategy that produced the total (never `Auto`)
    pub method: TokenMethod,
}

impl TokenDistribution {
    /// An all-zero distribution.
    pub fn empty(method: TokenMethod) -> Self {
        Self {
            english_tokens: 0,
            chinese_tokens: 0,
            total_tokens: 0,
            method,
        }
    }

    /// Share of the total attributed to CJK text (0.0 for empty text).
    pub fn chinese_ratio(&self) -> f64 {
        if self.total_tokens == 0 {
            0.0
        } else {
            self.chinese_tokens as f64 / self.total_tokens as f64
        }
    }
}

/// Snapshot of estimator state for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorStatistics {
    /// Entries currently cached
    pub cache_entries: usize,

    /// Configured cache capacity
    pub cache_capacity: usize,

    /// Cache lookups answered from the cache
    pub cache_hits: u64,

    /// Cache lookups that had to compute
    pub cache_misses: u64,

    /// Whether the exact tokenizer is active
    pub exact_available: bool,

    /// Name of the active exact tokenizer, if any
    pub tokenizer_name: Option<String>,
}
