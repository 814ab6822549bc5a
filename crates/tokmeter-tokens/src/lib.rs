//! # tokmeter-tokens
//!
//! Token estimation for AI-assistant interactions.
//!
//! This crate provides:
//! - [`TokenEstimator`] - Validated, cached token counting
//! - [`heuristic`] - Character-ratio estimate (4 chars/token Latin, 1.5 chars/token CJK)
//! - [`ExactTokenizer`] - Seam for subword tokenizers; `tiktoken` feature bundles `cl100k_base`
//! - [`TokenDistribution`] - Latin/CJK split of a token count
//!
//! ## Example
//!
//! ```no_run
//! use tokmeter_tokens::{EstimatorConfig, TokenEstimator};
//!
//! fn main() -> tokmeter_tokens::Result<()> {
//!     let estimator = TokenEstimator::new(EstimatorConfig::default());
//!     let texts = ["first prompt", "second prompt"];
//!     let counts = estimator.calculate_tokens_for_multiple_texts(&texts, "auto".parse()?)?;
//!     println!("{counts:?}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod estimator;
pub mod heuristic;
pub mod tokenizer;
pub mod types;

// Re-export main types
pub use cache::TokenCache;
pub use config::EstimatorConfig;
pub use error::{Result, TokenError};
pub use estimator::TokenEstimator;
pub use tokenizer::{ExactTokenizer, default_tokenizer};
#[cfg(feature = "tiktoken")]
pub use tokenizer::TiktokenTokenizer;
pub use types::{EstimatorStatistics, TokenDistribution, TokenMethod};
