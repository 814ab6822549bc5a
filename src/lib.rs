//! # tokmeter
//!
//! Token estimation, cost accounting and usage optimization for
//! AI-assistant interactions.
//!
//! The workspace is split into three service crates, re-exported here:
//! - [`tokens`] - Token Estimator (heuristic and exact counting, cache)
//! - [`cost`] - Cost Accountant, trend analysis, reports and Usage Optimizer
//! - [`logging`] - Tracing setup (re-exported from `tokmeter-core`)
//!
//! [`UsageMeter`] wires the three together from one [`MeterConfig`].
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tokmeter::{Interaction, MeterConfig, UsageMeter};
//!
//! fn main() -> tokmeter::Result<()> {
//!     let config = MeterConfig::from_yaml_file(Path::new("tokmeter.yaml"))?;
//!     let _guard = config.init_logging()?;
//!     let meter = UsageMeter::new(config)?;
//!
//!     let record = meter.record_interaction(
//!         &Interaction::new("Explain this function", "It parses the header...")
//!             .with_model("claude-sonnet-4.0")
//!             .with_session("session-1")
//!             .with_activity("coding"),
//!     )?;
//!
//!     let suggestions = meter.suggest(&[record]);
//!     println!("Potential savings: ${:.4}", suggestions.total_savings);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod meter;

pub use tokmeter_core::logging;
pub use tokmeter_cost as cost;
pub use tokmeter_tokens as tokens;

pub use config::{LoggingConfig, MeterConfig};
pub use error::{MeterError, Result};
pub use tokmeter_core::{CoreError, LogGuard, init_test_logging};
pub use meter::{Interaction, UsageMeter};

pub use tokmeter_cost::{
    CostAccountant, CostBreakdown, Granularity, OptimizationSuggestions, UsageOptimizer,
    UsageRecord,
};
pub use tokmeter_tokens::{TokenEstimator, TokenMethod};
