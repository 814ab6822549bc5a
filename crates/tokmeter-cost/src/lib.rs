//! # tokmeter-cost
//!
//! Cost accounting and usage optimization for LLM API traffic.
//!
//! This crate provides:
//! - [`CostAccountant`] - Prices token counts and tracks session/daily totals
//! - [`PricingCatalog`] - Atomically replaceable model pricing table
//! - Trend analysis and cost reports over historical [`UsageRecord`]s
//! - [`UsageOptimizer`] - Cache, batch, model-switch and workflow suggestions
//!
//! ## Example
//!
//! ```no_run
//! use tokmeter_cost::{CostAccountant, CostOptions, Granularity, OptimizerConfig, UsageOptimizer};
//!
//! fn main() -> tokmeter_cost::Result<()> {
//!     let accountant = CostAccountant::default();
//!
//!     let cost = accountant.calculate_cost(1000, 2000, "claude-sonnet-4.0")?;
//!     println!("${:.4}", cost.total_cost);
//!
//!     let batch = CostOptions::new().with_batch().with_session("nightly");
//!     accountant.calculate_detailed_cost(50_000, 10_000, "claude-opus-4.0", &batch)?;
//!
//!     let optimizer = UsageOptimizer::from_accountant(&accountant, OptimizerConfig::default());
//!     let report = accountant.generate_cost_report(&[], Granularity::Daily, &optimizer);
//!     println!("{} suggestions", report.optimization.suggestions.len());
//!
//!     Ok(())
//! }
//! ```

pub mod accountant;
pub mod error;
pub mod models;
pub mod optimizer;
pub mod pricing;
pub mod report;
pub mod trends;

pub use accountant::{AccountantConfig, CostAccountant, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
pub use error::{CostError, Result};
pub use models::{
    AccountantStatistics, ActivityInfo, BillingMode, CostBreakdown, CostOptions, DailyCostEntry,
    RecordCost, RecordTokens, TokenCounts, UsageRecord,
};
pub use optimizer::{
    ActivityStats, OptimizationSuggestion, OptimizationSuggestions, OptimizerConfig,
    OptimizerPolicy, OptimizerThresholds, SizeBucket, SuggestionType, UsageContext,
    UsageOptimizer, UsagePattern,
};
pub use pricing::{PricingCatalog, PricingModel, PricingTable};
pub use report::{CostReport, CostSummary};
pub use trends::{CostPrediction, CostTrends, Granularity, TrendPoint};
