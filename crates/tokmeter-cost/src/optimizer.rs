//! Usage optimization suggestions.
//!
//! The optimizer scans historical [`UsageRecord`]s once to build a
//! [`UsageContext`], then runs four independent generators over it:
//!
//! - **Cache**: activities with large repeated prompts that would benefit
//!   from prompt caching
//! - **Batch**: frequent request shapes that could be submitted as batches
//! - **Model switch**: conversational activities served by a premium model
//! - **Workflow**: activities with expensive requests and low token yield
//!
//! Suggestions below the configured saving or confidence thresholds are
//! dropped and the rest are ranked by potential saving.
//!
//! ## Usage
//!
//! ```no_run
//! use tokmeter_cost::{CostAccountant, OptimizerConfig, UsageOptimizer, UsageRecord};
//!
//! let accountant = CostAccountant::default();
//! let optimizer = UsageOptimizer::from_accountant(&accountant, OptimizerConfig::default());
//!
//! let records: Vec<UsageRecord> = Vec::new();
//! let result = optimizer.analyze_and_suggest(&records);
//! println!("Potential savings: ${:.2}", result.total_savings);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accountant::CostAccountant;
use crate::models::UsageRecord;
use crate::pricing::{PricingCatalog, PricingModel, PricingTable};

const CACHE_BASE_CONFIDENCE: f64 = 0.5;
const BATCH_BASE_CONFIDENCE: f64 = 0.6;
const MODEL_SWITCH_SMALL_REQUEST_TOKENS: f64 = 500.0;

/// Kind of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionType {
    /// Enable prompt caching
    Cache,
    /// Submit requests as batches
    Batch,
    /// Route to a cheaper model
    ModelSwitch,
    /// Restructure an expensive workflow
    Workflow,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Cache => "cache",
            SuggestionType::Batch => "batch",
            SuggestionType::ModelSwitch => "model-switch",
            SuggestionType::Workflow => "workflow",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single optimization suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    /// Activity the suggestion targets
    pub activity_type: String,
    pub description: String,
    /// Estimated saving in currency units
    pub potential_saving: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// Ranked suggestions with totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationSuggestions {
    pub suggestions: Vec<OptimizationSuggestion>,
    /// Sum of `potential_saving` over `suggestions`
    pub total_savings: f64,
    pub current_cost: f64,
    /// `current_cost - total_savings`
    pub optimized_cost: f64,
}

/// Thresholds applied when generating and filtering suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerThresholds {
    /// Activity token volume above which caching is considered
    pub cache_threshold: i64,
    /// Pattern frequency at which batching is considered
    pub batch_threshold: usize,
    /// Suggestions below this confidence are dropped
    pub confidence_min: f64,
    /// Suggestions saving less than this are dropped
    pub min_saving: f64,
}

impl Default for OptimizerThresholds {
    fn default() -> Self {
        Self {
            cache_threshold: 1000,
            batch_threshold: 5,
            confidence_min: 0.7,
            min_saving: 0.01,
        }
    }
}

/// Fixed estimates used by the generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerPolicy {
    /// Share of an average prompt assumed reusable through the cache
    pub cacheable_fraction: f64,
    /// Share of a pattern's cost saved by batching
    pub batch_saving_fraction: f64,
    /// Share of an activity's cost saved by a workflow change
    pub workflow_saving_fraction: f64,
    pub workflow_confidence: f64,
    /// Average cost per request above which a workflow is reviewed
    pub workflow_min_average_cost: f64,
    /// Tokens per currency unit below which a workflow is reviewed
    pub workflow_max_efficiency: f64,
    /// Cheaper model proposed by model-switch suggestions
    pub reference_model: String,
    /// Activities eligible for a model switch
    pub model_switch_activities: Vec<String>,
    /// Base confidence per activity for a model switch
    pub model_switch_confidence: BTreeMap<String, f64>,
    pub default_model_switch_confidence: f64,
}

impl Default for OptimizerPolicy {
    fn default() -> Self {
        let model_switch_confidence = [
            ("chat", 0.8),
            ("documentation", 0.7),
            ("debugging", 0.3),
            ("coding", 0.2),
        ]
        .into_iter()
        .map(|(activity, confidence)| (activity.to_string(), confidence))
        .collect();

        Self {
            cacheable_fraction: 0.3,
            batch_saving_fraction: 0.5,
            workflow_saving_fraction: 0.2,
            workflow_confidence: 0.6,
            workflow_min_average_cost: 0.10,
            workflow_max_efficiency: 10_000.0,
            reference_model: "claude-haiku-3.5".to_string(),
            model_switch_activities: vec!["chat".to_string(), "documentation".to_string()],
            model_switch_confidence,
            default_model_switch_confidence: 0.5,
        }
    }
}

impl OptimizerPolicy {
    fn model_switch_confidence(&self, activity: &str) -> f64 {
        self.model_switch_confidence
            .get(activity)
            .copied()
            .unwrap_or(self.default_model_switch_confidence)
    }
}

/// Configuration for the usage optimizer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub thresholds: OptimizerThresholds,
    pub policy: OptimizerPolicy,
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: OptimizerThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_policy(mut self, policy: OptimizerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the minimum saving a suggestion must reach.
    pub fn with_min_saving(mut self, min_saving: f64) -> Self {
        self.thresholds.min_saving = min_saving.max(0.0);
        self
    }

    /// Set the minimum confidence a suggestion must reach.
    pub fn with_confidence_min(mut self, confidence: f64) -> Self {
        self.thresholds.confidence_min = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the model proposed by model-switch suggestions.
    pub fn with_reference_model(mut self, model: impl Into<String>) -> Self {
        self.policy.reference_model = model.into();
        self
    }
}

/// Request size class by total tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    /// Under 100 tokens
    Small,
    /// Under 1,000 tokens
    Medium,
    /// Under 5,000 tokens
    Large,
    XLarge,
}

impl SizeBucket {
    pub fn for_tokens(tokens: i64) -> Self {
        match tokens {
            t if t < 100 => SizeBucket::Small,
            t if t < 1000 => SizeBucket::Medium,
            t if t < 5000 => SizeBucket::Large,
            _ => SizeBucket::XLarge,
        }
    }
}

/// Aggregates for one activity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub count: usize,
    pub tokens_used: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
    pub average_cost_per_record: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Record count per pricing model
    pub models: BTreeMap<String, usize>,
}

impl ActivityStats {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            tokens_used: 0,
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            average_cost_per_record: 0.0,
            first_seen: timestamp,
            last_seen: timestamp,
            models: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &UsageRecord) {
        self.count += 1;
        self.tokens_used += record.total_tokens();
        self.input_tokens += record.tokens.input;
        self.output_tokens += record.tokens.output;
        self.cost += record.cost.total;
        self.average_cost_per_record = self.cost / self.count as f64;
        self.first_seen = self.first_seen.min(record.timestamp);
        self.last_seen = self.last_seen.max(record.timestamp);
        *self.models.entry(record.model().to_string()).or_insert(0) += 1;
    }

    /// Average total tokens per record.
    pub fn average_tokens(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.tokens_used as f64 / self.count as f64
        }
    }

    /// Model used by most records; ties go to the first id in order.
    pub fn dominant_model(&self) -> Option<&str> {
        let mut best: Option<(&String, usize)> = None;
        for (model, &count) in &self.models {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((model, count));
            }
        }
        best.map(|(model, _)| model.as_str())
    }

    /// Time between the first and last record.
    pub fn span(&self) -> Duration {
        self.last_seen - self.first_seen
    }
}

/// Requests sharing an activity and size class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePattern {
    pub activity_type: String,
    pub size: SizeBucket,
    pub frequency: usize,
    pub total_tokens: i64,
    pub total_cost: f64,
}

/// Everything the generators need, gathered in one pass over the records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageContext {
    pub total_cost: f64,
    pub total_tokens: i64,
    pub session_count: usize,
    pub record_count: usize,
    pub activities: BTreeMap<String, ActivityStats>,
    /// Ordered by activity, then size
    pub patterns: Vec<UsagePattern>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct GeneratorOutput {
    suggestions: Vec<OptimizationSuggestion>,
    savings: f64,
}

impl GeneratorOutput {
    fn push(&mut self, mut suggestion: OptimizationSuggestion) {
        suggestion.confidence = round_confidence(suggestion.confidence);
        self.savings += suggestion.potential_saving;
        self.suggestions.push(suggestion);
    }
}

/// Confidence capped at 1 and rounded to two decimals, so summed
/// adjustments compare exactly against `confidence_min`.
fn round_confidence(confidence: f64) -> f64 {
    ((confidence * 100.0).round() / 100.0).min(1.0)
}

/// Produces cost-saving suggestions from usage history.
#[derive(Debug, Clone)]
pub struct UsageOptimizer {
    catalog: PricingCatalog,
    default_model: String,
    config: OptimizerConfig,
}

impl UsageOptimizer {
    /// Create an optimizer pricing against `catalog`.
    ///
    /// `default_model` prices activities whose records name an unknown model.
    pub fn new(
        catalog: PricingCatalog,
        default_model: impl Into<String>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            catalog,
            default_model: default_model.into(),
            config,
        }
    }

    /// Create an optimizer sharing an accountant's pricing and default model.
    pub fn from_accountant(accountant: &CostAccountant, config: OptimizerConfig) -> Self {
        Self::new(
            accountant.catalog().clone(),
            accountant.config().default_model.clone(),
            config,
        )
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &OptimizerThresholds {
        &self.config.thresholds
    }

    /// Replace the thresholds for subsequent analyses.
    pub fn set_thresholds(&mut self, thresholds: OptimizerThresholds) {
        debug!(?thresholds, "Optimizer thresholds updated");
        self.config.thresholds = thresholds;
    }

    /// Aggregate records by activity and by (activity, size) pattern.
    pub fn build_context(&self, records: &[UsageRecord]) -> UsageContext {
        let mut context = UsageContext::default();
        let mut sessions: HashSet<&str> = HashSet::new();
        let mut patterns: BTreeMap<(String, SizeBucket), UsagePattern> = BTreeMap::new();

        for record in records {
            let tokens = record.total_tokens();
            let activity = record.activity_type();

            context.record_count += 1;
            context.total_cost += record.cost.total;
            context.total_tokens += tokens;
            sessions.insert(record.session_id.as_str());

            context.first_seen = Some(
                context
                    .first_seen
                    .map_or(record.timestamp, |t| t.min(record.timestamp)),
            );
            context.last_seen = Some(
                context
                    .last_seen
                    .map_or(record.timestamp, |t| t.max(record.timestamp)),
            );

            context
                .activities
                .entry(activity.to_string())
                .or_insert_with(|| ActivityStats::new(record.timestamp))
                .add(record);

            let size = SizeBucket::for_tokens(tokens);
            let pattern = patterns
                .entry((activity.to_string(), size))
                .or_insert_with(|| UsagePattern {
                    activity_type: activity.to_string(),
                    size,
                    frequency: 0,
                    total_tokens: 0,
                    total_cost: 0.0,
                });
            pattern.frequency += 1;
            pattern.total_tokens += tokens;
            pattern.total_cost += record.cost.total;
        }

        context.session_count = sessions.len();
        context.patterns = patterns.into_values().collect();
        context
    }

    /// Analyze records and return ranked suggestions.
    pub fn analyze_and_suggest(&self, records: &[UsageRecord]) -> OptimizationSuggestions {
        if records.is_empty() {
            return OptimizationSuggestions::default();
        }

        let context = self.build_context(records);
        let table = self.catalog.snapshot();

        let outputs = [
            self.cache_opportunities(&context, &table),
            self.batch_opportunities(&context),
            self.model_switch_opportunities(&context, &table),
            self.workflow_opportunities(&context),
        ];

        let unfiltered_savings: f64 = outputs.iter().map(|o| o.savings).sum();
        let candidates: Vec<OptimizationSuggestion> =
            outputs.into_iter().flat_map(|o| o.suggestions).collect();
        let candidate_count = candidates.len();
        let suggestions = self.filter_and_rank(candidates);

        let total_savings: f64 = suggestions.iter().map(|s| s.potential_saving).sum();
        debug!(
            records = context.record_count,
            candidates = candidate_count,
            kept = suggestions.len(),
            unfiltered_savings,
            total_savings,
            "Optimization analysis complete"
        );

        OptimizationSuggestions {
            suggestions,
            total_savings,
            current_cost: context.total_cost,
            optimized_cost: context.total_cost - total_savings,
        }
    }

    fn filter_and_rank(
        &self,
        mut suggestions: Vec<OptimizationSuggestion>,
    ) -> Vec<OptimizationSuggestion> {
        let thresholds = &self.config.thresholds;
        suggestions.retain(|s| {
            s.potential_saving >= thresholds.min_saving && s.confidence >= thresholds.confidence_min
        });
        suggestions.sort_by(|a, b| b.potential_saving.total_cmp(&a.potential_saving));
        suggestions
    }

    /// Pricing for an activity's dominant model, else the default model.
    fn pricing_for<'t>(&self, stats: &ActivityStats, table: &'t PricingTable) -> Option<&'t PricingModel> {
        stats
            .dominant_model()
            .and_then(|model| table.get(model))
            .or_else(|| table.get(&self.default_model))
    }

    fn cache_opportunities(&self, context: &UsageContext, table: &PricingTable) -> GeneratorOutput {
        let policy = &self.config.policy;
        let mut output = GeneratorOutput::default();

        for (activity, stats) in &context.activities {
            if stats.tokens_used <= self.config.thresholds.cache_threshold || stats.count <= 2 {
                continue;
            }
            let Some(model) = self.pricing_for(stats, table) else {
                debug!(activity = %activity, "No pricing for activity, skipping cache analysis");
                continue;
            };

            let average = stats.average_tokens();
            let cacheable = (average * policy.cacheable_fraction) as i64;
            let half = cacheable / 2;
            let quarter = cacheable / 4;
            let per_record = model.standard_cost(half, half)
                - model.cache_aware_cost(quarter, quarter, quarter, quarter);
            let saving = per_record * stats.count as f64;
            if saving <= 0.0 {
                continue;
            }

            let mut confidence = CACHE_BASE_CONFIDENCE;
            if stats.count > 5 {
                confidence += 0.2;
            }
            if average > 1000.0 {
                confidence += 0.2;
            }
            if stats.span() > Duration::hours(24) {
                confidence += 0.1;
            }

            output.push(OptimizationSuggestion {
                suggestion_type: SuggestionType::Cache,
                activity_type: activity.clone(),
                description: format!(
                    "Enable prompt caching for '{}': about {:.0} of its {:.0} average tokens per request look reusable across {} requests",
                    activity, cacheable, average, stats.count
                ),
                potential_saving: saving,
                confidence,
            });
        }

        output
    }

    fn batch_opportunities(&self, context: &UsageContext) -> GeneratorOutput {
        let mut output = GeneratorOutput::default();

        for pattern in &context.patterns {
            if pattern.frequency < self.config.thresholds.batch_threshold {
                continue;
            }
            let saving = pattern.total_cost * self.config.policy.batch_saving_fraction;
            if saving <= 0.0 {
                continue;
            }

            let average = pattern.total_tokens as f64 / pattern.frequency as f64;
            let mut confidence = BATCH_BASE_CONFIDENCE;
            if pattern.frequency > 10 {
                confidence += 0.2;
            }
            if (500.0..=2000.0).contains(&average) {
                confidence += 0.1;
            }

            output.push(OptimizationSuggestion {
                suggestion_type: SuggestionType::Batch,
                activity_type: pattern.activity_type.clone(),
                description: format!(
                    "Batch {} {:?}-sized '{}' requests ({:.0} tokens on average) instead of sending them one at a time",
                    pattern.frequency,
                    pattern.size,
                    pattern.activity_type,
                    average
                ),
                potential_saving: saving,
                confidence,
            });
        }

        output
    }

    fn model_switch_opportunities(
        &self,
        context: &UsageContext,
        table: &PricingTable,
    ) -> GeneratorOutput {
        let policy = &self.config.policy;
        let mut output = GeneratorOutput::default();
        let Some(reference) = table.get(&policy.reference_model) else {
            debug!(model = %policy.reference_model, "Reference model not priced, skipping model-switch analysis");
            return output;
        };

        for (activity, stats) in &context.activities {
            if !policy.model_switch_activities.iter().any(|a| a == activity) {
                continue;
            }
            let Some(current) = self.pricing_for(stats, table) else {
                continue;
            };
            if current.id == reference.id {
                continue;
            }

            let count = stats.count as i64;
            let avg_input = stats.input_tokens / count;
            let avg_output = stats.output_tokens / count;
            let saving = (current.standard_cost(avg_input, avg_output)
                - reference.standard_cost(avg_input, avg_output))
                * stats.count as f64;
            if saving <= 0.0 {
                continue;
            }

            let mut confidence = policy.model_switch_confidence(activity);
            if stats.average_tokens() < MODEL_SWITCH_SMALL_REQUEST_TOKENS {
                confidence += 0.1;
            }

            output.push(OptimizationSuggestion {
                suggestion_type: SuggestionType::ModelSwitch,
                activity_type: activity.clone(),
                description: format!(
                    "Route '{}' requests from {} to {}",
                    activity, current.id, reference.id
                ),
                potential_saving: saving,
                confidence,
            });
        }

        output
    }

    fn workflow_opportunities(&self, context: &UsageContext) -> GeneratorOutput {
        let policy = &self.config.policy;
        let mut output = GeneratorOutput::default();

        for (activity, stats) in &context.activities {
            if stats.cost <= 0.0 || stats.average_cost_per_record <= policy.workflow_min_average_cost {
                continue;
            }
            let efficiency = stats.tokens_used as f64 / stats.cost;
            if efficiency >= policy.workflow_max_efficiency {
                continue;
            }

            output.push(OptimizationSuggestion {
                suggestion_type: SuggestionType::Workflow,
                activity_type: activity.clone(),
                description: format!(
                    "Review the '{}' workflow: requests average ${:.2} for {:.0} tokens per dollar",
                    activity, stats.average_cost_per_record, efficiency
                ),
                potential_saving: stats.cost * policy.workflow_saving_fraction,
                confidence: policy.workflow_confidence,
            });
        }

        output
    }
}
