//! One-stop metering of assistant interactions.

use chrono::{DateTime, Utc};
use tokmeter_cost::{
    CostAccountant, CostOptions, OptimizationSuggestions, UsageOptimizer, UsageRecord,
};
use tokmeter_tokens::TokenEstimator;
use tracing::debug;

use crate::config::MeterConfig;
use crate::error::Result;

/// A prompt/response exchange to be metered.
#[derive(Debug, Clone)]
pub struct Interaction<'a> {
    pub prompt: &'a str,
    pub response: &'a str,
    /// Pricing model id; empty uses the configured default
    pub model: &'a str,
    pub session_id: &'a str,
    pub activity_type: &'a str,
    pub rounds: u32,
    /// Defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

impl<'a> Interaction<'a> {
    /// A single-round "general" exchange on the default model.
    pub fn new(prompt: &'a str, response: &'a str) -> Self {
        Self {
            prompt,
            response,
            model: "",
            session_id: "",
            activity_type: "general",
            rounds: 1,
            timestamp: None,
        }
    }

    pub fn with_model(mut self, model: &'a str) -> Self {
        self.model = model;
        self
    }

    pub fn with_session(mut self, session_id: &'a str) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_activity(mut self, activity_type: &'a str) -> Self {
        self.activity_type = activity_type;
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Estimator, accountant and optimizer wired to one configuration.
pub struct UsageMeter {
    estimator: TokenEstimator,
    accountant: CostAccountant,
    optimizer: UsageOptimizer,
}

impl UsageMeter {
    /// Build all services, loading the pricing file if one is configured.
    pub fn new(config: MeterConfig) -> Result<Self> {
        let estimator = TokenEstimator::new(config.estimator.clone());
        Self::with_estimator(config, estimator)
    }

    /// Build with a caller-supplied estimator.
    pub fn with_estimator(config: MeterConfig, estimator: TokenEstimator) -> Result<Self> {
        let accountant = CostAccountant::from_config(config.accountant)?;
        let optimizer = UsageOptimizer::from_accountant(&accountant, config.optimizer);
        Ok(Self {
            estimator,
            accountant,
            optimizer,
        })
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    pub fn accountant(&self) -> &CostAccountant {
        &self.accountant
    }

    pub fn optimizer(&self) -> &UsageOptimizer {
        &self.optimizer
    }

    /// Mutable optimizer, for adjusting thresholds.
    pub fn optimizer_mut(&mut self) -> &mut UsageOptimizer {
        &mut self.optimizer
    }

    /// Count tokens, price the exchange and return its usage record.
    ///
    /// The cost is added to the accountant's daily total, and to the
    /// session total when the interaction names a session.
    pub fn record_interaction(&self, interaction: &Interaction<'_>) -> Result<UsageRecord> {
        let method = self.estimator.config().default_method;
        let prompt = self
            .estimator
            .analyze_token_distribution(interaction.prompt, method)?;
        let response = self
            .estimator
            .analyze_token_distribution(interaction.response, method)?;

        let mut options = CostOptions::new()
            .with_session(interaction.session_id)
            .with_activity(interaction.activity_type);
        if let Some(timestamp) = interaction.timestamp {
            options = options.with_timestamp(timestamp);
        }

        let breakdown = self.accountant.calculate_detailed_cost(
            token_count(prompt.total_tokens),
            token_count(response.total_tokens),
            interaction.model,
            &options,
        )?;

        debug!(
            session = interaction.session_id,
            activity = interaction.activity_type,
            input_tokens = prompt.total_tokens,
            output_tokens = response.total_tokens,
            method = %prompt.method,
            "Recorded interaction"
        );

        Ok(UsageRecord::from_breakdown(&breakdown, interaction.session_id)
            .with_rounds(interaction.rounds)
            .with_method(prompt.method.as_str()))
    }

    /// Suggestions for a set of historical records.
    pub fn suggest(&self, records: &[UsageRecord]) -> OptimizationSuggestions {
        self.optimizer.analyze_and_suggest(records)
    }
}

// Estimator counts are bounded by the text length limit, far below i64::MAX.
fn token_count(tokens: usize) -> i64 {
    i64::try_from(tokens).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokmeter_tokens::{EstimatorConfig, TokenMethod};

    fn heuristic_meter() -> UsageMeter {
        let config = MeterConfig::default();
        let estimator = TokenEstimator::heuristic_only(
            EstimatorConfig::new().with_default_method(TokenMethod::Heuristic),
        );
        UsageMeter::with_estimator(config, estimator).unwrap()
    }

    #[test]
    fn test_record_interaction() {
        let meter = heuristic_meter();
        // 4000 ASCII chars -> 1000 tokens; 8000 -> 2000
        let prompt = "a".repeat(4000);
        let response = "b".repeat(8000);
        let interaction = Interaction::new(&prompt, &response)
            .with_model("claude-sonnet-4.0")
            .with_session("s-1")
            .with_activity("coding")
            .with_rounds(2);

        let record = meter.record_interaction(&interaction).unwrap();

        assert_eq!(record.tokens.input, 1000);
        assert_eq!(record.tokens.output, 2000);
        assert_eq!(record.tokens.method.as_deref(), Some("heuristic"));
        assert_eq!(record.activity.rounds, 2);
        assert_eq!(record.activity_type(), "coding");
        assert_eq!(record.model(), "claude-sonnet-4.0");
        assert!((record.cost.total - 0.033).abs() < 1e-9);
        assert!((meter.accountant().get_session_cost("s-1") - 0.033).abs() < 1e-9);
    }

    #[test]
    fn test_default_model_and_no_session() {
        let meter = heuristic_meter();
        let record = meter
            .record_interaction(&Interaction::new("hello", "world"))
            .unwrap();

        assert_eq!(record.model(), "claude-sonnet-4.0");
        assert_eq!(record.session_id, "");
        assert_eq!(record.activity_type(), "general");
        assert_eq!(meter.accountant().statistics().sessions_tracked, 0);
        assert_eq!(meter.accountant().statistics().days_tracked, 1);
    }

    #[test]
    fn test_unknown_model_fails() {
        let meter = heuristic_meter();
        let err = meter
            .record_interaction(&Interaction::new("hi", "there").with_model("unknown"))
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_suggest_empty() {
        let meter = heuristic_meter();
        let result = meter.suggest(&[]);
        assert!(result.suggestions.is_empty());
        assert_eq!(result.optimized_cost, 0.0);
    }
}
