//! Data models for cost accounting.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How a request was billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BillingMode {
    /// Plain input/output pricing.
    #[default]
    Standard,
    /// Part of the prompt was read from or written to the provider's prompt cache.
    CacheAware {
        cache_read_tokens: i64,
        cache_write_tokens: i64,
    },
    /// Asynchronous batch submission, discounted by the model's batch rate.
    Batch,
}

impl BillingMode {
    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Standard => "standard",
            BillingMode::CacheAware { .. } => "cache_aware",
            BillingMode::Batch => "batch",
        }
    }

    /// Cache token counts, zero unless cache-aware.
    pub fn cache_tokens(&self) -> (i64, i64) {
        match self {
            BillingMode::CacheAware {
                cache_read_tokens,
                cache_write_tokens,
            } => (*cache_read_tokens, *cache_write_tokens),
            _ => (0, 0),
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a detailed cost calculation.
#[derive(Debug, Clone, Default)]
pub struct CostOptions {
    pub billing_mode: BillingMode,
    /// Session to attribute the cost to
    pub session_id: Option<String>,
    pub activity_type: Option<String>,
    /// Defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

impl CostOptions {
    /// Standard billing, no attribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bill part of the prompt through the prompt cache.
    pub fn with_cache(mut self, cache_read_tokens: i64, cache_write_tokens: i64) -> Self {
        self.billing_mode = BillingMode::CacheAware {
            cache_read_tokens,
            cache_write_tokens,
        };
        self
    }

    /// Bill as a batch submission.
    pub fn with_batch(mut self) -> Self {
        self.billing_mode = BillingMode::Batch;
        self
    }

    /// Attribute the cost to a session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Tag the cost with an activity.
    pub fn with_activity(mut self, activity_type: impl Into<String>) -> Self {
        self.activity_type = Some(activity_type.into());
        self
    }

    /// Override the calculation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Token counts that went into a cost calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: i64,
    pub output: i64,
    pub cache_read: i64,
    pub cache_write: i64,
    /// Sum of all four counts
    pub total: i64,
}

impl TokenCounts {
    pub fn new(input: i64, output: i64, cache_read: i64, cache_write: i64) -> Self {
        Self {
            input,
            output,
            cache_read,
            cache_write,
            total: input + output + cache_read + cache_write,
        }
    }
}

/// Result of pricing one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub cache_read_cost: f64,
    pub cache_write_cost: f64,
    /// Amount removed from the standard total by batch billing
    pub batch_discount: f64,
    pub total_cost: f64,
    pub currency: String,
    pub pricing_model_id: String,
    pub tokens: TokenCounts,
    pub billing_mode: BillingMode,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
}

impl CostBreakdown {
    /// Sum of the component costs, which equals `total_cost` up to rounding.
    pub fn component_sum(&self) -> f64 {
        self.input_cost + self.output_cost + self.cache_read_cost + self.cache_write_cost
    }
}

/// Activity metadata on a usage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Conversation rounds in the interaction
    #[serde(default)]
    pub rounds: u32,
}

/// Token counts on a usage record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTokens {
    pub input: i64,
    pub output: i64,
    #[serde(default)]
    pub total: i64,
    /// Estimation method that produced the counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Cost figures on a usage record, as billed when the record was written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCost {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
    pub total: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub pricing_model_id: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// One historical API interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub activity: ActivityInfo,
    pub tokens: RecordTokens,
    pub cost: RecordCost,
}

impl UsageRecord {
    /// Create a record with input/output tokens and a recorded total cost.
    pub fn new(
        timestamp: DateTime<Utc>,
        session_id: impl Into<String>,
        activity_type: impl Into<String>,
        model: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
        total_cost: f64,
    ) -> Self {
        Self {
            timestamp,
            session_id: session_id.into(),
            activity: ActivityInfo {
                activity_type: activity_type.into(),
                rounds: 1,
            },
            tokens: RecordTokens {
                input: input_tokens,
                output: output_tokens,
                total: input_tokens + output_tokens,
                method: None,
            },
            cost: RecordCost {
                total: total_cost,
                currency: default_currency(),
                pricing_model_id: model.into(),
                ..Default::default()
            },
        }
    }

    /// Build a record from a priced request.
    pub fn from_breakdown(breakdown: &CostBreakdown, session_id: impl Into<String>) -> Self {
        Self {
            timestamp: breakdown.timestamp,
            session_id: session_id.into(),
            activity: ActivityInfo {
                activity_type: breakdown
                    .activity_type
                    .clone()
                    .unwrap_or_else(|| "general".to_string()),
                rounds: 1,
            },
            tokens: RecordTokens {
                input: breakdown.tokens.input,
                output: breakdown.tokens.output,
                total: breakdown.tokens.total,
                method: None,
            },
            cost: RecordCost {
                input: breakdown.input_cost,
                output: breakdown.output_cost,
                total: breakdown.total_cost,
                currency: breakdown.currency.clone(),
                pricing_model_id: breakdown.pricing_model_id.clone(),
            },
        }
    }

    /// Set the number of conversation rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.activity.rounds = rounds;
        self
    }

    /// Record how the token counts were estimated.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.tokens.method = Some(method.into());
        self
    }

    /// Activity type of the record.
    pub fn activity_type(&self) -> &str {
        &self.activity.activity_type
    }

    /// Pricing model the record was billed under.
    pub fn model(&self) -> &str {
        &self.cost.pricing_model_id
    }

    /// Total tokens; falls back to input + output when no total was stored.
    pub fn total_tokens(&self) -> i64 {
        if self.tokens.total > 0 {
            self.tokens.total
        } else {
            self.tokens.input + self.tokens.output
        }
    }
}

/// Cost accumulated on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCostEntry {
    pub date: NaiveDate,
    pub total_cost: f64,
}

/// Snapshot of an accountant's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountantStatistics {
    pub models_loaded: usize,
    pub sessions_tracked: usize,
    pub days_tracked: usize,
    /// Sum of all daily totals
    pub total_tracked_cost: f64,
    pub default_model: String,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_counts_total() {
        let counts = TokenCounts::new(100, 50, 20, 10);
        assert_eq!(counts.total, 180);
    }

    #[test]
    fn test_cost_options_builders() {
        let options = CostOptions::new()
            .with_cache(500, 300)
            .with_session("s-1")
            .with_activity("coding");

        assert_eq!(options.billing_mode.cache_tokens(), (500, 300));
        assert_eq!(options.session_id.as_deref(), Some("s-1"));
        assert_eq!(options.activity_type.as_deref(), Some("coding"));

        // The last billing mode wins
        let options = options.with_batch();
        assert_eq!(options.billing_mode, BillingMode::Batch);
        assert_eq!(options.billing_mode.cache_tokens(), (0, 0));
    }

    #[test]
    fn test_usage_record_json_shape() {
        let record = UsageRecord::new(
            Utc::now(),
            "session-1",
            "coding",
            "claude-sonnet-4.0",
            1000,
            2000,
            0.033,
        )
        .with_rounds(3);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sessionId"], "session-1");
        assert_eq!(json["activity"]["type"], "coding");
        assert_eq!(json["activity"]["rounds"], 3);
        assert_eq!(json["tokens"]["total"], 3000);
        assert!(json["tokens"].get("method").is_none());
        assert_eq!(json["cost"]["total"], 0.033);
        assert_eq!(json["cost"]["pricingModelId"], "claude-sonnet-4.0");
    }

    #[test]
    fn test_usage_record_parses_minimal_json() {
        let json = r#"{
            "timestamp": "2025-03-01T10:00:00Z",
            "sessionId": "abc",
            "activity": {"type": "chat"},
            "tokens": {"input": 120, "output": 80, "method": "heuristic"},
            "cost": {"total": 0.0016, "pricingModelId": "claude-sonnet-4.0"}
        }"#;

        let record: UsageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.activity_type(), "chat");
        assert_eq!(record.total_tokens(), 200);
        assert_eq!(record.cost.currency, "USD");
        assert_eq!(record.model(), "claude-sonnet-4.0");
        assert_eq!(record.tokens.method.as_deref(), Some("heuristic"));
        assert_eq!(record.activity.rounds, 0);
    }

    #[test]
    fn test_billing_mode_serialization() {
        let mode = BillingMode::CacheAware {
            cache_read_tokens: 1,
            cache_write_tokens: 2,
        };
        let json = serde_json::to_value(mode).unwrap();
        assert_eq!(json["mode"], "cache_aware");
        assert_eq!(json["cache_read_tokens"], 1);
        assert_eq!(BillingMode::Batch.to_string(), "batch");
    }
}
