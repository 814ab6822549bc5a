//! Cost reports over historical usage records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accountant::CostAccountant;
use crate::models::UsageRecord;
use crate::optimizer::{OptimizationSuggestions, UsageOptimizer};
use crate::trends::{CostTrends, Granularity};

/// Cost summary for one grouping key (activity type or model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub key: String,
    pub cost: f64,
    pub tokens: i64,
    pub record_count: usize,
}

impl CostSummary {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            cost: 0.0,
            tokens: 0,
            record_count: 0,
        }
    }

    /// Average cost per record.
    pub fn average_cost(&self) -> f64 {
        if self.record_count == 0 {
            0.0
        } else {
            self.cost / self.record_count as f64
        }
    }
}

/// Full cost report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub generated_at: DateTime<Utc>,
    /// Earliest record timestamp
    pub period_start: Option<DateTime<Utc>>,
    /// Latest record timestamp
    pub period_end: Option<DateTime<Utc>>,
    pub currency: String,
    pub total_cost: f64,
    pub total_tokens: i64,
    pub record_count: usize,
    /// Sorted by cost, highest first
    pub by_activity: Vec<CostSummary>,
    /// Sorted by cost, highest first
    pub by_model: Vec<CostSummary>,
    pub trends: CostTrends,
    pub optimization: OptimizationSuggestions,
}

impl CostAccountant {
    /// Summarize records by activity and model, with trends and suggestions.
    ///
    /// Costs are re-priced at current prices; the optimizer works from the
    /// recorded costs.
    pub fn generate_cost_report(
        &self,
        records: &[UsageRecord],
        granularity: Granularity,
        optimizer: &UsageOptimizer,
    ) -> CostReport {
        let mut by_activity: HashMap<&str, CostSummary> = HashMap::new();
        let mut by_model: HashMap<&str, CostSummary> = HashMap::new();
        let mut total_cost = 0.0;
        let mut total_tokens = 0;
        let mut period_start: Option<DateTime<Utc>> = None;
        let mut period_end: Option<DateTime<Utc>> = None;

        for record in records {
            let cost = self.reprice_record(record);
            let tokens = record.total_tokens();
            total_cost += cost;
            total_tokens += tokens;
            period_start = Some(period_start.map_or(record.timestamp, |t| t.min(record.timestamp)));
            period_end = Some(period_end.map_or(record.timestamp, |t| t.max(record.timestamp)));

            for (groups, key) in [
                (&mut by_activity, record.activity_type()),
                (&mut by_model, record.model()),
            ] {
                let summary = groups.entry(key).or_insert_with(|| CostSummary::new(key));
                summary.cost += cost;
                summary.tokens += tokens;
                summary.record_count += 1;
            }
        }

        let report = CostReport {
            generated_at: Utc::now(),
            period_start,
            period_end,
            currency: self.config().currency.clone(),
            total_cost,
            total_tokens,
            record_count: records.len(),
            by_activity: sorted_by_cost(by_activity),
            by_model: sorted_by_cost(by_model),
            trends: self.analyze_cost_trends(records, granularity),
            optimization: optimizer.analyze_and_suggest(records),
        };

        info!(
            records = report.record_count,
            total_cost = report.total_cost,
            suggestions = report.optimization.suggestions.len(),
            "Generated cost report"
        );

        report
    }
}

fn sorted_by_cost(groups: HashMap<&str, CostSummary>) -> Vec<CostSummary> {
    let mut summaries: Vec<CostSummary> = groups.into_values().collect();
    summaries.sort_by(|a, b| b.cost.total_cmp(&a.cost).then_with(|| a.key.cmp(&b.key)));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::OptimizerConfig;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_report() {
        let accountant = CostAccountant::default();
        let optimizer = UsageOptimizer::from_accountant(&accountant, OptimizerConfig::default());
        let report = accountant.generate_cost_report(&[], Granularity::Daily, &optimizer);

        assert_eq!(report.record_count, 0);
        assert_eq!(report.total_cost, 0.0);
        assert!(report.period_start.is_none());
        assert!(report.by_activity.is_empty());
        assert!(report.trends.points.is_empty());
        assert_eq!(report.optimization.optimized_cost, 0.0);
    }

    #[test]
    fn test_report_groups_and_sorts() {
        let accountant = CostAccountant::default();
        let optimizer = UsageOptimizer::from_accountant(&accountant, OptimizerConfig::default());
        let records = vec![
            UsageRecord::new(at(1), "s", "chat", "claude-haiku-3.5", 1000, 1000, 0.0),
            UsageRecord::new(at(2), "s", "coding", "claude-opus-4.0", 1000, 1000, 0.0),
            UsageRecord::new(at(3), "s", "coding", "claude-sonnet-4.0", 1000, 2000, 0.0),
        ];

        let report = accountant.generate_cost_report(&records, Granularity::Daily, &optimizer);

        // haiku 0.0048, opus 0.09, sonnet 0.033
        assert!((report.total_cost - 0.1278).abs() < 1e-9);
        assert_eq!(report.total_tokens, 7000);
        assert_eq!(report.period_start, Some(at(1)));
        assert_eq!(report.period_end, Some(at(3)));
        assert_eq!(report.currency, "USD");

        let activities: Vec<_> = report.by_activity.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(activities, ["coding", "chat"]);
        assert_eq!(report.by_activity[0].record_count, 2);
        assert!((report.by_activity[0].cost - 0.123).abs() < 1e-9);

        let models: Vec<_> = report.by_model.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(models, ["claude-opus-4.0", "claude-sonnet-4.0", "claude-haiku-3.5"]);

        assert_eq!(report.trends.points.len(), 3);
        assert_eq!(report.trends.predictions.len(), 3);

        // Reports never change the running totals
        assert_eq!(accountant.statistics().days_tracked, 0);
    }

    #[test]
    fn test_average_cost() {
        let mut summary = CostSummary::new("chat");
        assert_eq!(summary.average_cost(), 0.0);
        summary.cost = 1.0;
        summary.record_count = 4;
        assert_eq!(summary.average_cost(), 0.25);
    }
}
