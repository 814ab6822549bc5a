//! Integration tests for tokmeter-cost with mock pricing and history files.

use std::io::Write;
use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use tempfile::NamedTempFile;
use tokmeter_cost::{
    AccountantConfig, CostAccountant, CostOptions, Granularity, OptimizerConfig, SuggestionType,
    UsageOptimizer, UsageRecord,
};

/// Mock pricing file with a single in-house model.
const HOUSE_PRICING: &str = r#"
models:
  house-large:
    input: 2.0
    output: 8.0
    cache_read: 0.2
    cache_write: 2.5
    batch_discount: 0.25
  claude-haiku-3.5:
    input: 0.8
    output: 4.0
"#;

/// Exported usage history in the JSON shape written by reporting tools.
const HISTORY_JSON: &str = r#"[
  {"timestamp":"2025-03-01T09:00:00Z","sessionId":"a","activity":{"type":"coding","rounds":2},"tokens":{"input":2000,"output":1000,"total":3000,"method":"exact"},"cost":{"input":0.006,"output":0.015,"total":0.021,"currency":"USD","pricingModelId":"claude-sonnet-4.0"}},
  {"timestamp":"2025-03-01T10:00:00Z","sessionId":"a","activity":{"type":"coding","rounds":1},"tokens":{"input":2000,"output":1000,"total":3000},"cost":{"total":0.021,"pricingModelId":"claude-sonnet-4.0"}},
  {"timestamp":"2025-03-01T11:00:00Z","sessionId":"b","activity":{"type":"coding","rounds":1},"tokens":{"input":2000,"output":1000,"total":3000},"cost":{"total":0.021,"pricingModelId":"claude-sonnet-4.0"}},
  {"timestamp":"2025-03-02T09:00:00Z","sessionId":"b","activity":{"type":"coding","rounds":3},"tokens":{"input":2000,"output":1000,"total":3000},"cost":{"total":0.021,"pricingModelId":"claude-sonnet-4.0"}},
  {"timestamp":"2025-03-02T10:00:00Z","sessionId":"c","activity":{"type":"coding","rounds":1},"tokens":{"input":2000,"output":1000,"total":3000},"cost":{"total":0.021,"pricingModelId":"claude-sonnet-4.0"}},
  {"timestamp":"2025-03-03T09:00:00Z","sessionId":"c","activity":{"type":"coding","rounds":1},"tokens":{"input":2000,"output":1000,"total":3000},"cost":{"total":0.021,"pricingModelId":"claude-sonnet-4.0"}}
]"#;

fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(suffix).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_concrete_scenarios() {
    let accountant = CostAccountant::default();

    let standard = accountant.calculate_cost(1000, 2000, "claude-sonnet-4.0").unwrap();
    assert!(approx(standard.total_cost, 0.033));

    let cached = accountant
        .calculate_detailed_cost(
            1000,
            2000,
            "claude-sonnet-4.0",
            &CostOptions::new().with_cache(500, 300),
        )
        .unwrap();
    assert!(approx(cached.cache_read_cost, 0.00015));
    assert!(approx(cached.cache_write_cost, 0.001125));

    let batch = accountant
        .calculate_detailed_cost(1000, 2000, "claude-sonnet-4.0", &CostOptions::new().with_batch())
        .unwrap();
    assert!(approx(batch.total_cost, 0.0165));

    for breakdown in [&standard, &cached, &batch] {
        assert!((breakdown.total_cost - breakdown.component_sum()).abs() < 1e-6);
    }
}

#[test]
fn test_calculate_cost_idempotent() {
    let accountant = CostAccountant::default();
    let first = accountant.calculate_cost(12_345, 678, "claude-opus-4.0").unwrap();
    let second = accountant.calculate_cost(12_345, 678, "claude-opus-4.0").unwrap();

    assert_eq!(first.total_cost, second.total_cost);
    assert_eq!(first.input_cost, second.input_cost);
    assert_eq!(first.tokens, second.tokens);
}

#[test]
fn test_pricing_file_from_config() {
    let pricing = write_temp(HOUSE_PRICING, ".yaml");
    let config = AccountantConfig::new()
        .with_default_model("house-large")
        .with_pricing_file(pricing.path());
    let accountant = CostAccountant::from_config(config).unwrap();

    let cost = accountant
        .calculate_detailed_cost(1_000_000, 1_000_000, "", &CostOptions::new().with_batch())
        .unwrap();
    assert_eq!(cost.pricing_model_id, "house-large");
    // 10.0 standard, 25% off
    assert!(approx(cost.total_cost, 7.5));
    assert!(approx(cost.batch_discount, 2.5));

    let err = accountant.calculate_cost(1, 1, "claude-sonnet-4.0").unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn test_invalid_pricing_file_rejected_at_construction() {
    let pricing = write_temp("models:\n  broken:\n    input: abc\n", ".yaml");
    let config = AccountantConfig::new().with_pricing_file(pricing.path());
    let err = CostAccountant::from_config(config).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_history_file_analysis() {
    let history = write_temp(HISTORY_JSON, ".json");
    let content = std::fs::read_to_string(history.path()).unwrap();
    let records: Vec<UsageRecord> = serde_json::from_str(&content).unwrap();
    assert_eq!(records.len(), 6);
    assert_eq!(records[0].tokens.method.as_deref(), Some("exact"));

    let accountant = CostAccountant::default();
    let optimizer = UsageOptimizer::from_accountant(&accountant, OptimizerConfig::default());

    let result = optimizer.analyze_and_suggest(&records);
    assert_eq!(result.suggestions.len(), 1);
    assert_eq!(result.suggestions[0].suggestion_type, SuggestionType::Cache);
    // Records span two days
    assert!(approx(result.suggestions[0].confidence, 1.0));
    assert!(approx(result.current_cost, 0.126));
    assert_eq!(result.optimized_cost, result.current_cost - result.total_savings);

    let report = accountant.generate_cost_report(&records, Granularity::Daily, &optimizer);
    assert_eq!(report.trends.points.len(), 3);
    let counts: Vec<_> = report.trends.points.iter().map(|p| p.record_count).collect();
    assert_eq!(counts, [3, 2, 1]);
    assert!(approx(report.trends.growth_rate, -66.66666666666667));
    assert_eq!(report.optimization, result);
}

#[test]
fn test_daily_totals_from_recorded_calls() {
    let accountant = CostAccountant::default();
    let day = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

    for session in ["s1", "s2", "s1"] {
        accountant
            .calculate_detailed_cost(
                1000,
                2000,
                "claude-sonnet-4.0",
                &CostOptions::new().with_session(session).with_timestamp(day),
            )
            .unwrap();
    }

    assert!(approx(accountant.get_session_cost("s1"), 0.066));
    assert!(approx(accountant.get_session_cost("s2"), 0.033));
    assert!(approx(accountant.get_daily_cost(day.date_naive()), 0.099));

    let summary = accountant.daily_cost_summary_ending(day.date_naive(), 7);
    assert_eq!(summary.len(), 7);
    assert_eq!(summary.last().unwrap().date, day.date_naive());
    assert!(approx(summary.iter().map(|e| e.total_cost).sum::<f64>(), 0.099));
}

#[test]
fn test_concurrent_calculations_and_reload() {
    let pricing = write_temp(HOUSE_PRICING, ".yaml");
    let accountant = Arc::new(CostAccountant::default());

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let accountant = Arc::clone(&accountant);
            thread::spawn(move || {
                for _ in 0..100 {
                    // Either table prices haiku identically
                    let cost = accountant
                        .calculate_detailed_cost(
                            1000,
                            1000,
                            "claude-haiku-3.5",
                            &CostOptions::new().with_session(format!("worker-{}", i % 2)),
                        )
                        .unwrap();
                    assert!(approx(cost.total_cost, 0.0048));
                }
            })
        })
        .collect();

    for _ in 0..10 {
        accountant.load_pricing_file(pricing.path()).unwrap();
        accountant.replace_table(tokmeter_cost::PricingTable::builtin());
    }

    for worker in workers {
        worker.join().unwrap();
    }

    let total = accountant.get_session_cost("worker-0") + accountant.get_session_cost("worker-1");
    assert!((total - 800.0 * 0.0048).abs() < 1e-6);
    assert_eq!(accountant.statistics().sessions_tracked, 2);
}
