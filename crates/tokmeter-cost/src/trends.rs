//! Cost trend analysis over historical usage records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::accountant::CostAccountant;
use crate::error::CostError;
use crate::models::UsageRecord;

/// Number of future periods predicted.
const PREDICTION_STEPS: u32 = 3;

/// Confidence lost per predicted period.
const CONFIDENCE_DECAY: f64 = 0.2;

/// Bucket size for trend analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    #[default]
    Daily,
    /// Weeks start on Monday (ISO 8601)
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hourly => truncate_seconds(ts, 3600),
            Granularity::Daily => truncate_seconds(ts, 86_400),
            Granularity::Weekly => {
                let day = truncate_seconds(ts, 86_400);
                day - Duration::days(i64::from(ts.weekday().num_days_from_monday()))
            }
            Granularity::Monthly => NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|| truncate_seconds(ts, 86_400)),
        }
    }

    /// Start of the bucket `steps` periods after `start`.
    pub fn advance(&self, start: DateTime<Utc>, steps: u32) -> DateTime<Utc> {
        match self {
            Granularity::Hourly => start + Duration::hours(i64::from(steps)),
            Granularity::Daily => start + Duration::days(i64::from(steps)),
            Granularity::Weekly => start + Duration::weeks(i64::from(steps)),
            Granularity::Monthly => start
                .checked_add_months(Months::new(steps))
                .unwrap_or(start),
        }
    }
}

fn truncate_seconds(ts: DateTime<Utc>, period: i64) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(period), 0).unwrap_or(ts)
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(Granularity::Hourly),
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            other => Err(CostError::InvalidInput(format!(
                "unknown granularity '{}'",
                other
            ))),
        }
    }
}

/// Cost within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Bucket start
    pub timestamp: DateTime<Utc>,
    pub cost: f64,
    pub token_count: i64,
    pub record_count: usize,
}

/// Projected cost for a future bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPrediction {
    pub timestamp: DateTime<Utc>,
    pub predicted_cost: f64,
    pub confidence: f64,
}

/// Result of trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTrends {
    pub granularity: Granularity,
    /// Buckets in time order
    pub points: Vec<TrendPoint>,
    pub average_cost: f64,
    /// Percent change from the first to the last bucket
    pub growth_rate: f64,
    pub predictions: Vec<CostPrediction>,
}

impl CostTrends {
    fn empty(granularity: Granularity) -> Self {
        Self {
            granularity,
            points: Vec::new(),
            average_cost: 0.0,
            growth_rate: 0.0,
            predictions: Vec::new(),
        }
    }
}

impl CostAccountant {
    /// Bucket records by time and project the next periods.
    ///
    /// Each record is re-priced at current prices; records whose model is
    /// no longer priced contribute their recorded total.
    pub fn analyze_cost_trends(
        &self,
        records: &[UsageRecord],
        granularity: Granularity,
    ) -> CostTrends {
        if records.is_empty() {
            return CostTrends::empty(granularity);
        }

        let mut buckets: BTreeMap<DateTime<Utc>, TrendPoint> = BTreeMap::new();
        for record in records {
            let start = granularity.bucket_start(record.timestamp);
            let point = buckets.entry(start).or_insert_with(|| TrendPoint {
                timestamp: start,
                cost: 0.0,
                token_count: 0,
                record_count: 0,
            });
            point.cost += self.reprice_record(record);
            point.token_count += record.total_tokens();
            point.record_count += 1;
        }

        let points: Vec<TrendPoint> = buckets.into_values().collect();
        let average_cost = points.iter().map(|p| p.cost).sum::<f64>() / points.len() as f64;
        let growth_rate = growth_rate(&points);
        let predictions = predict(&points, granularity);

        CostTrends {
            granularity,
            points,
            average_cost,
            growth_rate,
            predictions,
        }
    }
}

fn growth_rate(points: &[TrendPoint]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 && first.cost > 0.0 => {
            (last.cost - first.cost) / first.cost * 100.0
        }
        _ => 0.0,
    }
}

fn predict(points: &[TrendPoint], granularity: Granularity) -> Vec<CostPrediction> {
    let Some(last) = points.last() else {
        return Vec::new();
    };
    if points.len() < 3 {
        return Vec::new();
    }

    let rates: Vec<f64> = points
        .windows(2)
        .filter(|w| w[0].cost > 0.0)
        .map(|w| (w[1].cost - w[0].cost) / w[0].cost)
        .collect();
    let mean_rate = if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    };

    (1..=PREDICTION_STEPS)
        .map(|k| {
            let k_f = f64::from(k);
            CostPrediction {
                timestamp: granularity.advance(last.timestamp, k),
                predicted_cost: (last.cost * (1.0 + mean_rate * k_f)).max(0.0),
                confidence: 1.0 - CONFIDENCE_DECAY * k_f,
            }
        })
        .collect()
}
