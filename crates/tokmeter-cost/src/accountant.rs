//! Cost accountant.
//!
//! Prices token counts against the active [`PricingCatalog`] and keeps
//! running per-session and per-day totals for every recorded calculation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokmeter_core::log_cost_event;
use tracing::debug;

use crate::error::{CostError, Result};
use crate::models::{
    AccountantStatistics, BillingMode, CostBreakdown, CostOptions, DailyCostEntry, TokenCounts,
    UsageRecord,
};
use crate::pricing::{PricingCatalog, PricingModel, PricingTable};

/// Largest accepted token count for any single field.
pub const DEFAULT_MAX_TOKENS: i64 = 10_000_000;

/// Model used when a calculation names none.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4.0";

/// Accountant configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountantConfig {
    pub default_model: String,
    pub currency: String,
    pub max_tokens: i64,
    /// Pricing file loaded at construction; built-in prices when unset
    pub pricing_file: Option<PathBuf>,
}

impl Default for AccountantConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            currency: "USD".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            pricing_file: None,
        }
    }
}

impl AccountantConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model used for calculations that name none.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_pricing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pricing_file = Some(path.into());
        self
    }
}

#[derive(Debug, Default)]
struct CostAggregates {
    sessions: HashMap<String, f64>,
    daily: BTreeMap<NaiveDate, f64>,
}

/// Prices requests and tracks session and daily totals.
#[derive(Debug)]
pub struct CostAccountant {
    config: AccountantConfig,
    catalog: PricingCatalog,
    aggregates: RwLock<CostAggregates>,
}

impl CostAccountant {
    /// Create an accountant using the built-in pricing table.
    pub fn new(config: AccountantConfig) -> Self {
        Self::with_catalog(config, PricingCatalog::new(PricingTable::builtin()))
    }

    /// Create an accountant sharing an existing catalog.
    pub fn with_catalog(config: AccountantConfig, catalog: PricingCatalog) -> Self {
        Self {
            config,
            catalog,
            aggregates: RwLock::new(CostAggregates::default()),
        }
    }

    /// Create an accountant, loading the configured pricing file if any.
    pub fn from_config(config: AccountantConfig) -> Result<Self> {
        let accountant = Self::new(config);
        if let Some(path) = accountant.config.pricing_file.clone() {
            accountant.load_pricing_file(&path)?;
        }
        Ok(accountant)
    }

    pub fn config(&self) -> &AccountantConfig {
        &self.config
    }

    /// Shared pricing catalog.
    pub fn catalog(&self) -> &PricingCatalog {
        &self.catalog
    }

    /// Replace the pricing table from a file.
    ///
    /// A missing file restores the built-in prices; an invalid one is
    /// rejected and the current table stays active.
    pub fn load_pricing_file(&self, path: &Path) -> Result<usize> {
        self.catalog.load_file(path)
    }

    /// Swap in a new pricing table.
    pub fn replace_table(&self, table: PricingTable) {
        self.catalog.replace(table);
    }

    /// Price a standard request and record it in the daily total.
    pub fn calculate_cost(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        model_id: &str,
    ) -> Result<CostBreakdown> {
        self.calculate_detailed_cost(input_tokens, output_tokens, model_id, &CostOptions::default())
    }

    /// Price a request with explicit billing options and record it.
    ///
    /// The cost is added to the daily total for the breakdown's date, and
    /// to the session total when a non-empty session id is given.
    pub fn calculate_detailed_cost(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        model_id: &str,
        options: &CostOptions,
    ) -> Result<CostBreakdown> {
        let breakdown = self.price_tokens(input_tokens, output_tokens, model_id, options)?;
        self.record(&breakdown);

        log_cost_event!(
            model = %breakdown.pricing_model_id,
            billing_mode = %breakdown.billing_mode,
            tokens = breakdown.tokens.total,
            total_cost = breakdown.total_cost,
            session = breakdown.session_id.as_deref().unwrap_or("")
        );

        Ok(breakdown)
    }

    /// Price a request without touching the running totals.
    pub fn price_tokens(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        model_id: &str,
        options: &CostOptions,
    ) -> Result<CostBreakdown> {
        let (cache_read, cache_write) = options.billing_mode.cache_tokens();
        self.check_tokens("input", input_tokens)?;
        self.check_tokens("output", output_tokens)?;
        self.check_tokens("cache read", cache_read)?;
        self.check_tokens("cache write", cache_write)?;

        let model = self.resolve_model(model_id)?;

        let mut input_cost = model.input_cost(input_tokens);
        let mut output_cost = model.output_cost(output_tokens);
        let mut cache_read_cost = model.cache_read_cost(cache_read);
        let mut cache_write_cost = model.cache_write_cost(cache_write);
        let mut batch_discount = 0.0;

        if options.billing_mode == BillingMode::Batch {
            let original_total = input_cost + output_cost + cache_read_cost + cache_write_cost;
            let keep = 1.0 - model.batch_discount_rate;
            input_cost *= keep;
            output_cost *= keep;
            cache_read_cost *= keep;
            cache_write_cost *= keep;
            batch_discount = original_total * model.batch_discount_rate;
        }

        Ok(CostBreakdown {
            input_cost,
            output_cost,
            cache_read_cost,
            cache_write_cost,
            batch_discount,
            total_cost: input_cost + output_cost + cache_read_cost + cache_write_cost,
            currency: self.config.currency.clone(),
            pricing_model_id: model.id,
            tokens: TokenCounts::new(input_tokens, output_tokens, cache_read, cache_write),
            billing_mode: options.billing_mode,
            timestamp: options.timestamp.unwrap_or_else(Utc::now),
            session_id: options.session_id.clone().filter(|s| !s.is_empty()),
            activity_type: options.activity_type.clone(),
        })
    }

    /// Re-price a historical record at current prices.
    ///
    /// Falls back to the recorded total when the record's model is no
    /// longer priced or its token counts are invalid.
    pub fn reprice_record(&self, record: &UsageRecord) -> f64 {
        match self.price_tokens(
            record.tokens.input,
            record.tokens.output,
            record.model(),
            &CostOptions::default(),
        ) {
            Ok(breakdown) => breakdown.total_cost,
            Err(e) => {
                debug!(
                    model = record.model(),
                    error = %e,
                    "Using recorded cost for record"
                );
                record.cost.total
            }
        }
    }

    /// Total recorded for a session, 0 when unknown.
    pub fn get_session_cost(&self, session_id: &str) -> f64 {
        self.read()
            .sessions
            .get(session_id)
            .copied()
            .unwrap_or(0.0)
    }

    /// Total recorded on a UTC date, 0 when nothing was recorded.
    pub fn get_daily_cost(&self, date: NaiveDate) -> f64 {
        self.read().daily.get(&date).copied().unwrap_or(0.0)
    }

    /// Daily totals for the last `days` days ending today, oldest first.
    pub fn get_daily_cost_summary(&self, days: u32) -> Vec<DailyCostEntry> {
        self.daily_cost_summary_ending(Utc::now().date_naive(), days)
    }

    /// Daily totals for the `days` days ending on `end`, oldest first.
    /// Days without recorded cost are reported as 0.
    pub fn daily_cost_summary_ending(&self, end: NaiveDate, days: u32) -> Vec<DailyCostEntry> {
        let aggregates = self.read();
        (0..i64::from(days))
            .rev()
            .map(|offset| {
                let date = end - Duration::days(offset);
                DailyCostEntry {
                    date,
                    total_cost: aggregates.daily.get(&date).copied().unwrap_or(0.0),
                }
            })
            .collect()
    }

    /// Forget every session total.
    pub fn clear_session_costs(&self) {
        self.write().sessions.clear();
        debug!("Cleared session costs");
    }

    /// Forget every daily total.
    pub fn clear_daily_costs(&self) {
        self.write().daily.clear();
        debug!("Cleared daily costs");
    }

    pub fn statistics(&self) -> AccountantStatistics {
        let aggregates = self.read();
        AccountantStatistics {
            models_loaded: self.catalog.snapshot().len(),
            sessions_tracked: aggregates.sessions.len(),
            days_tracked: aggregates.daily.len(),
            total_tracked_cost: aggregates.daily.values().sum(),
            default_model: self.config.default_model.clone(),
            currency: self.config.currency.clone(),
        }
    }

    fn check_tokens(&self, field: &'static str, value: i64) -> Result<()> {
        if value < 0 {
            return Err(CostError::InvalidInput(format!(
                "{} tokens must be non-negative, got {}",
                field, value
            )));
        }
        if value > self.config.max_tokens {
            return Err(CostError::TokenLimitExceeded {
                field,
                value,
                max: self.config.max_tokens,
            });
        }
        Ok(())
    }

    fn resolve_model(&self, model_id: &str) -> Result<PricingModel> {
        let id = if model_id.is_empty() {
            self.config.default_model.as_str()
        } else {
            model_id
        };
        self.catalog
            .get(id)
            .ok_or_else(|| CostError::ModelNotFound(id.to_string()))
    }

    fn record(&self, breakdown: &CostBreakdown) {
        let mut aggregates = self.write();
        if let Some(session) = &breakdown.session_id {
            *aggregates.sessions.entry(session.clone()).or_insert(0.0) += breakdown.total_cost;
        }
        *aggregates
            .daily
            .entry(breakdown.timestamp.date_naive())
            .or_insert(0.0) += breakdown.total_cost;
    }

    // Aggregates are plain sums; a poisoned lock still holds valid maps.
    fn read(&self) -> RwLockReadGuard<'_, CostAggregates> {
        self.aggregates.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CostAggregates> {
        self.aggregates.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CostAccountant {
    fn default() -> Self {
        Self::new(AccountantConfig::default())
    }
}
