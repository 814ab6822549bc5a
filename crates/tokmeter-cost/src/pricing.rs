//! Model pricing tables.
//!
//! Prices are expressed in currency units per million tokens. The active
//! table lives in a [`PricingCatalog`], which swaps whole tables atomically
//! so a reload never exposes a half-updated table to concurrent readers.
//!
//! Pricing files are YAML (JSON is accepted too, being valid YAML):
//!
//! ```yaml
//! models:
//!   claude-sonnet-4.0:
//!     input: 3.0
//!     output: 15.0
//!     cache_read: 0.30
//!     cache_write: 3.75
//!     batch_discount: 0.5
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CostError, Result};

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Pricing for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingModel {
    pub id: String,
    pub input_price_per_million: f64,
    pub output_price_per_million: f64,
    pub cache_read_price_per_million: f64,
    pub cache_write_price_per_million: f64,
    /// Fraction of the standard price removed for batch submissions (0..=1)
    pub batch_discount_rate: f64,
}

impl PricingModel {
    /// Create a model with input/output prices and no cache or batch pricing.
    pub fn new(id: impl Into<String>, input: f64, output: f64) -> Self {
        Self {
            id: id.into(),
            input_price_per_million: input,
            output_price_per_million: output,
            cache_read_price_per_million: 0.0,
            cache_write_price_per_million: 0.0,
            batch_discount_rate: 0.0,
        }
    }

    /// Set prompt cache prices.
    pub fn with_cache(mut self, read: f64, write: f64) -> Self {
        self.cache_read_price_per_million = read;
        self.cache_write_price_per_million = write;
        self
    }

    /// Set the batch discount rate.
    pub fn with_batch_discount(mut self, rate: f64) -> Self {
        self.batch_discount_rate = rate;
        self
    }

    pub fn input_cost(&self, tokens: i64) -> f64 {
        per_million(tokens, self.input_price_per_million)
    }

    pub fn output_cost(&self, tokens: i64) -> f64 {
        per_million(tokens, self.output_price_per_million)
    }

    pub fn cache_read_cost(&self, tokens: i64) -> f64 {
        per_million(tokens, self.cache_read_price_per_million)
    }

    pub fn cache_write_cost(&self, tokens: i64) -> f64 {
        per_million(tokens, self.cache_write_price_per_million)
    }

    /// Cost of a request billed at standard input/output rates.
    pub fn standard_cost(&self, input: i64, output: i64) -> f64 {
        self.input_cost(input) + self.output_cost(output)
    }

    /// Cost of a request that also reads and writes the prompt cache.
    pub fn cache_aware_cost(&self, input: i64, output: i64, cache_read: i64, cache_write: i64) -> f64 {
        self.standard_cost(input, output)
            + self.cache_read_cost(cache_read)
            + self.cache_write_cost(cache_write)
    }

    /// Check that every price is finite and non-negative and the batch rate is a fraction.
    pub fn validate(&self) -> Result<()> {
        let prices = [
            ("input", self.input_price_per_million),
            ("output", self.output_price_per_million),
            ("cache_read", self.cache_read_price_per_million),
            ("cache_write", self.cache_write_price_per_million),
        ];
        for (name, price) in prices {
            if !price.is_finite() || price < 0.0 {
                return Err(CostError::Config(format!(
                    "model '{}' has invalid {} price {}",
                    self.id, name, price
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.batch_discount_rate) {
            return Err(CostError::Config(format!(
                "model '{}' has batch discount {} outside 0..=1",
                self.id, self.batch_discount_rate
            )));
        }

        Ok(())
    }
}

fn per_million(tokens: i64, price: f64) -> f64 {
    tokens as f64 / TOKENS_PER_MILLION * price
}

/// A complete set of model prices, keyed by model id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingTable {
    models: HashMap<String, PricingModel>,
}

impl PricingTable {
    /// Build a table from models, validating each one.
    pub fn from_models(models: impl IntoIterator<Item = PricingModel>) -> Result<Self> {
        let mut table = HashMap::new();
        for model in models {
            model.validate()?;
            table.insert(model.id.clone(), model);
        }
        Ok(Self { models: table })
    }

    /// Built-in prices for the Claude model family.
    pub fn builtin() -> Self {
        let models = [
            PricingModel::new("claude-opus-4.1", 15.0, 75.0)
                .with_cache(1.50, 18.75)
                .with_batch_discount(0.5),
            PricingModel::new("claude-opus-4.0", 15.0, 75.0)
                .with_cache(1.50, 18.75)
                .with_batch_discount(0.5),
            PricingModel::new("claude-sonnet-4.0", 3.0, 15.0)
                .with_cache(0.30, 3.75)
                .with_batch_discount(0.5),
            PricingModel::new("claude-sonnet-3.7", 3.0, 15.0)
                .with_cache(0.30, 3.75)
                .with_batch_discount(0.5),
            PricingModel::new("claude-haiku-3.5", 0.80, 4.0)
                .with_cache(0.08, 1.0)
                .with_batch_discount(0.5),
        ];

        Self {
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Parse a pricing document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: PricingFile = serde_yaml::from_str(content)?;
        if file.models.is_empty() {
            return Err(CostError::Config(
                "pricing file defines no models".to_string(),
            ));
        }

        Self::from_models(file.models.into_iter().map(|(id, entry)| entry.into_model(id)))
    }

    /// Look up a model.
    pub fn get(&self, model_id: &str) -> Option<&PricingModel> {
        self.models.get(model_id)
    }

    /// Whether the table prices `model_id`.
    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    /// Model ids in sorted order.
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// On-disk pricing document.
#[derive(Debug, Deserialize)]
struct PricingFile {
    #[serde(default)]
    models: BTreeMap<String, PricingFileEntry>,
}

#[derive(Debug, Deserialize)]
struct PricingFileEntry {
    input: f64,
    output: f64,
    #[serde(default)]
    cache_read: f64,
    #[serde(default)]
    cache_write: f64,
    #[serde(default)]
    batch_discount: f64,
}

impl PricingFileEntry {
    fn into_model(self, id: String) -> PricingModel {
        PricingModel::new(id, self.input, self.output)
            .with_cache(self.cache_read, self.cache_write)
            .with_batch_discount(self.batch_discount)
    }
}

/// Shared handle to the active pricing table.
///
/// Clones share the same table. Readers take a snapshot with
/// [`PricingCatalog::snapshot`] and keep using it even if the table is
/// replaced mid-calculation.
#[derive(Debug, Clone)]
pub struct PricingCatalog {
    table: Arc<ArcSwap<PricingTable>>,
}

impl PricingCatalog {
    /// Create a catalog serving `table`.
    pub fn new(table: PricingTable) -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    /// Current table.
    pub fn snapshot(&self) -> Arc<PricingTable> {
        self.table.load_full()
    }

    /// Clone the current pricing for one model.
    pub fn get(&self, model_id: &str) -> Option<PricingModel> {
        self.table.load().get(model_id).cloned()
    }

    /// Replace the whole table.
    pub fn replace(&self, table: PricingTable) {
        info!(models = table.len(), "Pricing table replaced");
        self.table.store(Arc::new(table));
    }

    /// Load a pricing file and make it the active table.
    ///
    /// A missing file restores the built-in prices. A file that fails to
    /// parse or validate leaves the current table untouched.
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            debug!(path = %path.display(), "Pricing file not found, using built-in prices");
            let table = PricingTable::builtin();
            let count = table.len();
            self.replace(table);
            return Ok(count);
        }

        let content = std::fs::read_to_string(path)?;
        let table = PricingTable::from_yaml_str(&content).map_err(|e| match e {
            CostError::Yaml(err) => {
                CostError::Config(format!("failed to parse {}: {}", path.display(), err))
            }
            other => other,
        })?;

        let count = table.len();
        self.replace(table);
        info!(path = %path.display(), models = count, "Loaded pricing file");
        Ok(count)
    }
}

impl Default for PricingCatalog {
    fn default() -> Self {
        Self::new(PricingTable::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CUSTOM_PRICING: &str = r#"
models:
  house-model:
    input: 1.0
    output: 2.0
    cache_read: 0.1
    cache_write: 1.25
    batch_discount: 0.4
  plain-model:
    input: 0.5
    output: 0.5
"#;

    #[test]
    fn test_builtin_table() {
        let table = PricingTable::builtin();
        let sonnet = table.get("claude-sonnet-4.0").unwrap();
        assert_eq!(sonnet.input_price_per_million, 3.0);
        assert_eq!(sonnet.output_price_per_million, 15.0);
        assert_eq!(sonnet.cache_read_price_per_million, 0.30);
        assert_eq!(sonnet.cache_write_price_per_million, 3.75);
        assert_eq!(sonnet.batch_discount_rate, 0.5);
        assert!(table.contains("claude-haiku-3.5"));
        for id in table.model_ids() {
            table.get(&id).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn test_standard_cost() {
        let model = PricingModel::new("m", 3.0, 15.0);
        assert!((model.standard_cost(1000, 2000) - 0.033).abs() < 1e-12);
        assert_eq!(model.standard_cost(0, 0), 0.0);
    }

    #[test]
    fn test_parse_pricing_yaml() {
        let table = PricingTable::from_yaml_str(CUSTOM_PRICING).unwrap();
        assert_eq!(table.len(), 2);

        let house = table.get("house-model").unwrap();
        assert_eq!(house.cache_write_price_per_million, 1.25);
        assert_eq!(house.batch_discount_rate, 0.4);

        let plain = table.get("plain-model").unwrap();
        assert_eq!(plain.cache_read_price_per_million, 0.0);
        assert_eq!(plain.batch_discount_rate, 0.0);
    }

    #[test]
    fn test_parse_pricing_json() {
        let json = r#"{"models": {"json-model": {"input": 2.0, "output": 4.0}}}"#;
        let table = PricingTable::from_yaml_str(json).unwrap();
        assert!(table.contains("json-model"));
    }

    #[test]
    fn test_rejects_invalid_prices() {
        let negative = "models:\n  bad:\n    input: -1.0\n    output: 1.0\n";
        assert!(PricingTable::from_yaml_str(negative).unwrap_err().is_config_error());

        let discount = "models:\n  bad:\n    input: 1.0\n    output: 1.0\n    batch_discount: 1.5\n";
        assert!(PricingTable::from_yaml_str(discount).unwrap_err().is_config_error());

        assert!(PricingTable::from_yaml_str("models: {}").unwrap_err().is_config_error());
    }

    #[test]
    fn test_catalog_load_replaces_table() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CUSTOM_PRICING.as_bytes()).unwrap();

        let catalog = PricingCatalog::default();
        let shared = catalog.clone();
        assert_eq!(catalog.load_file(file.path()).unwrap(), 2);

        // Clones observe the new table; built-in models are gone
        assert!(shared.get("house-model").is_some());
        assert!(shared.get("claude-sonnet-4.0").is_none());
    }

    #[test]
    fn test_catalog_missing_file_uses_builtin() {
        let catalog = PricingCatalog::new(PricingTable::default());
        let count = catalog
            .load_file(Path::new("/nonexistent/tokmeter/pricing.yaml"))
            .unwrap();
        assert_eq!(count, PricingTable::builtin().len());
        assert!(catalog.get("claude-sonnet-4.0").is_some());
    }

    #[test]
    fn test_catalog_malformed_file_keeps_table() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"models: [not, a, map").unwrap();

        let catalog = PricingCatalog::default();
        let err = catalog.load_file(file.path()).unwrap_err();
        assert!(matches!(err, CostError::Config(_)));
        assert!(catalog.get("claude-sonnet-4.0").is_some());
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let catalog = PricingCatalog::default();
        let before = catalog.snapshot();
        catalog.replace(PricingTable::default());

        assert!(before.contains("claude-opus-4.0"));
        assert!(catalog.snapshot().is_empty());
    }
}
