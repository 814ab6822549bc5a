//! Meter configuration file.
//!
//! Every section is optional and falls back to its defaults:
//!
//! ```yaml
//! estimator:
//!   cache_capacity: 5000
//!   default_method: heuristic
//! accountant:
//!   default_model: claude-haiku-3.5
//!   pricing_file: /etc/tokmeter/pricing.yaml
//! optimizer:
//!   thresholds:
//!     min_saving: 0.05
//! logging:
//!   verbose: true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokmeter_core::{CoreError, LogGuard};
use tokmeter_cost::{AccountantConfig, OptimizerConfig};
use tokmeter_tokens::EstimatorConfig;

/// Logging section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files; `~/.tokmeter/logs` when unset
    pub dir: Option<PathBuf>,
    pub verbose: bool,
}

/// Configuration for all three services.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub estimator: EstimatorConfig,
    pub accountant: AccountantConfig,
    pub optimizer: OptimizerConfig,
    pub logging: LoggingConfig,
}

impl MeterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_accountant(mut self, accountant: AccountantConfig) -> Self {
        self.accountant = accountant;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::ConfigNotFound {
                    path: path.to_path_buf(),
                    source: Some(e),
                }
            } else {
                CoreError::io("reading configuration", path, e)
            }
        })?;

        let config = Self::from_yaml_str(&content)
            .map_err(|e| CoreError::config_invalid(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration without validating it.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document means all defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Check value ranges across all sections.
    pub fn validate(&self) -> Result<(), CoreError> {
        let estimator = &self.estimator;
        if estimator.max_text_chars == 0 {
            return Err(CoreError::config_validation(
                "estimator.max_text_chars must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&estimator.max_control_ratio) {
            return Err(CoreError::config_validation(
                "estimator.max_control_ratio must be between 0 and 1",
            ));
        }

        let accountant = &self.accountant;
        if accountant.default_model.is_empty() {
            return Err(CoreError::config_validation(
                "accountant.default_model must not be empty",
            ));
        }
        if accountant.currency.is_empty() {
            return Err(CoreError::config_validation(
                "accountant.currency must not be empty",
            ));
        }
        if accountant.max_tokens <= 0 {
            return Err(CoreError::config_validation(
                "accountant.max_tokens must be positive",
            ));
        }

        let thresholds = &self.optimizer.thresholds;
        if !(0.0..=1.0).contains(&thresholds.confidence_min) {
            return Err(CoreError::config_validation(
                "optimizer.thresholds.confidence_min must be between 0 and 1",
            ));
        }
        if thresholds.min_saving < 0.0 {
            return Err(CoreError::config_validation(
                "optimizer.thresholds.min_saving must not be negative",
            ));
        }

        let policy = &self.optimizer.policy;
        let fractions = [
            ("cacheable_fraction", policy.cacheable_fraction),
            ("batch_saving_fraction", policy.batch_saving_fraction),
            ("workflow_saving_fraction", policy.workflow_saving_fraction),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::config_validation(format!(
                    "optimizer.policy.{} must be between 0 and 1",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Install the tracing subscriber described by the logging section.
    pub fn init_logging(&self) -> Result<LogGuard, CoreError> {
        tokmeter_core::init_logging(self.logging.dir.clone(), self.logging.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokmeter_tokens::TokenMethod;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_validate() {
        MeterConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_sections() {
        let file = write_config(
            "estimator:\n  cache_capacity: 64\n  default_method: heuristic\naccountant:\n  default_model: claude-haiku-3.5\n",
        );
        let config = MeterConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(config.estimator.cache_capacity, 64);
        assert_eq!(config.estimator.default_method, TokenMethod::Heuristic);
        assert_eq!(config.accountant.default_model, "claude-haiku-3.5");
        assert_eq!(config.accountant.currency, "USD");
        assert_eq!(config.optimizer, OptimizerConfig::default());
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = write_config("");
        assert_eq!(MeterConfig::from_yaml_file(file.path()).unwrap(), MeterConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = MeterConfig::from_yaml_file(Path::new("/nonexistent/tokmeter.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { source: Some(_), .. }));
    }

    #[test]
    fn test_malformed_file() {
        let file = write_config("estimator: [unclosed");
        let err = MeterConfig::from_yaml_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_validation_failure() {
        let file = write_config("optimizer:\n  thresholds:\n    confidence_min: 1.5\n");
        let err = MeterConfig::from_yaml_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::ConfigValidation { .. }));
        assert!(err.to_string().contains("confidence_min"));
    }
}
