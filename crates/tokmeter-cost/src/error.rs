//! Error types for cost accounting.

use thiserror::Error;

/// Cost accounting errors.
#[derive(Error, Debug)]
pub enum CostError {
    /// Invalid token counts or options
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A token count above the accepted maximum
    #[error("{field} tokens {value} exceed the limit of {max}")]
    TokenLimitExceeded {
        /// Which count was rejected (input, output, cache read, cache write)
        field: &'static str,
        /// Rejected value
        value: i64,
        /// Configured maximum
        max: i64,
    },

    /// No pricing entry for the model
    #[error("pricing model not found: {0}")]
    ModelNotFound(String),

    /// Pricing or accountant configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error (pricing file reading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CostError {
    /// Check if this error was caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CostError::InvalidInput(_)
                | CostError::TokenLimitExceeded { .. }
                | CostError::ModelNotFound(_)
        )
    }

    /// Check if this error came from loading pricing data.
    pub fn is_config_error(&self) -> bool {
        matches!(self, CostError::Config(_) | CostError::Yaml(_) | CostError::Io(_))
    }

    /// Create a user-friendly message for this error.
    pub fn friendly_message(&self) -> String {
        match self {
            CostError::ModelNotFound(model) => {
                format!("No pricing is configured for '{}'. Check the pricing file.", model)
            }
            CostError::TokenLimitExceeded { field, max, .. } => {
                format!("Too many {} tokens in one request (limit {}).", field, max)
            }
            CostError::Yaml(e) => format!("Pricing file is not valid YAML: {}", e),
            _ => format!("Error: {}", self),
        }
    }
}

/// Result type for cost accounting operations.
pub type Result<T> = std::result::Result<T, CostError>;
