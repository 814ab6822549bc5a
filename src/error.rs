//! Error type for the tokmeter facade.

use thiserror::Error;
use tokmeter_core::CoreError;
use tokmeter_cost::CostError;
use tokmeter_tokens::TokenError;

/// Result type alias using [`MeterError`].
pub type Result<T> = std::result::Result<T, MeterError>;

/// Any failure surfaced by [`crate::UsageMeter`] or [`crate::MeterConfig`].
#[derive(Debug, Error)]
pub enum MeterError {
    /// Configuration or logging setup failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Token estimation failed
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Cost accounting failed
    #[error(transparent)]
    Cost(#[from] CostError),
}

impl MeterError {
    /// Returns true if the caller passed unusable input.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::Token(e) => e.is_invalid_input(),
            Self::Cost(e) => e.is_invalid_input(),
            Self::Core(_) => false,
        }
    }

    /// Returns true if configuration (including pricing data) is at fault.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_config_error(),
            Self::Cost(e) => e.is_config_error(),
            Self::Token(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_display() {
        let err: MeterError = CostError::ModelNotFound("gpt-9".into()).into();
        assert_eq!(err.to_string(), "pricing model not found: gpt-9");
        assert!(err.is_invalid_input());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_config_classification() {
        let err: MeterError = CoreError::config_validation("currency must not be empty").into();
        assert!(err.is_config_error());
        assert!(!err.is_invalid_input());

        let err: MeterError = TokenError::InvalidInput("bad".into()).into();
        assert!(err.is_invalid_input());
        assert!(!err.is_config_error());
    }
}
