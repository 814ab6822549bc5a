//! Error types for token estimation.

use std::time::Duration;
use thiserror::Error;

/// Token estimation errors.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Malformed request (unknown method name and similar)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Text exceeds the configured character limit
    #[error("text too long: {length} characters exceeds the limit of {max}")]
    TextTooLong {
        /// Character count of the rejected text
        length: usize,
        /// Configured maximum
        max: usize,
    },

    /// Text is dominated by control characters
    #[error(
        "text contains too many control characters: {count} of {length} exceeds {max_percent:.0}%",
        max_percent = .max_ratio * 100.0
    )]
    TooManyControlChars {
        /// Control characters found (excluding newline, carriage return and tab)
        count: usize,
        /// Character count of the text
        length: usize,
        /// Configured maximum ratio
        max_ratio: f64,
    },

    /// The exact tokenizer could not be initialized
    #[error("exact tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),

    /// The exact tokenizer faulted while counting
    #[error("token computation failed: {0}")]
    Computation(String),

    /// The computation ran past its deadline
    #[error("token computation exceeded its {limit:?} deadline")]
    Timeout {
        /// Configured deadline
        limit: Duration,
    },

    /// One text of a batch failed; the batch is abandoned
    #[error("text {index} of batch failed: {source}")]
    BatchItem {
        /// Position of the failing text
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<TokenError>,
    },
}

impl TokenError {
    /// Check if this error was caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            TokenError::InvalidInput(_)
            | TokenError::TextTooLong { .. }
            | TokenError::TooManyControlChars { .. } => true,
            TokenError::BatchItem { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }
}

/// Result type for token estimation.
pub type Result<T> = std::result::Result<T, TokenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_chars_message() {
        let err = TokenError::TooManyControlChars {
            count: 3,
            length: 10,
            max_ratio: 0.1,
        };
        assert_eq!(
            err.to_string(),
            "text contains too many control characters: 3 of 10 exceeds 10%"
        );
    }

    #[test]
    fn test_batch_item_classification() {
        let err = TokenError::BatchItem {
            index: 2,
            source: Box::new(TokenError::TextTooLong { length: 5, max: 4 }),
        };
        assert!(err.is_invalid_input());
        assert!(err.to_string().starts_with("text 2 of batch failed"));

        let err = TokenError::BatchItem {
            index: 0,
            source: Box::new(TokenError::Computation("boom".into())),
        };
        assert!(!err.is_invalid_input());
    }
}
