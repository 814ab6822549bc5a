//! Pluggable exact tokenizers.
//!
//! The estimator only needs a token count, so anything that maps text to a
//! subword sequence can be plugged in through [`ExactTokenizer`]. The
//! bundled implementation uses the `cl100k_base` vocabulary from
//! `tiktoken-rs` and is compiled with the `tiktoken` feature.

use std::sync::Arc;

use crate::error::{Result, TokenError};

/// A subword tokenizer producing exact token counts.
pub trait ExactTokenizer: Send + Sync {
    /// Count the tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Short name for logs and statistics.
    fn name(&self) -> &str;
}

/// `cl100k_base` BPE tokenizer.
#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    /// Load the `cl100k_base` vocabulary.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| TokenError::TokenizerUnavailable(e.to_string()))?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl ExactTokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn name(&self) -> &str {
        "tiktoken-cl100k"
    }
}

/// Build the tokenizer compiled into this crate.
///
/// Fails with [`TokenError::TokenizerUnavailable`] when the vocabulary cannot
/// be loaded or no tokenizer feature is enabled.
pub fn default_tokenizer() -> Result<Arc<dyn ExactTokenizer>> {
    #[cfg(feature = "tiktoken")]
    {
        Ok(Arc::new(TiktokenTokenizer::cl100k()?))
    }

    #[cfg(not(feature = "tiktoken"))]
    {
        Err(TokenError::TokenizerUnavailable(
            "built without the tiktoken feature".to_string(),
        ))
    }
}
