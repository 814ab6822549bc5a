//! The token estimator service.
//!
//! [`TokenEstimator`] validates text, resolves the requested strategy,
//! consults the cache and counts tokens. It is `Send + Sync` and meant to be
//! shared behind an `Arc`.
//!
//! ## Usage
//!
//! ```no_run
//! use tokmeter_tokens::{EstimatorConfig, TokenEstimator, TokenMethod};
//!
//! fn main() -> tokmeter_tokens::Result<()> {
//!     let estimator = TokenEstimator::new(EstimatorConfig::default());
//!
//!     let tokens = estimator.calculate_tokens("Hello, world!", TokenMethod::Auto)?;
//!     let split = estimator.analyze_token_distribution("你好, world", TokenMethod::Heuristic)?;
//!     println!("{tokens} tokens, {} of them CJK", split.chinese_tokens);
//!
//!     Ok(())
//! }
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::TokenCache;
use crate::config::EstimatorConfig;
use crate::error::{Result, TokenError};
use crate::heuristic::{self, CharCounts, Deadline};
use crate::tokenizer::{self, ExactTokenizer};
use crate::types::{EstimatorStatistics, TokenDistribution, TokenMethod};

/// Converts text into token counts.
pub struct TokenEstimator {
    config: EstimatorConfig,
    cache: TokenCache,
    exact: RwLock<Option<Arc<dyn ExactTokenizer>>>,
    fallback_warned: AtomicBool,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl TokenEstimator {
    /// Create an estimator using the tokenizer compiled into this crate.
    ///
    /// If the tokenizer cannot be loaded the estimator runs on the heuristic
    /// alone until [`enable_exact_tokenizer`](Self::enable_exact_tokenizer)
    /// is called.
    pub fn new(config: EstimatorConfig) -> Self {
        Self::with_tokenizer_factory(config, tokenizer::default_tokenizer)
    }

    /// Create an estimator with no exact tokenizer.
    pub fn heuristic_only(config: EstimatorConfig) -> Self {
        Self::build(config, None)
    }

    /// Create an estimator around an already constructed tokenizer.
    pub fn with_tokenizer(config: EstimatorConfig, tokenizer: Arc<dyn ExactTokenizer>) -> Self {
        Self::build(config, Some(tokenizer))
    }

    /// Create an estimator whose tokenizer comes from `factory`.
    ///
    /// A failing factory is logged and leaves the estimator heuristic-only.
    pub fn with_tokenizer_factory<F>(config: EstimatorConfig, factory: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn ExactTokenizer>>,
    {
        let exact = match factory() {
            Ok(tokenizer) => {
                info!(tokenizer = tokenizer.name(), "exact tokenizer ready");
                Some(tokenizer)
            }
            Err(e) => {
                warn!(error = %e, "exact tokenizer failed to initialize, using heuristic");
                None
            }
        };
        Self::build(config, exact)
    }

    fn build(config: EstimatorConfig, exact: Option<Arc<dyn ExactTokenizer>>) -> Self {
        Self {
            cache: TokenCache::new(config.cache_capacity),
            config,
            exact: RwLock::new(exact),
            fallback_warned: AtomicBool::new(false),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    /// The configuration this estimator was built with.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Install (or replace) the exact tokenizer.
    ///
    /// Cached exact counts from a previous tokenizer are discarded.
    pub fn enable_exact_tokenizer(&self, tokenizer: Arc<dyn ExactTokenizer>) {
        info!(tokenizer = tokenizer.name(), "exact tokenizer enabled");
        *self.exact.write().unwrap_or_else(|e| e.into_inner()) = Some(tokenizer);
        self.fallback_warned.store(false, Ordering::Relaxed);
        self.cache.clear();
    }

    /// Remove the exact tokenizer; later calls use the heuristic.
    pub fn disable_exact_tokenizer(&self) {
        if self
            .exact
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            warn!("exact tokenizer disabled, using heuristic");
        }
    }

    /// Whether an exact tokenizer is active.
    pub fn exact_available(&self) -> bool {
        self.exact_tokenizer().is_some()
    }

    fn exact_tokenizer(&self) -> Option<Arc<dyn ExactTokenizer>> {
        self.exact.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Reject text that is too long or dominated by control characters.
    ///
    /// Newline, carriage return and tab are not counted as control characters.
    pub fn validate_text(&self, text: &str) -> Result<()> {
        let mut length = 0usize;
        let mut control = 0usize;
        for c in text.chars() {
            length += 1;
            if c.is_control() && !matches!(c, '\n' | '\r' | '\t') {
                control += 1;
            }
        }

        if length > self.config.max_text_chars {
            return Err(TokenError::TextTooLong {
                length,
                max: self.config.max_text_chars,
            });
        }

        if length > 0 && control as f64 / length as f64 > self.config.max_control_ratio {
            return Err(TokenError::TooManyControlChars {
                count: control,
                length,
                max_ratio: self.config.max_control_ratio,
            });
        }

        Ok(())
    }

    /// Count the tokens in `text`.
    ///
    /// `Auto` and `Exact` use the exact tokenizer when one is active and fall
    /// back to the heuristic otherwise. Only the first fallback per estimator
    /// (and the first after [`enable_exact_tokenizer`](Self::enable_exact_tokenizer))
    /// logs at `warn`; later fallbacks log at `debug`.
    ///
    /// Fails with [`TokenError::Timeout`] when counting overruns the configured
    /// computation deadline; such counts are not cached.
    pub fn calculate_tokens(&self, text: &str, method: TokenMethod) -> Result<usize> {
        self.validate_text(text)?;
        if text.is_empty() {
            return Ok(0);
        }

        let (resolved, tokenizer) = self.resolve(method);
        self.count_resolved(text, resolved, tokenizer)
    }

    /// Count with an already resolved strategy, going through the cache.
    fn count_resolved(
        &self,
        text: &str,
        resolved: TokenMethod,
        tokenizer: Option<Arc<dyn ExactTokenizer>>,
    ) -> Result<usize> {
        if let Some(count) = self.cache.get(resolved, text) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(count);
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let deadline = Deadline::after(self.config.computation_timeout());
        let count = match tokenizer {
            Some(tokenizer) => self.count_exact(tokenizer.as_ref(), text, deadline)?,
            None => heuristic::count_chars(text, Some(deadline))?.estimate_tokens(),
        };

        self.cache.insert(resolved, text, count);
        debug!(method = %resolved, bytes = text.len(), tokens = count, "calculated tokens");
        Ok(count)
    }

    /// Count tokens for each text in order.
    ///
    /// The first failing text aborts the batch; its index is in the error.
    pub fn calculate_tokens_for_multiple_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        method: TokenMethod,
    ) -> Result<Vec<usize>> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                self.calculate_tokens(text.as_ref(), method)
                    .map_err(|source| TokenError::BatchItem {
                        index,
                        source: Box::new(source),
                    })
            })
            .collect()
    }

    /// Split the token count of `text` between Latin and CJK text.
    pub fn analyze_token_distribution(
        &self,
        text: &str,
        method: TokenMethod,
    ) -> Result<TokenDistribution> {
        self.validate_text(text)?;

        let (resolved, tokenizer) = self.resolve(method);
        if text.is_empty() {
            return Ok(TokenDistribution::empty(resolved));
        }

        let deadline = Deadline::after(self.config.computation_timeout());
        let counts = heuristic::count_chars(text, Some(deadline))?;
        let total = self.count_resolved(text, resolved, tokenizer)?;

        let chinese = match resolved {
            TokenMethod::Exact => proportional_cjk_tokens(total, &counts),
            _ => counts.cjk_tokens().min(total),
        };

        Ok(TokenDistribution {
            english_tokens: total - chinese,
            chinese_tokens: chinese,
            total_tokens: total,
            method: resolved,
        })
    }

    /// Snapshot of cache and tokenizer state.
    pub fn statistics(&self) -> EstimatorStatistics {
        let tokenizer = self.exact_tokenizer();
        EstimatorStatistics {
            cache_entries: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            exact_available: tokenizer.is_some(),
            tokenizer_name: tokenizer.map(|t| t.name().to_string()),
        }
    }

    /// Drop every cached count.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Map a requested method onto the strategy that will actually run.
    fn resolve(&self, method: TokenMethod) -> (TokenMethod, Option<Arc<dyn ExactTokenizer>>) {
        if method == TokenMethod::Heuristic {
            return (TokenMethod::Heuristic, None);
        }

        match self.exact_tokenizer() {
            Some(tokenizer) => (TokenMethod::Exact, Some(tokenizer)),
            None => {
                if !self.fallback_warned.swap(true, Ordering::Relaxed) {
                    warn!(requested = %method, "exact tokenizer unavailable, falling back to heuristic");
                } else {
                    debug!(requested = %method, "exact tokenizer unavailable, using heuristic");
                }
                (TokenMethod::Heuristic, None)
            }
        }
    }

    /// Run the exact tokenizer, turning a panic into an error.
    ///
    /// The tokenizer call itself cannot be interrupted; an overrun is
    /// reported once it returns.
    fn count_exact(
        &self,
        tokenizer: &dyn ExactTokenizer,
        text: &str,
        deadline: Deadline,
    ) -> Result<usize> {
        let started = Instant::now();
        let count = catch_unwind(AssertUnwindSafe(|| tokenizer.count_tokens(text))).map_err(
            |panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tokenizer panicked".to_string());
                TokenError::Computation(format!("{}: {message}", tokenizer.name()))
            },
        )?;
        deadline.check()?;
        debug!(
            tokenizer = tokenizer.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "exact count finished"
        );
        Ok(count)
    }
}

/// CJK share of an exact total, apportioned by character ratio.
fn proportional_cjk_tokens(total: usize, counts: &CharCounts) -> usize {
    if counts.total() == 0 {
        return 0;
    }
    let ratio = counts.cjk as f64 / counts.total() as f64;
    ((total as f64 * ratio).round() as usize).min(total)
}
