//! Integration tests for tokmeter-tokens through the public API.

use std::sync::Arc;

use tokmeter_tokens::{
    EstimatorConfig, ExactTokenizer, TokenError, TokenEstimator, TokenMethod, heuristic,
};

/// Splits on whitespace; stands in for a provider vocabulary.
struct WhitespaceTokenizer;

impl ExactTokenizer for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

#[test]
fn test_method_strings_drive_estimation() {
    tokmeter_core::init_test_logging();
    let estimator = TokenEstimator::heuristic_only(EstimatorConfig::default());

    for (method, expected) in [("heuristic", 3), ("", 3), ("auto", 3), ("exact", 3)] {
        let method: TokenMethod = method.parse().unwrap();
        assert_eq!(estimator.calculate_tokens("hello world!", method).unwrap(), expected);
    }

    let err = "approximate".parse::<TokenMethod>().unwrap_err();
    assert!(matches!(err, TokenError::InvalidInput(_)));
}

#[test]
fn test_cache_bound_under_churn() {
    let estimator =
        TokenEstimator::heuristic_only(EstimatorConfig::new().with_cache_capacity(16));

    for i in 0..500 {
        estimator
            .calculate_tokens(&format!("prompt number {i}"), TokenMethod::Heuristic)
            .unwrap();
        assert!(estimator.statistics().cache_entries <= 16);
    }
}

#[test]
fn test_injected_tokenizer_round_trip() {
    let estimator = TokenEstimator::with_tokenizer(
        EstimatorConfig::default(),
        Arc::new(WhitespaceTokenizer),
    );

    let texts = vec![
        "summarize the design document".to_string(),
        "解释 这段 代码".to_string(),
    ];
    let counts = estimator
        .calculate_tokens_for_multiple_texts(&texts, TokenMethod::Auto)
        .unwrap();
    assert_eq!(counts, vec![4, 3]);

    let stats = estimator.statistics();
    assert!(stats.exact_available);
    assert_eq!(stats.tokenizer_name.as_deref(), Some("whitespace"));
}

#[test]
fn test_distribution_matches_heuristic_module() {
    let estimator = TokenEstimator::heuristic_only(EstimatorConfig::default());
    let text = "请帮我 review this pull request, 谢谢!";

    let dist = estimator
        .analyze_token_distribution(text, TokenMethod::Heuristic)
        .unwrap();
    assert_eq!(dist.total_tokens, heuristic::estimate_tokens(text));
    assert_eq!(dist.total_tokens, dist.english_tokens + dist.chinese_tokens);
    assert!(dist.chinese_tokens > 0);
}

#[cfg(feature = "tiktoken")]
#[test]
fn test_default_estimator_uses_tiktoken() {
    let estimator = TokenEstimator::new(EstimatorConfig::default());
    assert!(estimator.exact_available());

    let tokens = estimator
        .calculate_tokens("The quick brown fox jumps over the lazy dog.", TokenMethod::Auto)
        .unwrap();
    assert!(tokens >= 9 && tokens <= 12, "unexpected count {tokens}");

    let dist = estimator
        .analyze_token_distribution("hello 世界", TokenMethod::Auto)
        .unwrap();
    assert_eq!(dist.method, TokenMethod::Exact);
    assert_eq!(dist.total_tokens, dist.english_tokens + dist.chinese_tokens);
}
