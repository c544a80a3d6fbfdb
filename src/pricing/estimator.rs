//! Token counting and cost estimation.

use std::sync::Arc;

use crate::tokenizer::TokenizerRegistry;

use super::{DEFAULT_CHARS_PER_TOKEN, DEFAULT_OUTPUT_TOKENS_PER_ITEM, PricingPolicy, PricingTable};

/// Counts tokens and prices calls for models in a [`PricingTable`].
///
/// Counting never fails: when a model has no exact tokenizer (unknown model,
/// no encoding, tokenizer failed to load) the count degrades to
/// `floor(chars / chars_per_token)`. Pricing on the other hand returns
/// `None` for unknown models; callers must read that as "cannot price",
/// never as zero.
///
/// ```rust
/// # use mimir::pricing::TokenEstimator;
/// let estimator = TokenEstimator::default();
/// assert_eq!(estimator.count_tokens("", "gpt-5"), 0);
/// assert_eq!(estimator.count_tokens("abcdefgh", "unknown-model"), 2);
/// assert!(estimator.exact_cost("in", "out", "unknown-model").is_none());
/// ```
#[derive(Clone)]
pub struct TokenEstimator {
    pricing: Arc<PricingTable>,
    tokenizers: Arc<TokenizerRegistry>,
}

impl TokenEstimator {
    pub fn new(pricing: PricingTable, tokenizers: TokenizerRegistry) -> Self {
        Self {
            pricing: Arc::new(pricing),
            tokenizers: Arc::new(tokenizers),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn tokenizers(&self) -> &TokenizerRegistry {
        &self.tokenizers
    }

    /// Token count of `text` under `model`'s tokenization scheme.
    pub fn count_tokens(&self, text: &str, model: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let spec = self.pricing.get(model);
        if let Some(encoding) = spec.and_then(|s| s.encoding.as_deref()) {
            if let Ok(count) = self.tokenizers.count_tokens(text, encoding) {
                return count;
            }
        }

        let ratio = spec
            .map(|s| s.chars_per_token)
            .filter(|r| *r > 0.0)
            .unwrap_or(DEFAULT_CHARS_PER_TOKEN);
        (text.chars().count() as f64 / ratio).floor() as usize
    }

    /// Expected output tokens for `item_count` items, before the call.
    pub fn estimate_output_tokens(&self, model: &str, item_count: usize) -> usize {
        let per_item = self
            .pricing
            .get(model)
            .map(|s| s.output_tokens_per_item)
            .unwrap_or(DEFAULT_OUTPUT_TOKENS_PER_ITEM);
        per_item * item_count
    }

    /// Pricing policy for `model`, if the table prices it.
    pub fn pricing_policy(&self, model: &str) -> Option<PricingPolicy> {
        self.pricing.get(model)?.pricing_policy()
    }

    /// Cost of explicit token counts.
    pub fn token_cost(&self, model: &str, input_tokens: usize, output_tokens: usize) -> Option<f64> {
        self.pricing_policy(model)?
            .token_cost(input_tokens, output_tokens)
    }

    /// Pre-call planning figure: exact input, estimated output.
    pub fn estimate_cost(&self, input: &str, item_count: usize, model: &str) -> Option<f64> {
        let policy = self.pricing_policy(model)?;
        let input_tokens = self.count_tokens(input, model);
        let output_tokens = self.estimate_output_tokens(model, item_count);
        policy.token_cost(input_tokens, output_tokens)
    }

    /// Post-call billing figure from the actual output text.
    pub fn exact_cost(&self, input: &str, output: &str, model: &str) -> Option<f64> {
        let policy = self.pricing_policy(model)?;
        policy.token_cost(
            self.count_tokens(input, model),
            self.count_tokens(output, model),
        )
    }
}

impl Default for TokenEstimator {
    /// Embedded pricing table with the default tokenizer mappings.
    fn default() -> Self {
        Self::new(PricingTable::embedded(), TokenizerRegistry::new())
    }
}

/// Render a cost for logs: `$0.000123` or `unknown`.
pub(crate) fn format_cost(cost: Option<f64>) -> String {
    match cost {
        Some(usd) => format!("${usd:.6}"),
        None => "unknown".to_string(),
    }
}
