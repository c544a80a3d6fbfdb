//! Model pricing and cost estimation.
//!
//! A compiled-in table describes each known model: which platform serves
//! it, which tokenizer encoding it uses, its per-million-token prices and
//! the heuristics used when exact numbers are unavailable. The
//! [`TokenEstimator`] combines the table with a [`TokenizerRegistry`] to
//! count tokens and price calls before and after they happen.
//!
//! [`TokenizerRegistry`]: crate::tokenizer::TokenizerRegistry

mod estimator;

pub use estimator::TokenEstimator;
pub(crate) use estimator::format_cost;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::{UsageBreakdown, UsageUnit};

/// Characters per token assumed for models without a configured ratio.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Output tokens per item assumed for models without a configured figure.
pub const DEFAULT_OUTPUT_TOKENS_PER_ITEM: usize = 50;

/// DeepL API price per million source characters.
pub const DEEPL_COST_PER_1M_CHARS: f64 = 20.0;

/// Pricing and tokenization facts for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    /// Platform serving the model, e.g. "openai" or "grok".
    pub platform: String,
    #[serde(default = "default_family")]
    pub family: String,
    /// Tokenizer encoding name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_cost_per_1m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_cost_per_1m: Option<f64>,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
    #[serde(default = "default_output_tokens_per_item")]
    pub output_tokens_per_item: usize,
}

fn default_family() -> String {
    "chat_completion".to_string()
}

fn default_chars_per_token() -> f64 {
    DEFAULT_CHARS_PER_TOKEN
}

fn default_output_tokens_per_item() -> usize {
    DEFAULT_OUTPUT_TOKENS_PER_ITEM
}

impl ModelSpec {
    /// Per-token policy, if both prices are known.
    pub fn pricing_policy(&self) -> Option<PricingPolicy> {
        Some(PricingPolicy::PerToken {
            input_per_1m: self.input_cost_per_1m?,
            output_per_1m: self.output_cost_per_1m?,
        })
    }
}

/// How a backend bills usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingPolicy {
    PerToken { input_per_1m: f64, output_per_1m: f64 },
    PerCharacter { per_1m: f64 },
}

impl PricingPolicy {
    /// Price a usage breakdown in USD.
    ///
    /// `None` when the usage carries none of the dimensions this policy
    /// bills for.
    pub fn cost(&self, usage: &UsageBreakdown) -> Option<f64> {
        match *self {
            PricingPolicy::PerToken {
                input_per_1m,
                output_per_1m,
            } => {
                let input = usage.input(UsageUnit::Tokens);
                let output = usage.output(UsageUnit::Tokens);
                if input.is_none() && output.is_none() {
                    return None;
                }
                Some(
                    per_million(input.unwrap_or(0), input_per_1m)
                        + per_million(output.unwrap_or(0), output_per_1m),
                )
            }
            PricingPolicy::PerCharacter { per_1m } => usage
                .input(UsageUnit::Characters)
                .map(|chars| per_million(chars, per_1m)),
        }
    }

    /// Price explicit token counts (per-token policies only).
    pub fn token_cost(&self, input_tokens: usize, output_tokens: usize) -> Option<f64> {
        match *self {
            PricingPolicy::PerToken {
                input_per_1m,
                output_per_1m,
            } => Some(
                per_million(input_tokens as u64, input_per_1m)
                    + per_million(output_tokens as u64, output_per_1m),
            ),
            PricingPolicy::PerCharacter { .. } => None,
        }
    }
}

fn per_million(quantity: u64, price: f64) -> f64 {
    quantity as f64 / 1_000_000.0 * price
}

/// Static model → pricing lookup.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    models: HashMap<String, ModelSpec>,
}

impl PricingTable {
    /// An empty table: every model is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with the compiled-in model list.
    pub fn embedded() -> Self {
        let mut table = Self::new();
        match serde_json::from_str::<Vec<ModelSpec>>(EMBEDDED_MODELS) {
            Ok(models) => {
                for model in models {
                    table.insert(model);
                }
            }
            Err(e) => {
                // Compiled in and covered by tests; an empty table still works.
                error!(error = %e, "failed to parse embedded pricing table");
            }
        }
        table
    }

    /// Insert a model, replacing any entry with the same id.
    pub fn insert(&mut self, model: ModelSpec) {
        self.models.insert(model.id.clone(), model);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.insert(model);
        self
    }

    pub fn get(&self, model: &str) -> Option<&ModelSpec> {
        self.models.get(model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Raw JSON model table compiled into the binary.
const EMBEDDED_MODELS: &str = include_str!("models.json");
