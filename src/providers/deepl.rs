//! DeepL translation runtime.
//!
//! Translates each item's sentence in one `/translate` request per batch.
//! DeepL bills per source character, so usage is measured in characters.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::http::{DEFAULT_TIMEOUT, build_client, check_status};
use super::info::RuntimeDescriptor;
use super::retry::{RetryConfig, with_retry};
use super::traits::Runtime;
use crate::pricing::{DEEPL_COST_PER_1M_CHARS, PricingPolicy, format_cost};
use crate::telemetry;
use crate::types::{
    BatchCallResult, Confidence, Item, RuntimeConfig, TranslationOutput, UsageBreakdown,
    UsageDimension, UsageEstimate, UsageScope, now_timestamp,
};
use crate::{MimirError, Result};

/// Endpoint for free-tier keys (suffix `:fx`).
pub const DEEPL_FREE_BASE_URL: &str = "https://api-free.deepl.com/v2";

/// Endpoint for paid keys.
pub const DEEPL_PRO_BASE_URL: &str = "https://api.deepl.com/v2";

/// DeepL accepts up to 50 texts per request.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Planning figure for the length of one sentence.
const ESTIMATED_CHARS_PER_ITEM: u64 = 50;

const MODEL_ID: &str = "deepl";

pub struct DeepLRuntime {
    descriptor: RuntimeDescriptor,
    api_key: String,
    http: Client,
    base_url: String,
    retry: RetryConfig,
}

impl DeepLRuntime {
    /// Runtime at the endpoint matching the key's tier.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let base_url = if api_key.ends_with(":fx") {
            DEEPL_FREE_BASE_URL
        } else {
            DEEPL_PRO_BASE_URL
        };
        Self::with_base_url(api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            descriptor: RuntimeDescriptor {
                id: "deepl_translation".to_string(),
                display_name: "DeepL Translation Runtime".to_string(),
                supported_tasks: vec!["translation".to_string()],
                supported_model_families: Vec::new(),
                platform_requirements: vec!["api_key".to_string()],
                supports_batching: true,
                supports_interactive: false,
                default_batch_size: Some(DEFAULT_BATCH_SIZE),
            },
            api_key: api_key.into(),
            http: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn policy() -> PricingPolicy {
        PricingPolicy::PerCharacter {
            per_1m: DEEPL_COST_PER_1M_CHARS,
        }
    }

    async fn translate(&self, texts: &[&str], config: &RuntimeConfig) -> Result<Vec<String>> {
        let response = self
            .http
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&TranslateRequest {
                text: texts,
                source_lang: config.source_language.to_uppercase(),
                target_lang: config.target_language.to_uppercase(),
            })
            .send()
            .await?;

        let response = check_status(response, "DeepL").await?;
        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| MimirError::DataError(format!("malformed DeepL body: {e}")))?;
        Ok(body.translations.into_iter().map(|t| t.text).collect())
    }
}

/// The text DeepL translates for an item: its sentence, or the bare word.
fn source_text(item: &Item) -> &str {
    if item.sentence.trim().is_empty() {
        &item.word
    } else {
        &item.sentence
    }
}

fn character_usage(items: usize, chars: u64, confidence: Confidence) -> UsageBreakdown {
    UsageBreakdown {
        scope: UsageScope::items(items),
        inputs: vec![UsageDimension::characters(chars)],
        outputs: Vec::new(),
        confidence,
    }
}

#[async_trait]
impl Runtime for DeepLRuntime {
    fn descriptor(&self) -> &RuntimeDescriptor {
        &self.descriptor
    }

    fn validate(&self, _config: &RuntimeConfig) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(MimirError::Configuration("DeepL API key missing".to_string()));
        }
        Ok(())
    }

    fn estimate_usage(
        &self,
        item_count: usize,
        _config: &RuntimeConfig,
    ) -> Result<Option<UsageEstimate>> {
        let usage = character_usage(
            item_count,
            ESTIMATED_CHARS_PER_ITEM * item_count as u64,
            Confidence::Medium,
        );
        let cost_usd = Self::policy().cost(&usage);
        Ok(Some(UsageEstimate { usage, cost_usd }))
    }

    async fn run_batch(&self, items: &[Item], config: &RuntimeConfig) -> BatchCallResult {
        let timestamp = now_timestamp();
        let texts: Vec<&str> = items.iter().map(source_text).collect();
        let chars: u64 = texts.iter().map(|t| t.chars().count() as u64).sum();
        let cost = Self::policy().cost(&character_usage(items.len(), chars, Confidence::High));
        info!(
            items = items.len(),
            chars,
            cost = %format_cost(cost),
            "dispatching DeepL batch"
        );

        let start = Instant::now();
        let translations = match with_retry(&self.retry, "deepl", "translate", || {
            self.translate(&texts, config)
        })
        .await
        {
            Ok(translations) => translations,
            Err(e) => {
                error!(items = items.len(), error = %e, "DeepL batch failed");
                return BatchCallResult::failure(e.to_string());
            }
        };
        info!(elapsed_s = start.elapsed().as_secs_f64(), "DeepL batch completed");
        if let Some(usd) = cost {
            metrics::histogram!(telemetry::BATCH_COST_USD, "model" => MODEL_ID).record(usd);
        }

        let returned = translations.len();
        let results: HashMap<String, serde_json::Value> = items
            .iter()
            .zip(translations)
            .filter_map(|(item, translation)| {
                serde_json::to_value(TranslationOutput { translation })
                    .ok()
                    .map(|payload| (item.uid.clone(), payload))
            })
            .collect();

        if returned != items.len() {
            let message = format!(
                "DeepL returned {returned} translations for {} texts",
                items.len()
            );
            return BatchCallResult::partial(results, MODEL_ID, timestamp, message).with_cost(cost);
        }
        BatchCallResult::success(results, MODEL_ID, timestamp).with_cost(cost)
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a [&'a str],
    source_lang: String,
    target_lang: String,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}
