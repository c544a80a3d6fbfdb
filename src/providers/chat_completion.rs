//! LLM-backed runtime for any prompt-driven task.
//!
//! One batch becomes one prompt: the items are rendered as a JSON array
//! into the task's template, the platform serving the configured model
//! completes it, and the reply is parsed as a JSON object keyed by UID.
//! For the built-in tasks each per-UID payload must match the task's
//! output schema ([`TaskKind::check_output`]); anything else is dropped and
//! surfaces as a per-item failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::info::RuntimeDescriptor;
use super::platform::ChatPlatforms;
use super::retry::{RetryConfig, with_retry};
use super::traits::Runtime;
use crate::cache::Provenance;
use crate::languages::english_name;
use crate::pricing::{TokenEstimator, format_cost};
use crate::prompts::{PromptRegistry, PromptSpec};
use crate::telemetry;
use crate::types::{
    BatchCallResult, Confidence, Item, RuntimeConfig, TaskKind, UsageBreakdown, UsageEstimate,
    now_timestamp,
};
use crate::{MimirError, Result};

/// Default items per batch for chat-completion calls.
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// Planning figure for the input tokens one item adds to a prompt.
const INPUT_TOKENS_PER_ITEM: u64 = 125;

/// Prompt-driven runtime over a chat-completion platform.
pub struct ChatCompletionRuntime {
    descriptor: RuntimeDescriptor,
    task: String,
    /// Output schema; `None` for custom tasks, which only need an object.
    schema: Option<TaskKind>,
    prompts: Arc<PromptRegistry>,
    platforms: ChatPlatforms,
    estimator: TokenEstimator,
    retry: RetryConfig,
}

impl ChatCompletionRuntime {
    pub fn new(
        task: impl Into<String>,
        prompts: Arc<PromptRegistry>,
        platforms: ChatPlatforms,
        estimator: TokenEstimator,
    ) -> Self {
        let task = task.into();
        let descriptor = RuntimeDescriptor {
            id: format!("chat_completion_{task}"),
            display_name: format!("Chat Completion {} Runtime", task.to_uppercase()),
            supported_tasks: vec![task.clone()],
            supported_model_families: vec!["chat_completion".to_string()],
            platform_requirements: vec!["api_key".to_string()],
            supports_batching: true,
            supports_interactive: false,
            default_batch_size: Some(DEFAULT_BATCH_SIZE),
        };
        Self {
            descriptor,
            schema: task.parse().ok(),
            task,
            prompts,
            platforms,
            estimator,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn model<'a>(&self, config: &'a RuntimeConfig) -> Result<&'a str> {
        config.model_id.as_deref().ok_or_else(|| {
            MimirError::Configuration(format!("task '{}' needs a model id", self.task))
        })
    }

    fn prompt(&self, config: &RuntimeConfig) -> Result<Arc<PromptSpec>> {
        self.prompts.resolve(
            &self.task,
            config.prompt_id.as_deref(),
            &config.source_language,
        )
    }

    fn render(&self, prompt: &PromptSpec, items_json: &str, config: &RuntimeConfig) -> Result<String> {
        prompt.render(&[
            ("items_json", items_json),
            ("source_language_name", english_name(&config.source_language)),
            ("target_language_name", english_name(&config.target_language)),
            ("source_language_code", &config.source_language),
            ("target_language_code", &config.target_language),
        ])
    }

    /// Everything `run_batch` needs before talking to the backend.
    fn prepare(&self, items: &[Item], config: &RuntimeConfig) -> Result<String> {
        let prompt = self.prompt(config)?;
        let payload: Vec<serde_json::Value> = items.iter().map(Item::to_json).collect();
        let items_json = serde_json::to_string_pretty(&payload)?;
        self.render(&prompt, &items_json, config)
    }

    fn record_tokens(model: &str, input: usize, output: usize, cost: Option<f64>) {
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "model" => model.to_owned(),
            "direction" => "input",
        )
        .increment(input as u64);
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "model" => model.to_owned(),
            "direction" => "output",
        )
        .increment(output as u64);
        if let Some(usd) = cost {
            metrics::histogram!(telemetry::BATCH_COST_USD, "model" => model.to_owned()).record(usd);
        }
    }
}

#[async_trait]
impl Runtime for ChatCompletionRuntime {
    fn descriptor(&self) -> &RuntimeDescriptor {
        &self.descriptor
    }

    fn validate(&self, config: &RuntimeConfig) -> Result<()> {
        let model = self.model(config)?;
        self.platforms.resolve(model, self.estimator.pricing())?;
        let prompt = self.prompt(config)?;
        self.render(&prompt, "[]", config)?;
        Ok(())
    }

    fn estimate_usage(
        &self,
        item_count: usize,
        config: &RuntimeConfig,
    ) -> Result<Option<UsageEstimate>> {
        let model = self.model(config)?;
        let prompt = self.prompt(config)?;
        let instructions = self.render(&prompt, "placeholder", config)?;
        let instruction_tokens = self.estimator.count_tokens(&instructions, model) as u64;

        let batch_size = config
            .batch_size
            .or(self.descriptor.default_batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .max(1);
        let batches = item_count.div_ceil(batch_size) as u64;

        let input = batches * instruction_tokens + INPUT_TOKENS_PER_ITEM * item_count as u64;
        let output = self.estimator.estimate_output_tokens(model, item_count) as u64;
        let usage = UsageBreakdown::tokens(item_count, input, output, Confidence::Medium);
        let cost_usd = self
            .estimator
            .pricing_policy(model)
            .and_then(|policy| policy.cost(&usage));

        Ok(Some(UsageEstimate { usage, cost_usd }))
    }

    fn provenance(&self, config: &RuntimeConfig) -> Provenance {
        let prompt_id = self
            .prompts
            .resolve_prompt_id(
                &self.task,
                config.prompt_id.as_deref(),
                &config.source_language,
            )
            .ok();
        Provenance::new(config.model_id.clone(), prompt_id)
    }

    async fn run_batch(&self, items: &[Item], config: &RuntimeConfig) -> BatchCallResult {
        let timestamp = now_timestamp();
        let model = match self.model(config) {
            Ok(model) => model,
            Err(e) => return BatchCallResult::failure(e.to_string()),
        };
        let platform = match self.platforms.resolve(model, self.estimator.pricing()) {
            Ok(platform) => platform,
            Err(e) => return BatchCallResult::failure(e.to_string()),
        };
        let prompt = match self.prepare(items, config) {
            Ok(prompt) => prompt,
            Err(e) => return BatchCallResult::failure(e.to_string()),
        };

        let input_tokens = self.estimator.count_tokens(&prompt, model);
        let estimated_output = self.estimator.estimate_output_tokens(model, items.len());
        info!(
            task = %self.task,
            model,
            items = items.len(),
            input_tokens,
            output_tokens = estimated_output,
            cost = %format_cost(self.estimator.token_cost(model, input_tokens, estimated_output)),
            "dispatching batch"
        );
        debug!(task = %self.task, prompt = %prompt, "full prompt");

        let start = Instant::now();
        let response = match with_retry(&self.retry, platform.id(), "complete", || {
            platform.complete(model, &prompt)
        })
        .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(task = %self.task, model, error = %e, "batch call failed");
                return BatchCallResult::failure(e.to_string());
            }
        };

        let output_tokens = self.estimator.count_tokens(&response, model);
        let cost = self.estimator.token_cost(model, input_tokens, output_tokens);
        Self::record_tokens(model, input_tokens, output_tokens, cost);
        info!(
            task = %self.task,
            model,
            elapsed_s = start.elapsed().as_secs_f64(),
            input_tokens,
            output_tokens,
            cost = %format_cost(cost),
            "batch completed"
        );
        debug!(task = %self.task, response = %response, "full response");

        match parse_results(&response, items, self.schema) {
            Ok(results) => BatchCallResult::success(results, model, timestamp).with_cost(cost),
            Err(e) => {
                let preview: String = response.chars().take(500).collect();
                error!(task = %self.task, model, error = %e, "failed to parse response");
                debug!(task = %self.task, preview = %preview, "raw response preview");
                let message = match e {
                    MimirError::Json(inner) => format!("JSON parse error: {inner}"),
                    other => other.to_string(),
                };
                BatchCallResult {
                    model_id: Some(model.to_string()),
                    timestamp: Some(timestamp),
                    ..BatchCallResult::failure(message)
                }
                .with_cost(cost)
            }
        }
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a reply into per-UID payloads for the UIDs in `items`.
///
/// Unknown UIDs, non-object values and payloads that fail `schema` are
/// dropped with a warning; they surface as per-item failures downstream.
fn parse_results(
    text: &str,
    items: &[Item],
    schema: Option<TaskKind>,
) -> Result<HashMap<String, serde_json::Value>> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))?;
    let serde_json::Value::Object(object) = value else {
        return Err(MimirError::DataError(
            "expected a JSON object keyed by UID".to_string(),
        ));
    };

    let wanted: HashSet<&str> = items.iter().map(|item| item.uid.as_str()).collect();
    let mut results = HashMap::with_capacity(object.len());
    for (uid, payload) in object {
        if !wanted.contains(uid.as_str()) {
            warn!(uid = %uid, "response contains a UID that was not requested");
            continue;
        }
        if !payload.is_object() {
            warn!(uid = %uid, "result is not a JSON object, dropping");
            continue;
        }
        if let Some(task) = schema
            && let Err(e) = task.check_output(&payload)
        {
            warn!(uid = %uid, task = %task, error = %e, "result does not match task schema, dropping");
            continue;
        }
        results.insert(uid, payload);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  \n"), "{}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn parse_keeps_only_requested_objects() {
        let items = vec![
            Item::new("a", "kot", "Widzę kota."),
            Item::new("b", "dom", "Mój dom."),
        ];
        let reply = r#"```json
        {"a": {"lemma": "kot"}, "b": "not an object", "z": {"lemma": "zebra"}}
        ```"#;
        let results = parse_results(reply, &items, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results["a"]["lemma"], "kot");
    }

    #[test]
    fn parse_rejects_non_object_reply() {
        let items = vec![Item::new("a", "kot", "")];
        assert!(matches!(
            parse_results("[1, 2]", &items, None),
            Err(MimirError::DataError(_))
        ));
        assert!(matches!(
            parse_results("not json", &items, Some(TaskKind::Lui)),
            Err(MimirError::Json(_))
        ));
    }

    #[test]
    fn parse_drops_payloads_that_miss_the_schema() {
        let items = vec![
            Item::new("a", "kot", "Widzę kota."),
            Item::new("b", "dom", "Mój dom."),
            Item::new("c", "pies", "Pies szczeka."),
        ];
        let reply = r#"{
            "a": {"translation": "I see a cat."},
            "b": {},
            "c": {"translation": ["The dog barks."]}
        }"#;
        let results = parse_results(reply, &items, Some(TaskKind::Translation)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results["a"]["translation"], "I see a cat.");

        let untyped = parse_results(reply, &items, None).unwrap();
        assert_eq!(untyped.len(), 3);
    }
}
