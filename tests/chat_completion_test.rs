//! Chat-completion runtime against a wiremock OpenAI-compatible server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mimir::cache::{CacheNamespace, CacheStore};
use mimir::pricing::TokenEstimator;
use mimir::prompts::PromptRegistry;
use mimir::providers::{
    ChatCompletionRuntime, ChatPlatforms, OpenAiCompatiblePlatform, ProviderInfo, RetryConfig,
    Runtime, RuntimeProvider,
};
use mimir::{
    CancellationToken, Confidence, Item, LanguagePair, MimirError, Orchestrator, RuntimeConfig,
    TaskRequest,
};

const MODEL: &str = "gpt-5-mini";

fn prompts() -> Arc<PromptRegistry> {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts");
    Arc::new(PromptRegistry::new(root))
}

fn runtime(server: &MockServer, retry: RetryConfig) -> ChatCompletionRuntime {
    let platform =
        OpenAiCompatiblePlatform::with_base_url("openai", "test-key", server.uri()).unwrap();
    ChatCompletionRuntime::new(
        "lui",
        prompts(),
        ChatPlatforms::new().with(Arc::new(platform)),
        TokenEstimator::default(),
    )
    .with_retry(retry)
}

fn config() -> RuntimeConfig {
    RuntimeConfig::new("pl", "en").model(MODEL)
}

fn items() -> Vec<Item> {
    vec![
        Item::new("u1", "kota", "Widzę kota na dachu."),
        Item::new("u2", "czytałem", "Wczoraj czytałem książkę."),
    ]
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

const KOT: &str = r#"{"lemma": "kot", "part_of_speech": "noun", "surface_lexical_unit": "kota", "unit_type": "lemma"}"#;

const REPLY: &str = r#"```json
{
  "u1": {"lemma": "kot", "part_of_speech": "noun", "aspect": "", "surface_lexical_unit": "kota", "unit_type": "lemma"},
  "u2": {"lemma": "czytać", "part_of_speech": "verb", "aspect": "impf", "surface_lexical_unit": "czytałem", "unit_type": "lemma"}
}
```"#;

#[tokio::test]
async fn batch_is_sent_as_one_prompt_and_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": MODEL })))
        .respond_with(completion(REPLY))
        .expect(1)
        .mount(&server)
        .await;

    let result = runtime(&server, RetryConfig::disabled())
        .run_batch(&items(), &config())
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results["u2"]["lemma"], "czytać");
    assert_eq!(result.model_id.as_deref(), Some(MODEL));
    assert!(result.timestamp.is_some());
    assert!(result.cost_usd.unwrap() > 0.0);
}

#[tokio::test]
async fn prompt_carries_items_and_language_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("{}"))
        .mount(&server)
        .await;

    runtime(&server, RetryConfig::disabled())
        .run_batch(&items(), &config())
        .await;

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert_eq!(body["messages"][0]["role"], "user");
    assert!(prompt.contains("Polish"));
    assert!(prompt.contains("\"uid\": \"u1\""));
    assert!(prompt.contains("Wczoraj czytałem książkę."));
    assert!(!prompt.contains("{items_json}"));
}

#[tokio::test]
async fn unparsable_reply_is_a_failed_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("Sorry, I cannot help with that."))
        .mount(&server)
        .await;

    let result = runtime(&server, RetryConfig::disabled())
        .run_batch(&items(), &config())
        .await;

    assert!(!result.success);
    assert!(result.results.is_empty());
    assert!(result.error.unwrap().starts_with("JSON parse error"));
}

#[tokio::test]
async fn unknown_uids_and_non_objects_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(&format!(
            r#"{{"u1": {KOT}, "u2": "oops", "zz": {KOT}}}"#
        )))
        .mount(&server)
        .await;

    let result = runtime(&server, RetryConfig::disabled())
        .run_batch(&items(), &config())
        .await;

    assert!(result.success);
    assert_eq!(result.results.len(), 1);
    assert!(result.results.contains_key("u1"));
}

#[tokio::test]
async fn server_error_becomes_failure_not_panic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let result = runtime(&server, RetryConfig::disabled())
        .run_batch(&items(), &config())
        .await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("500"), "{error}");
    assert!(error.contains("upstream exploded"), "{error}");
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(completion(REPLY))
        .mount(&server)
        .await;

    let retry = RetryConfig::new()
        .max_attempts(2)
        .initial_delay(Duration::from_millis(5));
    let result = runtime(&server, retry).run_batch(&items(), &config()).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = runtime(&server, RetryConfig::new().initial_delay(Duration::from_millis(5)))
        .run_batch(&items(), &config())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("authentication failed"));
}

#[tokio::test]
async fn validate_requires_model_and_prompt() {
    let server = MockServer::start().await;
    let runtime = runtime(&server, RetryConfig::disabled());

    assert!(runtime.validate(&config()).is_ok());
    assert!(matches!(
        runtime.validate(&RuntimeConfig::new("pl", "en")),
        Err(MimirError::Configuration(_))
    ));
    assert!(matches!(
        runtime.validate(&config().prompt("lui_v99")),
        Err(MimirError::PromptNotFound { .. })
    ));
}

#[tokio::test]
async fn estimate_scales_with_items_and_batches() {
    let server = MockServer::start().await;
    let runtime = runtime(&server, RetryConfig::disabled());

    let small = runtime
        .estimate_usage(10, &config().batch_size(10))
        .unwrap()
        .unwrap();
    let large = runtime
        .estimate_usage(40, &config().batch_size(10))
        .unwrap()
        .unwrap();

    assert_eq!(small.usage.confidence, Confidence::Medium);
    assert_eq!(small.usage.scope.count, 10);
    let small_in = small.usage.input(mimir::types::UsageUnit::Tokens).unwrap();
    let large_in = large.usage.input(mimir::types::UsageUnit::Tokens).unwrap();
    assert!(small_in > 10 * 125);
    // Four batches carry the instructions four times.
    assert_eq!(large_in - 40 * 125, 4 * (small_in - 10 * 125));
    assert_eq!(
        large.usage.output(mimir::types::UsageUnit::Tokens),
        Some(40 * 40)
    );
    assert!(large.cost_usd.unwrap() > small.cost_usd.unwrap());
}

#[tokio::test]
async fn orchestrated_run_caches_llm_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(REPLY))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RuntimeProvider::new(
        ProviderInfo::new("chat_completion_lui", "Chat Completion LUI", "LLM-backed LUI"),
        Arc::new(runtime(&server, RetryConfig::disabled())),
    );
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::builder()
        .cache_dir(dir.path())
        .provider("lui", Arc::new(provider))
        .build()
        .unwrap();
    let request = TaskRequest::new("lui", items(), config());

    let first = orchestrator.run(&request, &CancellationToken::new()).await.unwrap();
    let second = orchestrator.run(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(first.summary.succeeded, 2);
    assert!(first.summary.cost_usd.unwrap() > 0.0);
    assert_eq!(second.summary.cached, 2);
    assert!(second.summary.cost_usd.is_none());
    assert!(
        dir.path()
            .join("lui_cache_pl-en_chat_completion_lui.json")
            .exists()
    );
}

#[tokio::test]
async fn payloads_missing_schema_fields_fail_and_stay_uncached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(
            r#"{"u1": {}, "u2": {"lemma": "czytać", "part_of_speech": "verb"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RuntimeProvider::new(
        ProviderInfo::new("chat_completion_lui", "Chat Completion LUI", "LLM-backed LUI"),
        Arc::new(runtime(&server, RetryConfig::disabled())),
    );
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::builder()
        .cache_dir(dir.path())
        .provider("lui", Arc::new(provider))
        .retry_failed_passes(0)
        .build()
        .unwrap();

    let report = orchestrator
        .run(&TaskRequest::new("lui", items(), config()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.outcomes[0].is_success());
    assert!(!report.outcomes[1].is_success());
    assert_eq!(report.summary.failed, 2);

    let cache = CacheStore::open(
        dir.path(),
        &CacheNamespace::for_task("lui", &LanguagePair::new("pl", "en"), "chat_completion_lui"),
    );
    assert!(cache.is_empty());
}

#[tokio::test]
async fn changing_model_or_prompt_recomputes_cached_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(REPLY))
        .expect(3)
        .mount(&server)
        .await;

    let provider = RuntimeProvider::new(
        ProviderInfo::new("chat_completion_lui", "Chat Completion LUI", "LLM-backed LUI"),
        Arc::new(runtime(&server, RetryConfig::disabled())),
    );
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::builder()
        .cache_dir(dir.path())
        .provider("lui", Arc::new(provider))
        .build()
        .unwrap();
    let run = |config: RuntimeConfig| {
        let request = TaskRequest::new("lui", items(), config);
        let orchestrator = &orchestrator;
        async move { orchestrator.run(&request, &CancellationToken::new()).await.unwrap() }
    };

    assert_eq!(run(config()).await.summary.cached, 0);
    assert_eq!(run(config()).await.summary.cached, 2);
    assert_eq!(run(config().model("gpt-5")).await.summary.cached, 0);
    assert_eq!(run(config().prompt("lui_v1")).await.summary.cached, 0);

    let cache = CacheStore::open(
        dir.path(),
        &CacheNamespace::for_task("lui", &LanguagePair::new("pl", "en"), "chat_completion_lui"),
    );
    let entry = cache.entry("u1").unwrap();
    assert_eq!(entry.model_used.as_deref(), Some(MODEL));
    assert_eq!(entry.prompt_id.as_deref(), Some("lui_v1"));
}
