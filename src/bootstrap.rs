//! Wire an [`Orchestrator`] from [`Config`] and [`Secrets`].
//!
//! - chat-completion providers for every task, when an OpenAI or Grok key exists
//! - DeepL translation, when a DeepL key exists
//! - the lexicon LUI provider, when `[lexicon]` is configured

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Config, PlatformConfig, Secrets};
use crate::orchestrator::Orchestrator;
use crate::pricing::TokenEstimator;
use crate::prompts::PromptRegistry;
use crate::providers::platform::{GROK_BASE_URL, OPENAI_BASE_URL};
use crate::providers::{
    ChatCompletionRuntime, ChatPlatforms, DEFAULT_TIMEOUT, DeepLRuntime, LexiconRuntime,
    OpenAiCompatiblePlatform, ProviderInfo, RuntimeProvider,
};
use crate::types::{LanguagePair, TaskKind};
use crate::Result;

/// Provider id of the DeepL translation provider.
pub const DEEPL_PROVIDER_ID: &str = "deepl_translation";

/// Provider id of the lexicon LUI provider.
pub const LEXICON_PROVIDER_ID: &str = "lexicon_lui";

/// Provider id of the chat-completion provider for `task`.
pub fn chat_provider_id(task: TaskKind) -> String {
    format!("chat_completion_{task}")
}

fn timeout(platform: Option<&PlatformConfig>) -> Duration {
    platform
        .map(|p| Duration::from_secs(p.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT)
}

fn chat_platform(
    id: &str,
    key: String,
    default_url: &str,
    platform: Option<&PlatformConfig>,
) -> Result<OpenAiCompatiblePlatform> {
    let base_url = platform
        .and_then(|p| p.base_url.clone())
        .unwrap_or_else(|| default_url.to_string());
    OpenAiCompatiblePlatform::with_timeout(id, key, base_url, timeout(platform))
}

/// Build the orchestrator the binary runs.
pub fn build_orchestrator(config: &Config, secrets: &Secrets) -> Result<Orchestrator> {
    let estimator = TokenEstimator::default();
    let prompts = Arc::new(PromptRegistry::new(&config.prompts.dir));
    let concurrency = config.orchestrator.max_concurrent_batches;

    let mut builder = Orchestrator::builder()
        .cache_dir(config.cache_dir())
        .prompts(prompts.clone())
        .estimator(estimator.clone())
        .max_concurrent_batches(concurrency)
        .retry_failed_passes(config.orchestrator.retry_failed_passes);
    if let Some(budget) = config.orchestrator.batch_token_budget {
        builder = builder.batch_token_budget(budget);
    }

    let mut platforms = ChatPlatforms::new();
    if let Some(key) = secrets.api_key("openai") {
        let platform = chat_platform("openai", key, OPENAI_BASE_URL, config.platforms.openai.as_ref())?;
        platforms.register(Arc::new(platform));
    }
    if let Some(key) = secrets.api_key("grok") {
        let platform = chat_platform("grok", key, GROK_BASE_URL, config.platforms.grok.as_ref())?;
        platforms.register(Arc::new(platform));
    }

    if !platforms.is_empty() {
        for task in TaskKind::ALL {
            let runtime = ChatCompletionRuntime::new(
                task.as_str(),
                prompts.clone(),
                platforms.clone(),
                estimator.clone(),
            );
            let info = ProviderInfo::new(
                chat_provider_id(task),
                format!("Chat Completion {}", task.as_str().to_uppercase()),
                format!("LLM-backed {task} over a chat-completion API"),
            );
            // Pooled HTTP client; safe to share across batches.
            let provider = RuntimeProvider::new(info, Arc::new(runtime))
                .with_max_concurrency(concurrency);
            builder = builder.provider(task.as_str(), Arc::new(provider));
            debug!(task = %task, "registered chat completion provider");
        }
    }

    if let Some(key) = secrets.api_key("deepl") {
        let runtime = match config.platforms.deepl.as_ref() {
            Some(PlatformConfig {
                base_url: Some(url),
                timeout_secs,
            }) => DeepLRuntime::with_base_url(key, url.clone(), Duration::from_secs(*timeout_secs))?,
            _ => DeepLRuntime::new(key)?,
        };
        let info = ProviderInfo::new(DEEPL_PROVIDER_ID, "DeepL", "DeepL translation API");
        let provider =
            RuntimeProvider::new(info, Arc::new(runtime)).with_max_concurrency(concurrency);
        builder = builder.provider(TaskKind::Translation.as_str(), Arc::new(provider));
        debug!("registered DeepL provider");
    }

    if let Some(lexicon) = &config.lexicon {
        let runtime = LexiconRuntime::from_json_file(&lexicon.language, &lexicon.path)?;
        let pairs = lexicon
            .language_pairs
            .iter()
            .map(|pair| pair.parse::<LanguagePair>())
            .collect::<Result<Vec<_>>>()?;
        let info = ProviderInfo::new(LEXICON_PROVIDER_ID, "Lexicon", "rule-based lemmatizer")
            .with_language_pairs(pairs);
        builder = builder.provider(
            TaskKind::Lui.as_str(),
            Arc::new(RuntimeProvider::new(info, Arc::new(runtime))),
        );
        debug!(language = %lexicon.language, "registered lexicon provider");
    }

    for (task, task_config) in &config.tasks {
        if let Some(provider) = &task_config.provider {
            builder = builder.default_provider(task.clone(), provider.clone());
        }
    }

    let orchestrator = builder.build()?;
    info!(
        tasks = ?orchestrator.registry().tasks(),
        cache_dir = %orchestrator.cache_dir().display(),
        "orchestrator ready"
    );
    Ok(orchestrator)
}
