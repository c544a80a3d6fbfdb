//! Builder for configuring orchestrator instances.

use std::path::PathBuf;
use std::sync::Arc;

use super::Orchestrator;
use crate::cache::default_cache_dir;
use crate::pricing::TokenEstimator;
use crate::prompts::PromptRegistry;
use crate::providers::{Provider, ProviderRegistry};
use crate::{MimirError, Result};

/// Default number of batches in flight at once.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

/// Default number of extra passes over items that failed.
pub const DEFAULT_RETRY_FAILED_PASSES: usize = 1;

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    cache_dir: Option<PathBuf>,
    prompts: Option<Arc<PromptRegistry>>,
    estimator: Option<TokenEstimator>,
    max_concurrent_batches: usize,
    batch_token_budget: Option<usize>,
    retry_failed_passes: usize,
    registry: ProviderRegistry,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            cache_dir: None,
            prompts: None,
            estimator: None,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
            batch_token_budget: None,
            retry_failed_passes: DEFAULT_RETRY_FAILED_PASSES,
            registry: ProviderRegistry::new(),
        }
    }

    /// Directory holding the per-namespace cache files.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Prompt registry shared with the prompt-driven runtimes.
    pub fn prompts(mut self, prompts: Arc<PromptRegistry>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Estimator used for batch token budgets.
    pub fn estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Upper bound on batches in flight; the provider's own limit also applies.
    pub fn max_concurrent_batches(mut self, n: usize) -> Self {
        self.max_concurrent_batches = n.max(1);
        self
    }

    /// Close batches before their estimated input exceeds `tokens`.
    pub fn batch_token_budget(mut self, tokens: usize) -> Self {
        self.batch_token_budget = Some(tokens);
        self
    }

    /// Re-dispatch failed items up to `passes` more times. Zero reports
    /// failures after the first attempt.
    pub fn retry_failed_passes(mut self, passes: usize) -> Self {
        self.retry_failed_passes = passes;
        self
    }

    /// Register `provider` for `task`.
    pub fn provider(mut self, task: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.registry.register(task, provider);
        self
    }

    /// Use `provider_id` for `task` when a request names none.
    pub fn default_provider(
        mut self,
        task: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        self.registry.set_default(task, provider_id);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        if self.registry.is_empty() {
            return Err(MimirError::Configuration(
                "no provider registered for any task".to_string(),
            ));
        }

        Ok(Orchestrator {
            registry: self.registry,
            cache_dir: self.cache_dir.unwrap_or_else(default_cache_dir),
            prompts: self
                .prompts
                .unwrap_or_else(|| Arc::new(PromptRegistry::new("prompts"))),
            estimator: self.estimator.unwrap_or_default(),
            max_concurrent_batches: self.max_concurrent_batches,
            batch_token_budget: self.batch_token_budget,
            retry_failed_passes: self.retry_failed_passes,
            stores: moka::sync::Cache::builder().build(),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
