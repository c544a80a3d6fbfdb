//! Adapter turning any [`Runtime`] into a [`Provider`].

use std::sync::Arc;

use async_trait::async_trait;

use super::info::ProviderInfo;
use super::traits::{Provider, Runtime};
use crate::Result;
use crate::cache::Provenance;
use crate::types::{BatchCallResult, Item, RuntimeConfig, UsageEstimate};

/// A provider whose work is done by a runtime.
///
/// ```rust
/// # use std::sync::Arc;
/// # use mimir::providers::{LexiconRuntime, Provider, ProviderInfo, RuntimeProvider};
/// # use mimir::LanguagePair;
/// let info = ProviderInfo::new("lexicon_lui", "Lexicon", "rule-based lemmatizer")
///     .with_language_pairs([LanguagePair::new("pl", "en")]);
/// let provider = RuntimeProvider::new(info, Arc::new(LexiconRuntime::new("pl")));
/// assert!(!provider.supports_language_pair(&LanguagePair::new("es", "en")));
/// ```
pub struct RuntimeProvider {
    info: ProviderInfo,
    runtime: Arc<dyn Runtime>,
    max_concurrency: usize,
}

impl RuntimeProvider {
    pub fn new(info: ProviderInfo, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            info,
            runtime,
            max_concurrency: 1,
        }
    }

    /// Allow this many concurrent batches. Only for runtimes whose backend
    /// client is safe to share (e.g. a pooled HTTP client).
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Mutable access to the info, e.g. to add a supported pair before
    /// the provider is shared.
    pub fn info_mut(&mut self) -> &mut ProviderInfo {
        &mut self.info
    }
}

#[async_trait]
impl Provider for RuntimeProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn default_batch_size(&self) -> Option<usize> {
        self.runtime.descriptor().default_batch_size
    }

    fn supports_batching(&self) -> bool {
        self.runtime.descriptor().supports_batching
    }

    fn validate(&self, config: &RuntimeConfig) -> Result<()> {
        self.runtime.validate(config)
    }

    fn estimate_usage(
        &self,
        item_count: usize,
        config: &RuntimeConfig,
    ) -> Result<Option<UsageEstimate>> {
        self.runtime.estimate_usage(item_count, config)
    }

    fn provenance(&self, config: &RuntimeConfig) -> Provenance {
        self.runtime.provenance(config)
    }

    async fn process(&self, items: &[Item], config: &RuntimeConfig) -> BatchCallResult {
        self.runtime.run_batch(items, config).await
    }
}
