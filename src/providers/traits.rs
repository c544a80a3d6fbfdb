//! Provider and runtime traits.
//!
//! A [`Provider`] is one way of doing one task (say, lexical-unit
//! identification through an LLM, or through a lexicon). It advertises who
//! it is, which language pairs it handles, and processes a batch of items
//! into a single [`BatchCallResult`].
//!
//! A [`Runtime`] is the execution strategy behind a provider: it knows how
//! to talk to a backend, how large its batches may be and what a call is
//! likely to cost. [`RuntimeProvider`](super::RuntimeProvider) glues the two
//! together so most concrete providers are a runtime plus a [`ProviderInfo`].
//!
//! # Error boundary
//!
//! `process` and `run_batch` do not return `Result`. Anything that goes
//! wrong while talking to a backend (transport error, non-2xx status,
//! malformed body) is folded into a failed `BatchCallResult`, so the
//! orchestrator can report it per item. Errors that make a whole run
//! pointless (no model configured, prompt missing) surface earlier through
//! `validate`.

use async_trait::async_trait;

use super::info::{ProviderInfo, RuntimeDescriptor};
use crate::Result;
use crate::cache::Provenance;
use crate::types::{BatchCallResult, Item, LanguagePair, RuntimeConfig, UsageEstimate};

/// A task-specific backend capability.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identity and declared language-pair support.
    fn info(&self) -> &ProviderInfo;

    /// Provider id, unique within a task.
    fn id(&self) -> &str {
        &self.info().id
    }

    /// Whether this provider handles `pair`. Vacuously true when the
    /// provider declares no restriction.
    fn supports_language_pair(&self, pair: &LanguagePair) -> bool {
        self.info().supports_language_pair(pair)
    }

    /// How many batches may be in flight on this instance at once.
    ///
    /// Defaults to one: providers are not assumed to be safe for
    /// concurrent calls unless they say so.
    fn max_concurrency(&self) -> usize {
        1
    }

    /// Preferred batch size when the caller does not set one.
    fn default_batch_size(&self) -> Option<usize> {
        None
    }

    /// Whether items can be sent together. When false, every batch holds
    /// exactly one item.
    fn supports_batching(&self) -> bool {
        true
    }

    /// Check that `config` is complete enough to run, before any dispatch.
    fn validate(&self, _config: &RuntimeConfig) -> Result<()> {
        Ok(())
    }

    /// Pre-call usage and cost for `item_count` items. `None` when the
    /// provider has nothing meaningful to report.
    fn estimate_usage(
        &self,
        _item_count: usize,
        _config: &RuntimeConfig,
    ) -> Result<Option<UsageEstimate>> {
        Ok(None)
    }

    /// Model and prompt this provider answers with under `config`. Cached
    /// results recorded under a different model or prompt are recomputed.
    fn provenance(&self, _config: &RuntimeConfig) -> Provenance {
        Provenance::default()
    }

    /// Process one batch.
    async fn process(&self, items: &[Item], config: &RuntimeConfig) -> BatchCallResult;
}

/// Execution strategy behind a provider.
#[async_trait]
pub trait Runtime: Send + Sync {
    fn descriptor(&self) -> &RuntimeDescriptor;

    fn validate(&self, _config: &RuntimeConfig) -> Result<()> {
        Ok(())
    }

    fn estimate_usage(
        &self,
        _item_count: usize,
        _config: &RuntimeConfig,
    ) -> Result<Option<UsageEstimate>> {
        Ok(None)
    }

    fn provenance(&self, _config: &RuntimeConfig) -> Provenance {
        Provenance::default()
    }

    async fn run_batch(&self, items: &[Item], config: &RuntimeConfig) -> BatchCallResult;
}
