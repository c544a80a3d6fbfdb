//! Provider registry: task → providers, with per-task defaults.
//!
//! Providers are stored per task in registration order. Selection resolves
//! to exactly one provider or fails; there is no fallback to a second
//! provider when the chosen one fails at runtime.
//!
//! # Selection
//!
//! ```text
//! requested id ──► or task default ──► provider with that id?
//!                                        │ no  → NoProvider
//!                                        │ yes → supports pair?
//!                                        │         no  → UnsupportedLanguagePair
//!                                        ▼
//!                                      selected
//! neither set ──► first registered provider supporting the pair, else NoProvider
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::info::ProviderSummary;
use super::traits::Provider;
use crate::types::LanguagePair;
use crate::{MimirError, Result};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Vec<Arc<dyn Provider>>>,
    defaults: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for `task`. A provider with the same id replaces
    /// the earlier one in place.
    pub fn register(&mut self, task: impl Into<String>, provider: Arc<dyn Provider>) {
        let list = self.providers.entry(task.into()).or_default();
        match list.iter_mut().find(|p| p.id() == provider.id()) {
            Some(slot) => *slot = provider,
            None => list.push(provider),
        }
    }

    /// Use `provider_id` for `task` when the caller does not ask for one.
    pub fn set_default(&mut self, task: impl Into<String>, provider_id: impl Into<String>) {
        self.defaults.insert(task.into(), provider_id.into());
    }

    pub fn default_for(&self, task: &str) -> Option<&str> {
        self.defaults.get(task).map(String::as_str)
    }

    /// Providers registered for `task`, in registration order.
    pub fn providers(&self, task: &str) -> &[Arc<dyn Provider>] {
        self.providers.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks with at least one provider.
    pub fn tasks(&self) -> Vec<&str> {
        let mut tasks: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        tasks.sort_unstable();
        tasks
    }

    pub fn is_empty(&self) -> bool {
        self.providers.values().all(Vec::is_empty)
    }

    /// Pick the provider for one invocation.
    #[instrument(skip(self), fields(pair = %pair))]
    pub fn select(
        &self,
        task: &str,
        requested: Option<&str>,
        pair: &LanguagePair,
    ) -> Result<Arc<dyn Provider>> {
        let candidates = self.providers(task);
        let no_provider = || MimirError::NoProvider {
            task: task.to_string(),
            pair: pair.clone(),
        };

        let wanted = requested.or_else(|| self.default_for(task));
        let selected = match wanted {
            Some(id) => {
                let provider = candidates
                    .iter()
                    .find(|p| p.id() == id)
                    .ok_or_else(no_provider)?;
                if !provider.supports_language_pair(pair) {
                    return Err(MimirError::UnsupportedLanguagePair {
                        provider: id.to_string(),
                        pair: pair.clone(),
                    });
                }
                provider
            }
            None => candidates
                .iter()
                .find(|p| p.supports_language_pair(pair))
                .ok_or_else(no_provider)?,
        };

        debug!(provider = selected.id(), "selected provider");
        Ok(Arc::clone(selected))
    }

    /// Serializable listing of the providers for `task`.
    pub fn describe(&self, task: &str) -> Vec<ProviderSummary> {
        self.providers(task)
            .iter()
            .map(|p| p.info().summary())
            .collect()
    }
}
