//! Static descriptions of providers and runtimes.

use serde::{Deserialize, Serialize};

use crate::types::LanguagePair;

/// Identity and language-pair support of a provider.
///
/// An empty `language_pairs` list means every pair is supported, so new
/// pairs work without touching the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    language_pairs: Vec<LanguagePair>,
}

impl ProviderInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            language_pairs: Vec::new(),
        }
    }

    /// Restrict to the given pairs (builder style).
    pub fn with_language_pairs(mut self, pairs: impl IntoIterator<Item = LanguagePair>) -> Self {
        for pair in pairs {
            self.add_language_pair(pair);
        }
        self
    }

    /// Append a supported pair; duplicates are ignored.
    pub fn add_language_pair(&mut self, pair: LanguagePair) {
        if !self.language_pairs.contains(&pair) {
            self.language_pairs.push(pair);
        }
    }

    pub fn language_pairs(&self) -> &[LanguagePair] {
        &self.language_pairs
    }

    pub fn supports_language_pair(&self, pair: &LanguagePair) -> bool {
        self.language_pairs.is_empty() || self.language_pairs.contains(pair)
    }

    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            language_pairs: self.language_pairs.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Serializable view of a provider, pairs rendered as `src-tgt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub language_pairs: Vec<String>,
}

/// What a runtime can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    pub id: String,
    pub display_name: String,
    pub supported_tasks: Vec<String>,
    /// Backend model families, e.g. "chat_completion"; empty for rule-based runtimes.
    pub supported_model_families: Vec<String>,
    /// External requirements, e.g. an API key.
    pub platform_requirements: Vec<String>,
    pub supports_batching: bool,
    pub supports_interactive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_batch_size: Option<usize>,
}

impl RuntimeDescriptor {
    pub fn supports_task(&self, task: &str) -> bool {
        self.supported_tasks.iter().any(|t| t == task)
    }
}
