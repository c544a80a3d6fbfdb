//! Per-call runtime configuration.

use serde::{Deserialize, Serialize};

use super::LanguagePair;

/// Immutable configuration handed to a runtime invocation.
///
/// Built fresh per call with the consuming setters below; nothing mutates
/// it afterwards.
///
/// ```rust
/// # use mimir::RuntimeConfig;
/// let config = RuntimeConfig::new("pl", "en")
///     .model("gpt-5-mini")
///     .batch_size(30);
/// assert_eq!(config.language_pair().to_string(), "pl-en");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub source_language: String,
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
}

impl RuntimeConfig {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
            model_id: None,
            batch_size: None,
            prompt_id: None,
        }
    }

    pub fn model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn prompt(mut self, prompt_id: impl Into<String>) -> Self {
        self.prompt_id = Some(prompt_id.into());
        self
    }

    pub fn language_pair(&self) -> LanguagePair {
        LanguagePair::new(&self.source_language, &self.target_language)
    }
}
