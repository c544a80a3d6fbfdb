//! Default prompt ids per task and language.

use std::collections::HashMap;

/// Task → default prompt id, with explicit per-language overrides.
///
/// Language defaults are enumerated rather than derived from naming
/// conventions: supporting a new language means adding an entry here, not
/// touching dispatch code.
#[derive(Debug, Clone, Default)]
pub struct DefaultPrompts {
    generic: HashMap<String, String>,
    by_language: HashMap<(String, String), String>,
}

impl DefaultPrompts {
    /// No defaults at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for the prompts shipped under `prompts/`.
    pub fn builtin() -> Self {
        Self::new()
            .with_default("lui", "lui_v1")
            .with_language_default("lui", "pl", "lui_pl_v1")
            .with_language_default("lui", "es", "lui_es_v1")
            .with_default("wsd", "wsd_v1")
            .with_default("translation", "translation_v1")
            .with_default("hint", "hint_v1")
            .with_default("cloze_scoring", "cloze_scoring_v1")
            .with_default("usage_level", "usage_level_v1")
            .with_default("collocation", "collocation_v1")
    }

    pub fn with_default(mut self, task: impl Into<String>, prompt_id: impl Into<String>) -> Self {
        self.generic.insert(task.into(), prompt_id.into());
        self
    }

    pub fn with_language_default(
        mut self,
        task: impl Into<String>,
        language: impl Into<String>,
        prompt_id: impl Into<String>,
    ) -> Self {
        self.by_language
            .insert((task.into(), language.into()), prompt_id.into());
        self
    }

    /// Generic default for `task`.
    pub fn get(&self, task: &str) -> Option<&str> {
        self.generic.get(task).map(String::as_str)
    }

    /// Language-specific default for `task`, falling back to the generic one.
    pub fn for_language(&self, task: &str, language: &str) -> Option<&str> {
        self.by_language
            .get(&(task.to_string(), language.to_string()))
            .map(String::as_str)
            .or_else(|| self.get(task))
    }
}
