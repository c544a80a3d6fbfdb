//! Rule-based lexical-unit identification from a surface-form lexicon.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::info::RuntimeDescriptor;
use super::traits::Runtime;
use crate::types::{
    BatchCallResult, Confidence, Item, LuiOutput, RuntimeConfig, UsageBreakdown, UsageEstimate,
    UsageScope, now_timestamp,
};
use crate::{MimirError, Result};

/// Morphological facts about one surface form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub lemma: String,
    pub part_of_speech: String,
    #[serde(default)]
    pub aspect: String,
}

/// Looks words up in an in-memory lexicon for one language.
///
/// Words missing from the lexicon are left out of the results, so they
/// surface as per-item failures and can be routed to another provider.
pub struct LexiconRuntime {
    descriptor: RuntimeDescriptor,
    language: String,
    entries: HashMap<String, LexiconEntry>,
}

impl LexiconRuntime {
    pub fn new(language: impl Into<String>) -> Self {
        let language = language.into();
        Self {
            descriptor: RuntimeDescriptor {
                id: format!("lexicon_lui_{language}"),
                display_name: format!("Lexicon LUI Runtime ({language})"),
                supported_tasks: vec!["lui".to_string()],
                supported_model_families: Vec::new(),
                platform_requirements: Vec::new(),
                supports_batching: true,
                supports_interactive: false,
                default_batch_size: None,
            },
            language,
            entries: HashMap::new(),
        }
    }

    /// Load a `{surface: {lemma, part_of_speech, aspect}}` JSON file.
    pub fn from_json_file(language: impl Into<String>, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MimirError::Configuration(format!("failed to read lexicon {}: {e}", path.display()))
        })?;
        let entries: HashMap<String, LexiconEntry> = serde_json::from_str(&content)?;
        let mut runtime = Self::new(language);
        for (surface, entry) in entries {
            runtime.insert(surface, entry);
        }
        debug!(
            language = %runtime.language,
            entries = runtime.entries.len(),
            path = %path.display(),
            "loaded lexicon"
        );
        Ok(runtime)
    }

    pub fn insert(&mut self, surface: impl AsRef<str>, entry: LexiconEntry) {
        self.entries.insert(normalize(surface.as_ref()), entry);
    }

    pub fn with_entry(
        mut self,
        surface: &str,
        lemma: &str,
        part_of_speech: &str,
        aspect: &str,
    ) -> Self {
        self.insert(
            surface,
            LexiconEntry {
                lemma: lemma.to_string(),
                part_of_speech: part_of_speech.to_string(),
                aspect: aspect.to_string(),
            },
        );
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn analyze(&self, item: &Item) -> Option<LuiOutput> {
        let entry = self.entries.get(&normalize(&item.word))?;
        Some(LuiOutput {
            lemma: entry.lemma.clone(),
            part_of_speech: entry.part_of_speech.clone(),
            aspect: entry.aspect.clone(),
            surface_lexical_unit: item.word.clone(),
            unit_type: "lemma".to_string(),
        })
    }
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

#[async_trait]
impl Runtime for LexiconRuntime {
    fn descriptor(&self) -> &RuntimeDescriptor {
        &self.descriptor
    }

    fn validate(&self, config: &RuntimeConfig) -> Result<()> {
        if !config.source_language.eq_ignore_ascii_case(&self.language) {
            return Err(MimirError::Configuration(format!(
                "lexicon is for '{}', not '{}'",
                self.language, config.source_language
            )));
        }
        Ok(())
    }

    fn estimate_usage(
        &self,
        item_count: usize,
        _config: &RuntimeConfig,
    ) -> Result<Option<UsageEstimate>> {
        Ok(Some(UsageEstimate {
            usage: UsageBreakdown {
                scope: UsageScope::items(item_count),
                inputs: Vec::new(),
                outputs: Vec::new(),
                confidence: Confidence::High,
            },
            cost_usd: Some(0.0),
        }))
    }

    async fn run_batch(&self, items: &[Item], _config: &RuntimeConfig) -> BatchCallResult {
        let mut results = HashMap::new();
        for item in items {
            let Some(output) = self.analyze(item) else {
                trace!(uid = %item.uid, word = %item.word, "word not in lexicon");
                continue;
            };
            trace!(uid = %item.uid, lemma = %output.lemma, "lexicon hit");
            match serde_json::to_value(&output) {
                Ok(payload) => {
                    results.insert(item.uid.clone(), payload);
                }
                Err(e) => return BatchCallResult::failure(e.to_string()),
            }
        }
        BatchCallResult::success(results, self.descriptor.id.clone(), now_timestamp())
            .with_cost(Some(0.0))
    }
}
