//! Versioned instruction templates for language-model backends.
//!
//! Prompts live on disk as a pair of files per id:
//!
//! ```text
//! <root>/<task>/prompts/<prompt_id>.json           {"id": ..., "version": ..., "runtime_overrides": {...}}
//! <root>/<task>/prompts/<prompt_id>.template.txt   text with {placeholders}
//! ```
//!
//! Each (task, prompt id) pair is versioned on its own, so rewording the
//! Polish LUI prompt never touches the Spanish one. Loaded prompts are
//! memoized for the lifetime of the registry. A missing file is a hard
//! error: a provider without its prompt cannot run at all.

mod defaults;
mod template;

pub use defaults::DefaultPrompts;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::{MimirError, Result};

/// Default capacity of the prompt memo.
const DEFAULT_MAX_PROMPTS: u64 = 256;

/// A loaded prompt: metadata plus its template text.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub task: String,
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    /// Runtime settings the prompt author wants applied (e.g. batch size).
    pub runtime_overrides: serde_json::Map<String, serde_json::Value>,
    pub template: String,
}

impl PromptSpec {
    /// Substitute `{name}` placeholders.
    ///
    /// `{{` and `}}` produce literal braces. A placeholder with no value is
    /// an error rather than silently left in the output.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String> {
        template::render(&self.template, vars).map_err(|e| match e {
            MimirError::InvalidInput(msg) => MimirError::InvalidInput(format!(
                "prompt {}/{}@{}: {msg}",
                self.task, self.id, self.version
            )),
            other => other,
        })
    }

    /// Names of the placeholders the template uses, in order of appearance.
    pub fn placeholders(&self) -> Vec<String> {
        template::placeholders(&self.template)
    }
}

#[derive(Deserialize)]
struct SpecFile {
    id: String,
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    runtime_overrides: serde_json::Map<String, serde_json::Value>,
}

/// Loads and memoizes prompts from a root directory.
///
/// Concurrent first loads of the same prompt are coalesced by the
/// underlying cache, so each file is read once per process.
pub struct PromptRegistry {
    root: PathBuf,
    defaults: DefaultPrompts,
    loaded: moka::sync::Cache<String, Arc<PromptSpec>>,
}

impl PromptRegistry {
    /// Registry over `root` with the built-in default prompt ids.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_defaults(root, DefaultPrompts::builtin())
    }

    pub fn with_defaults(root: impl Into<PathBuf>, defaults: DefaultPrompts) -> Self {
        Self {
            root: root.into(),
            defaults,
            loaded: moka::sync::Cache::new(DEFAULT_MAX_PROMPTS),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn defaults(&self) -> &DefaultPrompts {
        &self.defaults
    }

    /// Load `task/prompt_id`, reading from disk on first use.
    pub fn load(&self, task: &str, prompt_id: &str) -> Result<Arc<PromptSpec>> {
        let key = format!("{task}/{prompt_id}");
        self.loaded
            .try_get_with(key, || {
                read_prompt(&self.root, task, prompt_id).map(Arc::new)
            })
            .map_err(|e| {
                Arc::try_unwrap(e).unwrap_or_else(|shared| MimirError::Configuration(shared.to_string()))
            })
    }

    /// Generic default prompt id for `task`.
    pub fn get_default_prompt_id(&self, task: &str) -> Option<&str> {
        self.defaults.get(task)
    }

    /// Pick the prompt id for a call: explicit id, then the per-language
    /// default, then the task default.
    pub fn resolve_prompt_id(
        &self,
        task: &str,
        explicit: Option<&str>,
        source_language: &str,
    ) -> Result<String> {
        if let Some(id) = explicit {
            return Ok(id.to_string());
        }
        self.defaults
            .for_language(task, source_language)
            .map(str::to_owned)
            .ok_or_else(|| MimirError::NoDefaultPrompt(task.to_string()))
    }

    /// Resolve and load in one step.
    pub fn resolve(
        &self,
        task: &str,
        explicit: Option<&str>,
        source_language: &str,
    ) -> Result<Arc<PromptSpec>> {
        let id = self.resolve_prompt_id(task, explicit, source_language)?;
        self.load(task, &id)
    }
}

fn read_prompt(root: &Path, task: &str, prompt_id: &str) -> Result<PromptSpec> {
    let dir = root.join(task).join("prompts");
    let spec_path = dir.join(format!("{prompt_id}.json"));
    let template_path = dir.join(format!("{prompt_id}.template.txt"));

    let spec_json = read_prompt_file(&spec_path, task, prompt_id)?;
    let template = read_prompt_file(&template_path, task, prompt_id)?;

    let spec: SpecFile = serde_json::from_str(&spec_json).map_err(|e| {
        MimirError::Configuration(format!("invalid prompt spec {spec_path:?}: {e}"))
    })?;
    if spec.id != prompt_id {
        return Err(MimirError::Configuration(format!(
            "prompt spec {spec_path:?} declares id '{}', expected '{prompt_id}'",
            spec.id
        )));
    }

    debug!(task, prompt_id, version = %spec.version, "loaded prompt");
    Ok(PromptSpec {
        task: task.to_string(),
        id: spec.id,
        version: spec.version,
        description: spec.description,
        runtime_overrides: spec.runtime_overrides,
        template,
    })
}

fn read_prompt_file(path: &Path, task: &str, prompt_id: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MimirError::PromptNotFound {
                task: task.to_string(),
                prompt_id: prompt_id.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            MimirError::Configuration(format!("failed to read prompt file {path:?}: {e}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_prompt(root: &Path, task: &str, id: &str, version: &str, template: &str) {
        let dir = root.join(task).join("prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{id}.json")),
            format!(r#"{{"id": "{id}", "version": "{version}", "runtime_overrides": {{"batch_size": 10}}}}"#),
        )
        .unwrap();
        std::fs::write(dir.join(format!("{id}.template.txt")), template).unwrap();
    }

    #[test]
    fn load_reads_spec_and_template() {
        let dir = tempfile::tempdir().unwrap();
        write_prompt(dir.path(), "wsd", "wsd_v1", "1.2", "Items: {items_json}");

        let registry = PromptRegistry::new(dir.path());
        let spec = registry.load("wsd", "wsd_v1").unwrap();
        assert_eq!(spec.version, "1.2");
        assert_eq!(spec.runtime_overrides["batch_size"], 10);
        assert_eq!(spec.placeholders(), vec!["items_json".to_string()]);
    }

    #[test]
    fn load_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        write_prompt(dir.path(), "wsd", "wsd_v1", "1.0", "first");

        let registry = PromptRegistry::new(dir.path());
        let first = registry.load("wsd", "wsd_v1").unwrap();

        write_prompt(dir.path(), "wsd", "wsd_v1", "2.0", "second");
        let second = registry.load("wsd", "wsd_v1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.template, "first");
    }

    #[test]
    fn missing_template_is_prompt_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_prompt(dir.path(), "wsd", "wsd_v1", "1.0", "x");
        std::fs::remove_file(dir.path().join("wsd/prompts/wsd_v1.template.txt")).unwrap();

        let registry = PromptRegistry::new(dir.path());
        let err = registry.load("wsd", "wsd_v1").unwrap_err();
        assert!(matches!(err, MimirError::PromptNotFound { .. }), "{err}");
    }

    #[test]
    fn failed_load_is_not_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PromptRegistry::new(dir.path());
        assert!(registry.load("hint", "hint_v1").is_err());

        write_prompt(dir.path(), "hint", "hint_v1", "1.0", "ok");
        assert!(registry.load("hint", "hint_v1").is_ok());
    }

    #[test]
    fn mismatched_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_prompt(dir.path(), "lui", "lui_v1", "1.0", "x");
        std::fs::rename(
            dir.path().join("lui/prompts/lui_v1.json"),
            dir.path().join("lui/prompts/lui_v2.json"),
        )
        .unwrap();
        std::fs::write(dir.path().join("lui/prompts/lui_v2.template.txt"), "x").unwrap();

        let registry = PromptRegistry::new(dir.path());
        let err = registry.load("lui", "lui_v2").unwrap_err();
        assert!(err.to_string().contains("declares id 'lui_v1'"));
    }

    #[test]
    fn resolve_prompt_id_order() {
        let registry = PromptRegistry::new("unused");
        assert_eq!(
            registry.resolve_prompt_id("lui", Some("custom"), "pl").unwrap(),
            "custom"
        );
        assert_eq!(registry.resolve_prompt_id("lui", None, "pl").unwrap(), "lui_pl_v1");
        assert_eq!(registry.resolve_prompt_id("lui", None, "de").unwrap(), "lui_v1");
        assert!(matches!(
            registry.resolve_prompt_id("etymology", None, "pl"),
            Err(MimirError::NoDefaultPrompt(_))
        ));
    }
}
