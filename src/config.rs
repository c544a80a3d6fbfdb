//! Configuration loading for the `mimir` binary.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.mimir/config.toml` (user)
//! 3. `/etc/mimir/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.mimir/secrets.toml` (user, must be 0600)
//! 2. `/etc/mimir/secrets.toml` (system, must be 0600)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::default_cache_dir;
use crate::orchestrator::{DEFAULT_MAX_CONCURRENT_BATCHES, DEFAULT_RETRY_FAILED_PASSES};
use crate::providers::DEFAULT_TIMEOUT;
use crate::{MimirError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(default)]
    pub lexicon: Option<LexiconConfig>,
    /// Per-task defaults, keyed by task name.
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Cache directory (default: the platform cache dir + `mimir`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    /// Root of the `<task>/prompts/` tree (default: `prompts`).
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
        }
    }
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Batches in flight at once (default: 4).
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    /// Optional input-token ceiling per batch.
    #[serde(default)]
    pub batch_token_budget: Option<usize>,
    /// Extra passes over failed items within one run (default: 1).
    #[serde(default = "default_retry_failed_passes")]
    pub retry_failed_passes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batches: default_max_concurrent_batches(),
            batch_token_budget: None,
            retry_failed_passes: default_retry_failed_passes(),
        }
    }
}

fn default_max_concurrent_batches() -> usize {
    DEFAULT_MAX_CONCURRENT_BATCHES
}

fn default_retry_failed_passes() -> usize {
    DEFAULT_RETRY_FAILED_PASSES
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformsConfig {
    #[serde(default)]
    pub openai: Option<PlatformConfig>,
    #[serde(default)]
    pub grok: Option<PlatformConfig>,
    #[serde(default)]
    pub deepl: Option<PlatformConfig>,
}

/// Endpoint overrides for one backend.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Rule-based LUI from a lexicon file.
#[derive(Debug, Clone, Deserialize)]
pub struct LexiconConfig {
    pub path: PathBuf,
    pub language: String,
    /// Pairs like `"pl-en"`; empty means every pair.
    #[serde(default)]
    pub language_pairs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
    #[serde(default)]
    pub grok: Option<ApiKeySecret>,
    #[serde(default)]
    pub deepl: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Platform name → environment variable name mapping.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("grok", "XAI_API_KEY"),
    ("deepl", "DEEPL_API_KEY"),
];

impl Config {
    /// Load configuration from the standard locations, or defaults when no
    /// file exists. An explicit path must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MimirError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MimirError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MimirError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mimir").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/mimir/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn task(&self, task: &str) -> Option<&TaskConfig> {
        self.tasks.get(task)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".mimir").join("secrets.toml");
            if user_secrets.exists() {
                return Self::from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/mimir/secrets.toml");
        if system_secrets.exists() {
            return Self::from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file after checking its permissions.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            MimirError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MimirError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MimirError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(MimirError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a platform, falling back to its environment variable.
    pub fn api_key(&self, platform: &str) -> Option<String> {
        let from_file = match platform {
            "openai" => self.openai.as_ref(),
            "grok" => self.grok.as_ref(),
            "deepl" => self.deepl.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            PROVIDER_ENV_VARS
                .iter()
                .find(|(name, _)| *name == platform)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
                .filter(|key| !key.trim().is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.prompts.dir, PathBuf::from("prompts"));
        assert_eq!(config.orchestrator.max_concurrent_batches, 4);
        assert!(config.orchestrator.batch_token_budget.is_none());
        assert_eq!(config.orchestrator.retry_failed_passes, 1);
        assert!(config.lexicon.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [cache]
            dir = "/var/cache/mimir"

            [orchestrator]
            max_concurrent_batches = 2
            batch_token_budget = 8000
            retry_failed_passes = 0

            [platforms.openai]
            timeout_secs = 60

            [platforms.deepl]
            base_url = "http://localhost:9999/v2"

            [lexicon]
            path = "lexicon/pl.json"
            language = "pl"
            language_pairs = ["pl-en"]

            [tasks.lui]
            model = "gpt-5-mini"
            batch_size = 20

            [tasks.translation]
            provider = "deepl_translation"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache_dir(), PathBuf::from("/var/cache/mimir"));
        assert_eq!(config.orchestrator.max_concurrent_batches, 2);
        assert_eq!(config.orchestrator.batch_token_budget, Some(8000));
        assert_eq!(config.orchestrator.retry_failed_passes, 0);
        assert_eq!(config.platforms.openai.as_ref().unwrap().timeout_secs, 60);
        assert!(config.platforms.openai.as_ref().unwrap().base_url.is_none());
        assert_eq!(
            config.platforms.deepl.as_ref().unwrap().timeout_secs,
            120
        );
        assert_eq!(config.lexicon.as_ref().unwrap().language_pairs, ["pl-en"]);
        assert_eq!(config.task("lui").unwrap().batch_size, Some(20));
        assert_eq!(
            config.task("translation").unwrap().provider.as_deref(),
            Some("deepl_translation")
        );
        assert!(config.task("hint").is_none());
    }

    #[test]
    fn api_key_from_secrets() {
        let secrets = Secrets {
            deepl: Some(ApiKeySecret {
                api_key: "from-file:fx".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(secrets.api_key("deepl"), Some("from-file:fx".to_string()));
        assert_eq!(secrets.api_key("unknown"), None);
    }
}
