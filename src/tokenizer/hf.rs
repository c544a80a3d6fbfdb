//! Exact counts from `tokenizer.json` files published on the HuggingFace Hub.
//!
//! Downloads land in `<cache dir>/tokenizers`, next to the result caches,
//! so a machine that has counted an encoding once can count it offline.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::ApiBuilder;
use tracing::debug;

use super::TokenizerProvider;
use crate::cache::default_cache_dir;
use crate::{MimirError, Result};

const TOKENIZER_FILE: &str = "tokenizer.json";

/// A loaded `tokenizers` model for one encoding.
pub struct HfTokenizer {
    encoding: String,
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Fetch `tokenizer.json` from `repo_id`, reusing an earlier download.
    pub fn from_hub(encoding: &str, repo_id: &str) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_cache_dir(download_dir())
            .with_progress(false)
            .build()
            .map_err(|e| {
                MimirError::Configuration(format!("tokenizer hub client for {encoding}: {e}"))
            })?;
        let path = api.model(repo_id.to_string()).get(TOKENIZER_FILE).map_err(|e| {
            MimirError::Configuration(format!(
                "{encoding}: cannot fetch {TOKENIZER_FILE} from {repo_id}: {e}"
            ))
        })?;
        debug!(encoding, repo_id, path = %path.display(), "tokenizer available");
        Self::from_file(encoding, &path)
    }

    /// Load a `tokenizer.json` already on disk.
    pub fn from_file(encoding: &str, path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            MimirError::Configuration(format!("{encoding}: unreadable tokenizer {path:?}: {e}"))
        })?;
        Ok(Self {
            encoding: encoding.to_string(),
            inner,
        })
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

fn download_dir() -> PathBuf {
    default_cache_dir().join("tokenizers")
}

impl TokenizerProvider for HfTokenizer {
    /// Prompts are sent as-is, so special tokens are not added.
    fn count_tokens(&self, text: &str) -> Result<usize> {
        self.inner
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| MimirError::DataError(format!("{}: cannot tokenize: {e}", self.encoding)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let err = HfTokenizer::from_file("o200k_base", &dir.path().join(TOKENIZER_FILE))
            .err()
            .unwrap();
        assert!(matches!(err, MimirError::Configuration(_)));
        assert!(err.to_string().contains("o200k_base"), "{err}");
    }

    #[test]
    fn downloads_share_the_cache_root() {
        assert!(download_dir().starts_with(default_cache_dir()));
        assert!(download_dir().ends_with("tokenizers"));
    }
}
