//! Exact token counting keyed by encoding name.
//!
//! Models in the pricing table name the encoding they tokenize with
//! (`o200k_base`, `cl100k_base`). With the `exact-tokenizers` feature the
//! registry maps those encodings to HuggingFace tokenizer repositories and
//! loads them lazily on first use. Without it, only tokenizers registered in
//! code are available and the estimator falls back to character ratios.

#[cfg(feature = "exact-tokenizers")]
mod hf;

#[cfg(feature = "exact-tokenizers")]
pub use hf::HfTokenizer;

use std::collections::{HashMap, HashSet};
#[cfg(feature = "exact-tokenizers")]
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::{MimirError, Result};

/// Trait for tokenizer implementations.
pub trait TokenizerProvider: Send + Sync {
    /// Count tokens in the given text.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Source for a tokenizer model.
#[cfg(feature = "exact-tokenizers")]
#[derive(Debug, Clone)]
pub enum TokenizerSource {
    /// Load from HuggingFace Hub repository.
    HuggingFace { repo_id: String },
    /// Load from local file path.
    Local { path: PathBuf },
    /// Alias to another encoding's tokenizer.
    Alias { target: String },
}

/// Registry mapping encoding names to tokenizers.
///
/// Loaded tokenizers are cached for the process lifetime. A load that fails
/// is remembered too, so a missing tokenizer costs one warning rather than
/// one hub request per call.
pub struct TokenizerRegistry {
    tokenizers: RwLock<HashMap<String, Arc<dyn TokenizerProvider>>>,
    failed: RwLock<HashSet<String>>,
    #[cfg(feature = "exact-tokenizers")]
    sources: HashMap<String, TokenizerSource>,
}

impl TokenizerRegistry {
    /// Registry with the default encoding → tokenizer mappings.
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "exact-tokenizers")]
        {
            registry.register_source(
                "o200k_base",
                TokenizerSource::HuggingFace {
                    repo_id: "Xenova/gpt-4o".to_string(),
                },
            );
            registry.register_source(
                "cl100k_base",
                TokenizerSource::HuggingFace {
                    repo_id: "Xenova/gpt-4".to_string(),
                },
            );
        }

        registry
    }

    /// Registry with no mappings at all; every lookup falls back.
    pub fn empty() -> Self {
        Self {
            tokenizers: RwLock::new(HashMap::new()),
            failed: RwLock::new(HashSet::new()),
            #[cfg(feature = "exact-tokenizers")]
            sources: HashMap::new(),
        }
    }

    /// Register (or override) where an encoding's tokenizer is loaded from.
    #[cfg(feature = "exact-tokenizers")]
    pub fn register_source(&mut self, encoding: impl Into<String>, source: TokenizerSource) {
        self.sources.insert(encoding.into(), source);
    }

    /// Register an already-constructed tokenizer for an encoding.
    pub fn register_provider(&self, encoding: impl Into<String>, provider: Arc<dyn TokenizerProvider>) {
        let encoding = encoding.into();
        self.failed.write().remove(&encoding);
        self.tokenizers.write().insert(encoding, provider);
    }

    /// Count tokens for `text` under `encoding`.
    pub fn count_tokens(&self, text: &str, encoding: &str) -> Result<usize> {
        self.get_or_load(encoding)?.count_tokens(text)
    }

    fn get_or_load(&self, encoding: &str) -> Result<Arc<dyn TokenizerProvider>> {
        // Fast path: already loaded
        if let Some(provider) = self.tokenizers.read().get(encoding) {
            return Ok(Arc::clone(provider));
        }
        if self.failed.read().contains(encoding) {
            return Err(MimirError::Configuration(format!(
                "tokenizer for {encoding} unavailable"
            )));
        }

        // Slow path: need to load
        let provider = match self.load(encoding) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(encoding, error = %e, "tokenizer unavailable, using character ratio");
                self.failed.write().insert(encoding.to_string());
                return Err(e);
            }
        };

        let mut cache = self.tokenizers.write();
        // Double-check after acquiring write lock
        if let Some(existing) = cache.get(encoding) {
            return Ok(Arc::clone(existing));
        }
        cache.insert(encoding.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    #[cfg(feature = "exact-tokenizers")]
    fn load(&self, encoding: &str) -> Result<Arc<dyn TokenizerProvider>> {
        let tokenizer = match self.resolve_source(encoding, 0)? {
            TokenizerSource::HuggingFace { repo_id } => HfTokenizer::from_hub(encoding, &repo_id)?,
            TokenizerSource::Local { path } => HfTokenizer::from_file(encoding, &path)?,
            TokenizerSource::Alias { target } => {
                return Err(MimirError::Configuration(format!(
                    "unresolved tokenizer alias: {target}"
                )));
            }
        };
        Ok(Arc::new(tokenizer))
    }

    #[cfg(not(feature = "exact-tokenizers"))]
    fn load(&self, encoding: &str) -> Result<Arc<dyn TokenizerProvider>> {
        Err(MimirError::Configuration(format!(
            "no tokenizer registered for {encoding} (exact-tokenizers feature disabled)"
        )))
    }

    /// Follow aliases to a loadable source.
    #[cfg(feature = "exact-tokenizers")]
    fn resolve_source(&self, encoding: &str, depth: usize) -> Result<TokenizerSource> {
        if depth > 8 {
            return Err(MimirError::Configuration(format!(
                "tokenizer alias cycle at {encoding}"
            )));
        }
        match self.sources.get(encoding) {
            Some(TokenizerSource::Alias { target }) => self.resolve_source(target, depth + 1),
            Some(source) => Ok(source.clone()),
            None => Err(MimirError::Configuration(format!(
                "no tokenizer configured for encoding: {encoding}"
            ))),
        }
    }
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
