//! Caching subsystem.
//!
//! [`CacheStore`] persists per-item results keyed by the caller's stable
//! UID, one file per [`CacheNamespace`] (task, language pair and provider),
//! so that re-running a task never pays twice for the same item.

mod store;

pub use store::{CacheEntry, CacheNamespace, CacheStore, Provenance};

use std::path::PathBuf;

/// Default cache directory: `~/.cache/mimir`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("mimir")
}
