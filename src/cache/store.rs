//! Persistent per-namespace result cache.
//!
//! One JSON file per namespace (`{cache_name}_{suffix}.json`) maps item UIDs
//! to the payload a provider produced for them, plus provenance:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "uid-1": { "payload": { ... }, "model_used": "gpt-5-mini", "timestamp": "..." }
//!   }
//! }
//! ```
//!
//! A bare `{ uid: entry }` map is accepted on load, and entries may spell the
//! payload field `data`. Entries that do not have a payload field are kept on
//! disk untouched but read back as absent.
//!
//! Entries remember the model and prompt that produced them. A lookup under
//! a different [`Provenance`] is a miss; fields either side leaves unset
//! match anything, so entries written without provenance stay valid.
//!
//! Every mutation rewrites the whole file (tmp + rename) while holding the
//! store's lock. Writers only serialize when they share one `CacheStore`,
//! so open each file once per process and share the handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::LanguagePair;
use crate::{MimirError, Result};

/// Maximum supported cache file format version.
const MAX_SUPPORTED_VERSION: u32 = 1;

/// Identifies one cache file inside a cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheNamespace {
    pub cache_name: String,
    pub suffix: String,
}

impl CacheNamespace {
    pub fn new(cache_name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            suffix: suffix.into(),
        }
    }

    /// Namespace used by the orchestrator: `{task}_cache_{src}-{tgt}_{provider}.json`.
    pub fn for_task(task: &str, pair: &LanguagePair, provider_id: &str) -> Self {
        Self::new(format!("{task}_cache"), format!("{pair}_{provider_id}"))
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.cache_name, self.suffix)
    }
}

/// Model and prompt a result is produced with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub model: Option<String>,
    pub prompt_id: Option<String>,
}

impl Provenance {
    pub fn new(model: Option<String>, prompt_id: Option<String>) -> Self {
        Self { model, prompt_id }
    }
}

/// One cached result with provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl CacheEntry {
    pub fn new(
        payload: serde_json::Value,
        model_used: Option<String>,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            payload,
            model_used,
            prompt_id: None,
            timestamp,
        }
    }

    pub fn with_prompt_id(mut self, prompt_id: Option<String>) -> Self {
        self.prompt_id = prompt_id;
        self
    }

    /// Whether this entry may serve a request made under `wanted`.
    pub fn matches(&self, wanted: &Provenance) -> bool {
        fn agree(stored: Option<&str>, wanted: Option<&str>) -> bool {
            match (stored, wanted) {
                (Some(stored), Some(wanted)) => stored == wanted,
                _ => true,
            }
        }
        agree(self.model_used.as_deref(), wanted.model.as_deref())
            && agree(self.prompt_id.as_deref(), wanted.prompt_id.as_deref())
    }

    /// Interpret a stored value. `None` unless it is an object with a payload.
    fn from_stored(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let payload = object.get("payload").or_else(|| object.get("data"))?;
        let text = |key: &str| object.get(key).and_then(|v| v.as_str()).map(str::to_owned);
        Some(Self {
            payload: payload.clone(),
            model_used: text("model_used"),
            prompt_id: text("prompt_id"),
            timestamp: text("timestamp"),
        })
    }
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct StoreFile {
    version: u32,
    entries: BTreeMap<String, serde_json::Value>,
}

/// Accept both the versioned layout and a bare uid → entry map.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStore {
    Versioned(StoreFile),
    Legacy(BTreeMap<String, serde_json::Value>),
}

fn parse_store(json: &str) -> Result<BTreeMap<String, serde_json::Value>> {
    match serde_json::from_str::<RawStore>(json)? {
        RawStore::Versioned(file) => {
            if file.version > MAX_SUPPORTED_VERSION {
                return Err(MimirError::DataError(format!(
                    "unsupported cache version {} (max supported: {MAX_SUPPORTED_VERSION})",
                    file.version
                )));
            }
            Ok(file.entries)
        }
        RawStore::Legacy(entries) => Ok(entries),
    }
}

/// File-backed UID → result store for one namespace.
///
/// ```rust
/// # use mimir::cache::{CacheNamespace, CacheStore};
/// # let dir = tempfile::tempdir().unwrap();
/// let ns = CacheNamespace::new("lui_cache", "pl-en_llm");
/// let store = CacheStore::open(dir.path(), &ns);
/// store.set("uid-1", serde_json::json!({"lemma": "kot"}), Some("gpt-5".into()), None).unwrap();
/// assert_eq!(store.get("uid-1").unwrap()["lemma"], "kot");
/// ```
pub struct CacheStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl CacheStore {
    /// Open the namespace's file under `dir`.
    ///
    /// Never fails: a missing file is an empty store, and so is a corrupt one
    /// (with a warning). The directory is created on first write.
    pub fn open(dir: &Path, namespace: &CacheNamespace) -> Self {
        let path = dir.join(namespace.file_name());
        let entries = load_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "opened result cache");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached payload for `uid`, if a well-formed entry exists.
    pub fn get(&self, uid: &str) -> Option<serde_json::Value> {
        self.entry(uid).map(|entry| entry.payload)
    }

    /// Full entry (payload and provenance) for `uid`.
    pub fn entry(&self, uid: &str) -> Option<CacheEntry> {
        self.entries.lock().get(uid).and_then(CacheEntry::from_stored)
    }

    /// Entry for `uid` if it was produced under a matching provenance.
    pub fn lookup(&self, uid: &str, wanted: &Provenance) -> Option<CacheEntry> {
        self.entry(uid).filter(|entry| entry.matches(wanted))
    }

    /// Replace the entry for `uid` and persist the whole store.
    pub fn set(
        &self,
        uid: impl Into<String>,
        payload: serde_json::Value,
        model_used: Option<String>,
        timestamp: Option<String>,
    ) -> Result<()> {
        self.set_many([(uid.into(), CacheEntry::new(payload, model_used, timestamp))])
    }

    /// Replace several entries and persist once.
    pub fn set_many(&self, entries: impl IntoIterator<Item = (String, CacheEntry)>) -> Result<()> {
        let mut guard = self.entries.lock();
        for (uid, entry) in entries {
            guard.insert(uid, serde_json::to_value(entry)?);
        }
        save_entries(&self.path, &guard)
    }

    /// Number of stored entries, well-formed or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, serde_json::Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read result cache, starting empty");
            return BTreeMap::new();
        }
    };
    match parse_store(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt result cache, starting empty");
            BTreeMap::new()
        }
    }
}

fn save_entries(path: &Path, entries: &BTreeMap<String, serde_json::Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MimirError::DataError(format!(
                "failed to create cache dir {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&StoreFileRef {
        version: MAX_SUPPORTED_VERSION,
        entries,
    })?;
    std::fs::write(&tmp_path, json).map_err(|e| {
        MimirError::DataError(format!(
            "failed to write cache file {}: {e}",
            tmp_path.display()
        ))
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        MimirError::DataError(format!(
            "failed to rename cache file {} → {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn namespace_file_name() {
        let ns = CacheNamespace::for_task("lui", &LanguagePair::new("pl", "en"), "lexicon");
        assert_eq!(ns.file_name(), "lui_cache_pl-en_lexicon.json");
    }

    #[test]
    fn parse_versioned_and_legacy() {
        let versioned = r#"{"version": 1, "entries": {"a": {"payload": 1}}}"#;
        assert!(parse_store(versioned).unwrap().contains_key("a"));

        let legacy = r#"{"a": {"data": {"lemma": "x"}, "timestamp": "t"}}"#;
        assert!(parse_store(legacy).unwrap().contains_key("a"));
    }

    #[test]
    fn parse_rejects_future_version() {
        assert!(parse_store(r#"{"version": 9, "entries": {}}"#).is_err());
    }

    #[test]
    fn stored_entry_requires_payload_field() {
        assert!(CacheEntry::from_stored(&json!({"payload": null})).is_some());
        assert_eq!(
            CacheEntry::from_stored(&json!({"data": "x", "model_used": "m"}))
                .unwrap()
                .model_used
                .as_deref(),
            Some("m")
        );
        assert!(CacheEntry::from_stored(&json!({"timestamp": "t"})).is_none());
        assert!(CacheEntry::from_stored(&json!("bare string")).is_none());
    }

    #[test]
    fn provenance_mismatch_is_a_miss() {
        let entry = CacheEntry::new(json!({}), Some("gpt-5-mini".into()), None)
            .with_prompt_id(Some("lui_pl_v1".into()));
        let wanted = |model: Option<&str>, prompt: Option<&str>| {
            Provenance::new(model.map(str::to_owned), prompt.map(str::to_owned))
        };

        assert!(entry.matches(&wanted(Some("gpt-5-mini"), Some("lui_pl_v1"))));
        assert!(entry.matches(&Provenance::default()));
        assert!(entry.matches(&wanted(None, Some("lui_pl_v1"))));
        assert!(!entry.matches(&wanted(Some("gpt-5"), Some("lui_pl_v1"))));
        assert!(!entry.matches(&wanted(Some("gpt-5-mini"), Some("lui_v1"))));

        let legacy = CacheEntry::new(json!({}), None, None);
        assert!(legacy.matches(&wanted(Some("gpt-5"), Some("lui_v1"))));
    }

    #[test]
    fn set_writes_versioned_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path(), &CacheNamespace::new("wsd_cache", "es-en"));
        store
            .set("u1", json!({"definition": "house"}), Some("gpt-5".into()), Some("ts".into()))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["entries"]["u1"]["payload"]["definition"], "house");
        assert_eq!(raw["entries"]["u1"]["model_used"], "gpt-5");
        assert!(!store.path().with_extension("json.tmp").exists());
    }
}
