//! Flashcard store connector.
//!
//! The orchestrator never depends on this module; it is where enriched
//! items end up. [`FlashcardStore`] is the narrow interface, and
//! [`AnkiConnectClient`] talks to a running Anki through the AnkiConnect
//! add-on.

mod anki;

pub use anki::{ANKI_CONNECT_URL, AnkiConnectClient};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{ItemOutcome, OutcomeStatus};

/// Field holding the item UID on every note.
pub const UID_FIELD: &str = "UID";

/// A note already present in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingCard {
    pub uid: String,
    pub fields: BTreeMap<String, String>,
}

/// A note to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub uid: String,
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn new(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        let mut fields = BTreeMap::new();
        fields.insert(UID_FIELD.to_string(), uid.clone());
        Self {
            uid,
            fields,
            tags: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Note built from a successful outcome's payload.
    ///
    /// Scalar payload values become fields; nested values are skipped.
    /// `None` for failed or cancelled outcomes.
    pub fn from_outcome(outcome: &ItemOutcome) -> Option<Self> {
        let object = outcome.payload()?.as_object()?;
        let mut note = Self::new(&outcome.uid);
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            note.fields.insert(key.clone(), text);
        }
        Some(note)
    }
}

/// A store that holds flashcards keyed by item UID.
#[async_trait]
pub trait FlashcardStore: Send + Sync {
    async fn is_reachable(&self) -> bool;

    async fn existing_cards(&self) -> Result<Vec<ExistingCard>>;

    /// Create notes. The result has one entry per input note, in order;
    /// `None` marks a note the store did not create.
    async fn create_notes_batch(&self, notes: &[NewNote]) -> Result<Vec<Option<i64>>>;
}

/// Per-note outcomes for a `create_notes_batch` call.
///
/// Partial creation is normal: each null id becomes a failure for that note
/// only.
pub fn creation_outcomes(notes: &[NewNote], ids: &[Option<i64>]) -> Vec<ItemOutcome> {
    notes
        .iter()
        .enumerate()
        .map(|(i, note)| {
            let status = match ids.get(i).copied().flatten() {
                Some(id) => OutcomeStatus::Success {
                    payload: serde_json::json!({ "note_id": id }),
                    model_used: None,
                    from_cache: false,
                },
                None => OutcomeStatus::Failed {
                    reason: "note was not created".to_string(),
                },
            };
            ItemOutcome {
                uid: note.uid.clone(),
                status,
            }
        })
        .collect()
}
