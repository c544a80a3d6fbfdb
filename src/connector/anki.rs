//! AnkiConnect client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ExistingCard, FlashcardStore, NewNote, UID_FIELD};
use crate::{MimirError, Result};

/// Where AnkiConnect listens by default.
pub const ANKI_CONNECT_URL: &str = "http://localhost:8765";

const API_VERSION: u32 = 6;

/// Notes of one note type in one deck, over the AnkiConnect JSON API.
#[derive(Clone)]
pub struct AnkiConnectClient {
    http: Client,
    url: String,
    deck: String,
    note_type: String,
}

impl AnkiConnectClient {
    pub fn new(deck: impl Into<String>, note_type: impl Into<String>) -> Result<Self> {
        Self::with_url(ANKI_CONNECT_URL, deck, note_type)
    }

    pub fn with_url(
        url: impl Into<String>,
        deck: impl Into<String>,
        note_type: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MimirError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            deck: deck.into(),
            note_type: note_type.into(),
        })
    }

    async fn invoke<P, R>(&self, action: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        debug!(action, "AnkiConnect request");
        let response = self
            .http
            .post(&self.url)
            .json(&Request {
                action,
                version: API_VERSION,
                params,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MimirError::Api {
                status: status.as_u16(),
                message: format!("AnkiConnect returned {status}"),
            });
        }

        let body: Response<R> = response
            .json()
            .await
            .map_err(|e| MimirError::DataError(format!("malformed AnkiConnect body: {e}")))?;
        if let Some(error) = body.error {
            return Err(MimirError::Api {
                status: status.as_u16(),
                message: format!("AnkiConnect error in {action}: {error}"),
            });
        }
        body.result.ok_or_else(|| {
            MimirError::DataError(format!("AnkiConnect {action} returned no result"))
        })
    }

    fn query(&self) -> String {
        format!("\"deck:{}\" \"note:{}\"", self.deck, self.note_type)
    }
}

#[async_trait]
impl FlashcardStore for AnkiConnectClient {
    async fn is_reachable(&self) -> bool {
        match self.invoke::<(), u32>("version", None).await {
            Ok(version) => {
                debug!(version, "AnkiConnect reachable");
                true
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "AnkiConnect not reachable");
                false
            }
        }
    }

    async fn existing_cards(&self) -> Result<Vec<ExistingCard>> {
        let ids: Vec<i64> = self
            .invoke("findNotes", Some(serde_json::json!({ "query": self.query() })))
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let notes: Vec<NoteInfo> = self
            .invoke("notesInfo", Some(serde_json::json!({ "notes": ids })))
            .await?;
        let cards: Vec<ExistingCard> = notes
            .into_iter()
            .filter_map(|note| {
                let fields: std::collections::BTreeMap<String, String> = note
                    .fields
                    .into_iter()
                    .map(|(name, field)| (name, field.value.trim().to_string()))
                    .collect();
                let uid = fields.get(UID_FIELD).filter(|uid| !uid.is_empty())?.clone();
                Some(ExistingCard { uid, fields })
            })
            .collect();
        info!(deck = %self.deck, cards = cards.len(), "fetched existing cards");
        Ok(cards)
    }

    async fn create_notes_batch(&self, notes: &[NewNote]) -> Result<Vec<Option<i64>>> {
        if notes.is_empty() {
            return Ok(Vec::new());
        }
        let payload: Vec<AddNote<'_>> = notes
            .iter()
            .map(|note| AddNote {
                deck_name: &self.deck,
                model_name: &self.note_type,
                fields: &note.fields,
                tags: if note.tags.is_empty() {
                    vec!["mimir"]
                } else {
                    note.tags.iter().map(String::as_str).collect()
                },
            })
            .collect();

        let mut ids: Vec<Option<i64>> = self
            .invoke("addNotes", Some(serde_json::json!({ "notes": payload })))
            .await?;
        if ids.len() < notes.len() {
            warn!(
                expected = notes.len(),
                returned = ids.len(),
                "AnkiConnect returned fewer ids than notes"
            );
        }
        ids.resize(notes.len(), None);
        let created = ids.iter().filter(|id| id.is_some()).count();
        info!(deck = %self.deck, requested = notes.len(), created, "created notes");
        Ok(ids)
    }
}

#[derive(Serialize)]
struct Request<'a, P> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<P>,
}

#[derive(Deserialize)]
struct Response<R> {
    result: Option<R>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct NoteInfo {
    #[serde(default)]
    fields: std::collections::HashMap<String, NoteField>,
}

#[derive(Deserialize)]
struct NoteField {
    #[serde(default)]
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddNote<'a> {
    deck_name: &'a str,
    model_name: &'a str,
    fields: &'a std::collections::BTreeMap<String, String>,
    tags: Vec<&'a str>,
}
