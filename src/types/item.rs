//! Work items and language pairs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MimirError;

/// An ordered (source, target) language-code pair.
///
/// Equality is exact on both codes; no case folding or region stripping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

impl FromStr for LanguagePair {
    type Err = MimirError;

    /// Parse the `src-tgt` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((source, target)) if !source.is_empty() && !target.is_empty() => {
                Ok(Self::new(source, target))
            }
            _ => Err(MimirError::InvalidInput(format!(
                "expected a language pair like 'pl-en', got '{s}'"
            ))),
        }
    }
}

/// One vocabulary item to enrich.
///
/// The `uid` is assigned by the caller and must be stable across runs: it is
/// the cache key. Task-specific inputs beyond the surface word and its
/// sentence (e.g. `lemma` and `pos` for word-sense disambiguation) go into
/// `extra` and are flattened when the item is serialized for a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub uid: String,
    pub word: String,
    #[serde(default)]
    pub sentence: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Item {
    pub fn new(uid: impl Into<String>, word: impl Into<String>, sentence: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            word: word.into(),
            sentence: sentence.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra task input.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.extra.get(name).map(String::as_str)
    }

    /// JSON object handed to backends: `uid`, `word`, `sentence` plus extras.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert("uid".into(), self.uid.clone().into());
        object.insert("word".into(), self.word.clone().into());
        object.insert("sentence".into(), self.sentence.clone().into());
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone().into());
        }
        serde_json::Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_display_and_equality() {
        let pair = LanguagePair::new("pl", "en");
        assert_eq!(pair.to_string(), "pl-en");
        assert_eq!(pair, LanguagePair::new("pl", "en"));
        assert_ne!(pair, LanguagePair::new("en", "pl"));
        assert_ne!(pair, LanguagePair::new("PL", "en"));
    }

    #[test]
    fn pair_parses_display_form() {
        let pair: LanguagePair = "es-en".parse().unwrap();
        assert_eq!(pair, LanguagePair::new("es", "en"));
        assert!("es".parse::<LanguagePair>().is_err());
        assert!("-en".parse::<LanguagePair>().is_err());
    }

    #[test]
    fn item_extras_flatten() {
        let item = Item::new("u1", "kota", "Widzę kota.").with_field("lemma", "kot");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["lemma"], "kot");
        assert_eq!(json["word"], "kota");

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back.field("lemma"), Some("kot"));
    }

    #[test]
    fn item_without_sentence_deserializes() {
        let item: Item = serde_json::from_str(r#"{"uid": "x", "word": "dom"}"#).unwrap();
        assert_eq!(item.sentence, "");
        assert!(item.extra.is_empty());
    }
}
