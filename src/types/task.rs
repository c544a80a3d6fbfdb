//! Task names and the typed payloads each task produces.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{MimirError, Result};

/// Enrichment tasks with built-in prompts and schemas.
///
/// Tasks are addressed by name throughout the crate, so custom tasks work
/// without a variant here; this enum only covers the shipped ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Lexical-unit identification.
    Lui,
    /// Word-sense disambiguation.
    Wsd,
    Translation,
    Hint,
    /// Suitability of the sentence as a cloze deletion card.
    ClozeScoring,
    /// How common the word is in the sense used.
    UsageLevel,
    Collocation,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::Lui,
        TaskKind::Wsd,
        TaskKind::Translation,
        TaskKind::Hint,
        TaskKind::ClozeScoring,
        TaskKind::UsageLevel,
        TaskKind::Collocation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Lui => "lui",
            TaskKind::Wsd => "wsd",
            TaskKind::Translation => "translation",
            TaskKind::Hint => "hint",
            TaskKind::ClozeScoring => "cloze_scoring",
            TaskKind::UsageLevel => "usage_level",
            TaskKind::Collocation => "collocation",
        }
    }

    /// Check that `payload` has this task's output shape.
    pub fn check_output(&self, payload: &serde_json::Value) -> Result<()> {
        match self {
            TaskKind::Lui => conforms::<LuiOutput>(payload).map(drop),
            TaskKind::Wsd => {
                let output = conforms::<WsdOutput>(payload)?;
                if let Some(score) = output.cloze_deletion_score {
                    in_range("cloze_deletion_score", score, CLOZE_SCORE_RANGE)?;
                }
                if let Some(level) = output.usage_level {
                    in_range("usage_level", level, USAGE_LEVEL_RANGE)?;
                }
                Ok(())
            }
            TaskKind::Translation => conforms::<TranslationOutput>(payload).map(drop),
            TaskKind::Hint => conforms::<HintOutput>(payload).map(drop),
            TaskKind::ClozeScoring => {
                let output = conforms::<ClozeScoringOutput>(payload)?;
                in_range("cloze_deletion_score", output.cloze_deletion_score, CLOZE_SCORE_RANGE)
            }
            TaskKind::UsageLevel => match conforms::<UsageLevelOutput>(payload)?.usage_level {
                Some(level) => in_range("usage_level", level, USAGE_LEVEL_RANGE),
                None => Ok(()),
            },
            TaskKind::Collocation => conforms::<CollocationOutput>(payload).map(drop),
        }
    }
}

const CLOZE_SCORE_RANGE: RangeInclusive<i64> = 0..=10;
const USAGE_LEVEL_RANGE: RangeInclusive<i64> = 1..=5;

fn conforms<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T> {
    T::deserialize(payload)
        .map_err(|e| MimirError::DataError(format!("payload does not match schema: {e}")))
}

fn in_range(field: &str, value: i64, range: RangeInclusive<i64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(MimirError::DataError(format!(
            "{field} {value} outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = MimirError;

    fn from_str(s: &str) -> Result<Self> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MimirError::InvalidInput(format!("unknown task: {s}")))
    }
}

/// Lexical-unit identification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuiOutput {
    pub lemma: String,
    pub part_of_speech: String,
    #[serde(default)]
    pub aspect: String,
    /// Exact substring of the sentence the learner should memorize.
    pub surface_lexical_unit: String,
    /// One of "lemma", "reflexive", "idiom".
    pub unit_type: String,
}

/// Word-sense disambiguation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsdOutput {
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze_deletion_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub translation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintOutput {
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClozeScoringOutput {
    /// 0 (unguessable) to 10 (unambiguous).
    pub cloze_deletion_score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLevelOutput {
    /// 1 (rare) to 5 (very frequent); `None` when the model could not judge.
    pub usage_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollocationOutput {
    pub collocations: Vec<String>,
}
