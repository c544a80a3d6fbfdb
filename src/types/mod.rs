//! Public types for the Mimir API.

mod batch;
mod config;
mod item;
mod outcome;
mod task;
mod usage;

pub use batch::{BatchCallResult, now_timestamp};
pub use config::RuntimeConfig;
pub use item::{Item, LanguagePair};
pub use outcome::{ItemOutcome, OutcomeStatus, RunEstimate, RunSummary, TaskReport};
pub use task::{
    ClozeScoringOutput, CollocationOutput, HintOutput, LuiOutput, TaskKind, TranslationOutput,
    UsageLevelOutput, WsdOutput,
};
pub use usage::{
    Confidence, UsageBreakdown, UsageDimension, UsageEstimate, UsageScope, UsageUnit,
};
