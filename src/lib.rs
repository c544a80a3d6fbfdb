//! Mimir - task orchestration for vocabulary enrichment
//!
//! This crate runs enrichment tasks (lexical-unit identification,
//! word-sense disambiguation, translation, hints, cloze scoring, usage
//! levels, collocations) over batches of vocabulary items. It selects a provider for each task and language
//! pair, serves repeated items from a persistent per-UID cache, batches
//! the rest for the provider's runtime, and accounts for tokens and cost
//! before and after each call.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mimir::pricing::TokenEstimator;
//! use mimir::prompts::PromptRegistry;
//! use mimir::providers::{
//!     ChatCompletionRuntime, ChatPlatforms, OpenAiCompatiblePlatform, ProviderInfo,
//!     RuntimeProvider,
//! };
//! use mimir::{CancellationToken, Item, Orchestrator, RuntimeConfig, TaskRequest};
//!
//! #[tokio::main]
//! async fn main() -> mimir::Result<()> {
//!     let prompts = Arc::new(PromptRegistry::new("prompts"));
//!     let platforms =
//!         ChatPlatforms::new().with(Arc::new(OpenAiCompatiblePlatform::openai("sk-your-key")?));
//!     let runtime =
//!         ChatCompletionRuntime::new("lui", prompts.clone(), platforms, TokenEstimator::default());
//!     let provider = RuntimeProvider::new(
//!         ProviderInfo::new("chat_completion_lui", "Chat Completion LUI", "LLM-backed LUI"),
//!         Arc::new(runtime),
//!     );
//!
//!     let orchestrator = Orchestrator::builder()
//!         .prompts(prompts)
//!         .provider("lui", Arc::new(provider))
//!         .build()?;
//!
//!     let request = TaskRequest::new(
//!         "lui",
//!         vec![Item::new("b1-loc42", "kota", "Widzę kota na dachu.")],
//!         RuntimeConfig::new("pl", "en").model("gpt-5-mini"),
//!     );
//!     let report = orchestrator.run(&request, &CancellationToken::new()).await?;
//!
//!     for outcome in &report.outcomes {
//!         println!("{}: {:?}", outcome.uid, outcome.payload());
//!     }
//!     Ok(())
//! }
//! ```

#[cfg(feature = "cli")]
pub mod bootstrap;
pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod connector;
pub mod error;
pub mod languages;
pub mod orchestrator;
pub mod pricing;
pub mod prompts;
pub mod providers;
pub mod telemetry;
pub mod tokenizer;
pub mod types;

// Re-export main types at crate root
pub use error::{MimirError, Result};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, TaskRequest};
pub use providers::{Provider, Runtime};
pub use tokio_util::sync::CancellationToken;

pub use types::{
    BatchCallResult, ClozeScoringOutput, CollocationOutput, Confidence, HintOutput, Item,
    ItemOutcome, LanguagePair, LuiOutput, OutcomeStatus, RunEstimate, RunSummary, RuntimeConfig,
    TaskKind, TaskReport, TranslationOutput, UsageBreakdown, UsageEstimate, UsageLevelOutput,
    WsdOutput,
};
