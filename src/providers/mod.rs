//! Providers, the runtimes behind them, and the backends they call.
//!
//! A [`Provider`] is what the orchestrator selects per task and language
//! pair. Most providers are a [`RuntimeProvider`] wrapping one of the
//! runtimes here:
//!
//! - [`ChatCompletionRuntime`]: prompt-driven, over any [`ChatPlatform`]
//! - [`DeepLRuntime`]: sentence translation through the DeepL API
//! - [`LexiconRuntime`]: rule-based lemmatization from a lexicon file

pub mod chat_completion;
pub mod deepl;
mod http;
pub mod info;
pub mod lexicon;
pub mod platform;
pub mod registry;
pub mod retry;
pub mod runtime_provider;
pub mod traits;

pub use chat_completion::ChatCompletionRuntime;
pub use deepl::DeepLRuntime;
pub use http::DEFAULT_TIMEOUT;
pub use info::{ProviderInfo, ProviderSummary, RuntimeDescriptor};
pub use lexicon::{LexiconEntry, LexiconRuntime};
pub use platform::{ChatPlatform, ChatPlatforms, OpenAiCompatiblePlatform};
pub use registry::ProviderRegistry;
pub use retry::RetryConfig;
pub use runtime_provider::RuntimeProvider;
pub use traits::{Provider, Runtime};
