//! Mimir error types

use std::path::PathBuf;
use std::time::Duration;

use crate::types::LanguagePair;

/// Mimir error types
#[derive(Debug, thiserror::Error)]
pub enum MimirError {
    // Backend/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("data error: {0}")]
    DataError(String),

    #[error("empty response from model")]
    EmptyResponse,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no provider for task '{task}' and language pair {pair}")]
    NoProvider { task: String, pair: LanguagePair },

    #[error("provider '{provider}' does not support language pair {pair}")]
    UnsupportedLanguagePair { provider: String, pair: LanguagePair },

    #[error("no default prompt configured for task: {0}")]
    NoDefaultPrompt(String),

    #[error("prompt '{prompt_id}' for task '{task}' not found at {path:?}")]
    PromptNotFound {
        task: String,
        prompt_id: String,
        path: PathBuf,
    },

    #[error("unknown model: {0}")]
    UnknownModel(String),
}

impl MimirError {
    /// Whether a retry of the same request can reasonably succeed.
    ///
    /// Rate limits, transport failures, request timeouts and server-side
    /// (5xx) errors are transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            MimirError::RateLimited { .. } | MimirError::Http(_) => true,
            MimirError::Api { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// Server-provided hint for how long to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MimirError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error invalidates a whole invocation rather than a batch.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MimirError::Configuration(_)
                | MimirError::NoProvider { .. }
                | MimirError::UnsupportedLanguagePair { .. }
                | MimirError::NoDefaultPrompt(_)
                | MimirError::PromptNotFound { .. }
                | MimirError::UnknownModel(_)
        )
    }
}

impl From<reqwest::Error> for MimirError {
    fn from(err: reqwest::Error) -> Self {
        MimirError::Http(err.to_string())
    }
}

/// Result type alias for Mimir operations
pub type Result<T> = std::result::Result<T, MimirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(MimirError::RateLimited { retry_after: None }.is_transient());
        assert!(MimirError::Http("connection reset".into()).is_transient());
        assert!(
            MimirError::Api {
                status: 503,
                message: "busy".into()
            }
            .is_transient()
        );
        assert!(
            MimirError::Api {
                status: 408,
                message: "timeout".into()
            }
            .is_transient()
        );
        assert!(
            !MimirError::Api {
                status: 400,
                message: "bad".into()
            }
            .is_transient()
        );
        assert!(!MimirError::AuthenticationFailed.is_transient());
        assert!(!MimirError::EmptyResponse.is_transient());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let err = MimirError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(MimirError::Http("x".into()).retry_after(), None);
    }

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(MimirError::NoDefaultPrompt("lui".into()).is_configuration());
        assert!(
            MimirError::NoProvider {
                task: "lui".into(),
                pair: LanguagePair::new("pl", "en"),
            }
            .is_configuration()
        );
        assert!(!MimirError::EmptyResponse.is_configuration());
    }

    #[test]
    fn no_provider_message_names_pair() {
        let err = MimirError::NoProvider {
            task: "wsd".into(),
            pair: LanguagePair::new("es", "en"),
        };
        assert_eq!(
            err.to_string(),
            "no provider for task 'wsd' and language pair es-en"
        );
    }
}
