//! Result of one runtime invocation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outcome of one `Provider::process` call over a batch.
///
/// `success == false` does not mean nothing came back: `results` may still
/// hold per-item payloads from a batch that failed overall, and callers must
/// look at both fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCallResult {
    pub success: bool,
    #[serde(default)]
    pub results: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Post-call cost in USD, when the runtime could price the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl BatchCallResult {
    /// A fully successful batch.
    pub fn success(
        results: HashMap<String, serde_json::Value>,
        model_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            results,
            model_id: Some(model_id.into()),
            timestamp: Some(timestamp.into()),
            error: None,
            cost_usd: None,
        }
    }

    /// A batch that failed without producing any per-item result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// A batch that failed overall but still carries some per-item results.
    pub fn partial(
        results: HashMap<String, serde_json::Value>,
        model_id: impl Into<String>,
        timestamp: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            results,
            model_id: Some(model_id.into()),
            timestamp: Some(timestamp.into()),
            error: Some(error.into()),
            cost_usd: None,
        }
    }

    pub fn with_cost(mut self, cost_usd: Option<f64>) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    /// Metric label for this result.
    pub fn status_label(&self) -> &'static str {
        match (self.success, self.results.is_empty()) {
            (true, _) => "ok",
            (false, false) => "partial",
            (false, true) => "error",
        }
    }
}

/// Timestamp format used for cache provenance.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
