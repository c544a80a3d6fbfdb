//! Per-item outcomes reported back to callers.

use serde::{Deserialize, Serialize};

use super::UsageBreakdown;

/// Resolution of one requested item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success {
        payload: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_used: Option<String>,
        from_cache: bool,
    },
    Failed {
        reason: String,
    },
    /// Never dispatched because the run was cancelled first.
    Cancelled,
}

impl OutcomeStatus {
    /// Metric label for this outcome.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Success { .. } => "success",
            OutcomeStatus::Failed { .. } => "failed",
            OutcomeStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub uid: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, OutcomeStatus::Cancelled)
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match &self.status {
            OutcomeStatus::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Aggregate counters for one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items requested, duplicates included.
    pub total: usize,
    /// Distinct UIDs.
    pub unique: usize,
    /// Distinct UIDs served from the cache.
    pub cached: usize,
    pub dispatched_batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Sum of post-call costs the runtimes could price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// Everything a run hands back: one outcome per requested item, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: String,
    pub provider: String,
    pub outcomes: Vec<ItemOutcome>,
    pub summary: RunSummary,
}

impl TaskReport {
    pub fn outcome(&self, uid: &str) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.uid == uid)
    }
}

/// Pre-call planning figures for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEstimate {
    pub task: String,
    pub provider: String,
    pub unique: usize,
    pub cached: usize,
    pub pending: usize,
    pub batches: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBreakdown>,
    /// `None` means the provider cannot price this run, not that it is free.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}
