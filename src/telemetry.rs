//! Telemetry metric name constants.
//!
//! Centralised metric names for mimir operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mimir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`, `_usd`).
//!
//! # Common labels
//!
//! - `task`: task name (e.g. "lui", "wsd")
//! - `provider`: provider id (e.g. "chat_completion_lui")
//! - `status`: batch outcome: "ok", "partial" or "error"
//! - `direction`: token direction: "input" or "output"

/// Total batches dispatched to a provider.
///
/// Labels: `task`, `provider`, `status` ("ok" | "partial" | "error").
pub const BATCHES_TOTAL: &str = "mimir_batches_total";

/// Batch duration in seconds, measured around `Provider::process`.
///
/// Labels: `task`, `provider`.
pub const BATCH_DURATION_SECONDS: &str = "mimir_batch_duration_seconds";

/// Total retry attempts against a backend (not counting the initial request).
///
/// Labels: `platform`, `operation`.
pub const RETRIES_TOTAL: &str = "mimir_retries_total";

/// Total tokens sent to or received from a model.
///
/// Labels: `model`, `direction` ("input" | "output").
pub const TOKENS_TOTAL: &str = "mimir_tokens_total";

/// Total result cache hits.
///
/// Labels: `task`.
pub const CACHE_HITS_TOTAL: &str = "mimir_cache_hits_total";

/// Total result cache misses.
///
/// Labels: `task`.
pub const CACHE_MISSES_TOTAL: &str = "mimir_cache_misses_total";

/// Total per-item outcomes reported to callers.
///
/// Labels: `task`, `outcome` ("success" | "failed" | "cancelled").
pub const ITEMS_TOTAL: &str = "mimir_items_total";

/// Post-call cost of a batch in US dollars.
///
/// Labels: `model`.
pub const BATCH_COST_USD: &str = "mimir_batch_cost_usd";
