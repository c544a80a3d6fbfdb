//! Task orchestration: provider selection, cache partitioning, batching
//! and dispatch.
//!
//! One [`Orchestrator::run`] turns a [`TaskRequest`] into a [`TaskReport`]
//! with exactly one outcome per requested item, in the caller's order:
//!
//! 1. select a provider for the task and language pair, and validate the
//!    config (errors here abort before anything is dispatched)
//! 2. serve cache hits, deduplicating UIDs
//! 3. plan batches for the misses and dispatch them with bounded
//!    concurrency, checking the cancellation token before each batch
//! 4. write every returned result into the cache, even from failed batches
//! 5. re-dispatch items that failed, up to
//!    [`OrchestratorBuilder::retry_failed_passes`] more times
//!
//! Cache files are opened once per orchestrator and shared by every run
//! that targets them, so concurrent runs never overwrite each other.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mimir::providers::{LexiconRuntime, ProviderInfo, RuntimeProvider};
//! use mimir::{CancellationToken, Item, Orchestrator, RuntimeConfig, TaskRequest};
//!
//! # async fn example() -> mimir::Result<()> {
//! let lexicon = LexiconRuntime::new("pl").with_entry("kota", "kot", "noun", "");
//! let provider = RuntimeProvider::new(
//!     ProviderInfo::new("lexicon", "Lexicon", "rule-based lemmatizer"),
//!     Arc::new(lexicon),
//! );
//! let orchestrator = Orchestrator::builder()
//!     .cache_dir("/tmp/mimir-cache")
//!     .provider("lui", Arc::new(provider))
//!     .build()?;
//!
//! let request = TaskRequest::new(
//!     "lui",
//!     vec![Item::new("b1", "kota", "Widzę kota.")],
//!     RuntimeConfig::new("pl", "en"),
//! );
//! let report = orchestrator.run(&request, &CancellationToken::new()).await?;
//! assert!(report.outcomes[0].is_success());
//! # Ok(())
//! # }
//! ```

mod batching;
mod builder;

pub use builder::{
    DEFAULT_MAX_CONCURRENT_BATCHES, DEFAULT_RETRY_FAILED_PASSES, OrchestratorBuilder,
};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheEntry, CacheNamespace, CacheStore, Provenance};
use crate::pricing::TokenEstimator;
use crate::prompts::PromptRegistry;
use crate::providers::{Provider, ProviderRegistry};
use crate::telemetry;
use crate::types::{
    Item, ItemOutcome, OutcomeStatus, RunEstimate, RunSummary, RuntimeConfig, TaskReport,
    now_timestamp,
};
use crate::Result;

use batching::plan_batches;

/// Items per batch when neither the request nor the provider sets one.
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// One task invocation over a list of items.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task: String,
    pub items: Vec<Item>,
    pub config: RuntimeConfig,
    /// Provider id; `None` uses the task default.
    pub provider: Option<String>,
    /// Skip cache reads. Fresh results are still written.
    pub ignore_cache: bool,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, items: Vec<Item>, config: RuntimeConfig) -> Self {
        Self {
            task: task.into(),
            items,
            config,
            provider: None,
            ignore_cache: false,
        }
    }

    pub fn provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider = Some(provider_id.into());
        self
    }

    pub fn ignore_cache(mut self, ignore: bool) -> Self {
        self.ignore_cache = ignore;
        self
    }
}

/// Composition root tying providers, the result cache and batching together.
pub struct Orchestrator {
    registry: ProviderRegistry,
    cache_dir: PathBuf,
    prompts: Arc<PromptRegistry>,
    estimator: TokenEstimator,
    max_concurrent_batches: usize,
    batch_token_budget: Option<usize>,
    retry_failed_passes: usize,
    /// Open cache files keyed by path.
    stores: moka::sync::Cache<PathBuf, Arc<CacheStore>>,
}

/// Selection, validation and cache partitioning shared by `run` and `estimate`.
struct Prepared<'a> {
    provider: Arc<dyn Provider>,
    config: RuntimeConfig,
    provenance: Provenance,
    cache: Arc<CacheStore>,
    unique: usize,
    resolved: HashMap<String, OutcomeStatus>,
    pending: Vec<&'a Item>,
}

/// Everything one dispatch pass shares across its batches.
struct Pass<'a> {
    task: &'a str,
    provider: &'a dyn Provider,
    config: &'a RuntimeConfig,
    provenance: &'a Provenance,
    cache: &'a CacheStore,
    cancel: &'a CancellationToken,
    width: usize,
}

/// What one dispatched (or skipped) batch produced.
struct BatchReport {
    outcomes: Vec<(String, OutcomeStatus)>,
    dispatched: bool,
    cost_usd: Option<f64>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn prompts(&self) -> &Arc<PromptRegistry> {
        &self.prompts
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Run `request` to completion or cancellation.
    ///
    /// Returns `Err` only for configuration problems detected before any
    /// dispatch. Backend failures and cancellation are per-item outcomes.
    #[instrument(skip_all, fields(task = %request.task))]
    pub async fn run(
        &self,
        request: &TaskRequest,
        cancel: &CancellationToken,
    ) -> Result<TaskReport> {
        let Prepared {
            provider,
            config,
            provenance,
            cache,
            unique,
            mut resolved,
            pending,
        } = self.prepare(request)?;
        let cached = resolved.len();
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "task" => request.task.clone())
            .increment(cached as u64);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "task" => request.task.clone())
            .increment(pending.len() as u64);

        let width = self
            .max_concurrent_batches
            .min(provider.max_concurrency())
            .max(1);
        let pass = Pass {
            task: &request.task,
            provider: provider.as_ref(),
            config: &config,
            provenance: &provenance,
            cache: &cache,
            cancel,
            width,
        };
        info!(
            task = %request.task,
            provider = provider.id(),
            items = request.items.len(),
            unique,
            cached,
            pending = pending.len(),
            concurrency = width,
            "starting run"
        );

        let mut dispatched_batches = 0;
        let mut cost_usd: Option<f64> = None;
        let mut attempt = 0;
        let mut todo = pending.clone();
        while !todo.is_empty() {
            let retry = attempt > 0;
            let batches = self.plan(todo, &config);
            for report in self.dispatch_pass(&pass, batches).await {
                if report.dispatched {
                    dispatched_batches += 1;
                }
                if let Some(cost) = report.cost_usd {
                    *cost_usd.get_or_insert(0.0) += cost;
                }
                for (uid, status) in report.outcomes {
                    // A retry skipped by cancellation keeps the earlier failure.
                    if retry && matches!(status, OutcomeStatus::Cancelled) {
                        continue;
                    }
                    resolved.insert(uid, status);
                }
            }

            todo = pending
                .iter()
                .copied()
                .filter(|item| {
                    matches!(resolved.get(&item.uid), Some(OutcomeStatus::Failed { .. }))
                })
                .collect();
            if todo.is_empty() || attempt >= self.retry_failed_passes {
                break;
            }
            if cancel.is_cancelled() {
                debug!(task = %request.task, failed = todo.len(), "cancelled, skipping retry pass");
                break;
            }
            attempt += 1;
            warn!(
                task = %request.task,
                attempt,
                of = self.retry_failed_passes,
                items = todo.len(),
                "re-dispatching failed items"
            );
        }

        let mut summary = RunSummary {
            total: request.items.len(),
            unique,
            cached,
            dispatched_batches,
            cost_usd,
            ..RunSummary::default()
        };
        for status in resolved.values() {
            match status {
                OutcomeStatus::Success { .. } => summary.succeeded += 1,
                OutcomeStatus::Failed { .. } => summary.failed += 1,
                OutcomeStatus::Cancelled => summary.cancelled += 1,
            }
            metrics::counter!(telemetry::ITEMS_TOTAL,
                "task" => request.task.clone(),
                "outcome" => status.label(),
            )
            .increment(1);
        }

        let outcomes = request
            .items
            .iter()
            .map(|item| ItemOutcome {
                uid: item.uid.clone(),
                status: resolved.get(&item.uid).cloned().unwrap_or_else(|| {
                    OutcomeStatus::Failed {
                        reason: "no result returned".to_string(),
                    }
                }),
            })
            .collect();

        info!(
            task = %request.task,
            provider = provider.id(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            cost_usd = summary.cost_usd.unwrap_or(0.0),
            "run finished"
        );

        Ok(TaskReport {
            task: request.task.clone(),
            provider: provider.id().to_string(),
            outcomes,
            summary,
        })
    }

    /// Pre-call planning figures for `request`. Makes no backend call.
    #[instrument(skip_all, fields(task = %request.task))]
    pub fn estimate(&self, request: &TaskRequest) -> Result<RunEstimate> {
        let Prepared {
            provider,
            config,
            unique,
            resolved,
            pending,
            ..
        } = self.prepare(request)?;
        let pending_count = pending.len();
        let batches = self.plan(pending, &config).len();
        let usage = provider.estimate_usage(pending_count, &config)?;

        Ok(RunEstimate {
            task: request.task.clone(),
            provider: provider.id().to_string(),
            unique,
            cached: resolved.len(),
            pending: pending_count,
            batches,
            cost_usd: usage.as_ref().and_then(|u| u.cost_usd),
            usage: usage.map(|u| u.usage),
        })
    }

    fn prepare<'a>(&self, request: &'a TaskRequest) -> Result<Prepared<'a>> {
        let pair = request.config.language_pair();
        let provider = self
            .registry
            .select(&request.task, request.provider.as_deref(), &pair)?;

        let batch_size = if provider.supports_batching() {
            request
                .config
                .batch_size
                .or_else(|| provider.default_batch_size())
                .unwrap_or(DEFAULT_BATCH_SIZE)
        } else {
            1
        };
        let config = request.config.clone().batch_size(batch_size);
        provider.validate(&config)?;

        let namespace = CacheNamespace::for_task(&request.task, &pair, provider.id());
        let cache = self.store(&namespace);
        let provenance = provider.provenance(&config);

        let mut seen = HashSet::new();
        let mut resolved = HashMap::new();
        let mut pending = Vec::new();
        for item in &request.items {
            if !seen.insert(item.uid.as_str()) {
                debug!(uid = %item.uid, "duplicate UID, reusing first occurrence");
                continue;
            }
            let hit = if request.ignore_cache {
                None
            } else {
                cache.lookup(&item.uid, &provenance)
            };
            match hit {
                Some(entry) => {
                    resolved.insert(
                        item.uid.clone(),
                        OutcomeStatus::Success {
                            payload: entry.payload,
                            model_used: entry.model_used,
                            from_cache: true,
                        },
                    );
                }
                None => pending.push(item),
            }
        }

        Ok(Prepared {
            provider,
            config,
            provenance,
            cache,
            unique: seen.len(),
            resolved,
            pending,
        })
    }

    /// The shared store for `namespace`, opened on first use.
    fn store(&self, namespace: &CacheNamespace) -> Arc<CacheStore> {
        let path = self.cache_dir.join(namespace.file_name());
        self.stores
            .get_with(path, || Arc::new(CacheStore::open(&self.cache_dir, namespace)))
    }

    fn plan<'a>(&self, pending: Vec<&'a Item>, config: &RuntimeConfig) -> Vec<Vec<&'a Item>> {
        let model = config.model_id.as_deref().unwrap_or_default();
        plan_batches(
            pending,
            config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            self.batch_token_budget,
            |item| self.estimator.count_tokens(&item.to_json().to_string(), model),
        )
    }

    async fn dispatch_pass(&self, pass: &Pass<'_>, batches: Vec<Vec<&Item>>) -> Vec<BatchReport> {
        let total = batches.len();
        stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| self.dispatch(pass, index, total, batch))
            .buffer_unordered(pass.width)
            .collect()
            .await
    }

    async fn dispatch(
        &self,
        pass: &Pass<'_>,
        index: usize,
        total: usize,
        batch: Vec<&Item>,
    ) -> BatchReport {
        let Pass {
            task,
            provider,
            config,
            provenance,
            cache,
            cancel,
            ..
        } = *pass;
        if cancel.is_cancelled() {
            debug!(task, batch = index + 1, items = batch.len(), "batch cancelled before dispatch");
            return BatchReport {
                outcomes: batch
                    .into_iter()
                    .map(|item| (item.uid.clone(), OutcomeStatus::Cancelled))
                    .collect(),
                dispatched: false,
                cost_usd: None,
            };
        }

        let items: Vec<Item> = batch.into_iter().cloned().collect();
        info!(
            task,
            provider = provider.id(),
            batch = index + 1,
            total,
            items = items.len(),
            "processing batch"
        );

        let start = Instant::now();
        let mut result = provider.process(&items, config).await;
        let elapsed = start.elapsed();

        metrics::counter!(telemetry::BATCHES_TOTAL,
            "task" => task.to_owned(),
            "provider" => provider.id().to_owned(),
            "status" => result.status_label(),
        )
        .increment(1);
        metrics::histogram!(telemetry::BATCH_DURATION_SECONDS,
            "task" => task.to_owned(),
            "provider" => provider.id().to_owned(),
        )
        .record(elapsed.as_secs_f64());

        let reason = result
            .error
            .clone()
            .unwrap_or_else(|| "no result returned".to_string());
        let timestamp = result.timestamp.clone().unwrap_or_else(now_timestamp);

        let mut outcomes = Vec::with_capacity(items.len());
        let mut fresh = Vec::new();
        for item in &items {
            match result.results.remove(&item.uid) {
                Some(payload) => {
                    fresh.push((
                        item.uid.clone(),
                        CacheEntry::new(
                            payload.clone(),
                            result.model_id.clone(),
                            Some(timestamp.clone()),
                        )
                        .with_prompt_id(provenance.prompt_id.clone()),
                    ));
                    outcomes.push((
                        item.uid.clone(),
                        OutcomeStatus::Success {
                            payload,
                            model_used: result.model_id.clone(),
                            from_cache: false,
                        },
                    ));
                }
                None => {
                    warn!(task, uid = %item.uid, reason = %reason, "no result for item");
                    outcomes.push((
                        item.uid.clone(),
                        OutcomeStatus::Failed {
                            reason: reason.clone(),
                        },
                    ));
                }
            }
        }
        for uid in result.results.keys() {
            warn!(task, uid = %uid, "provider returned a UID outside the batch");
        }

        if !fresh.is_empty()
            && let Err(e) = cache.set_many(fresh)
        {
            warn!(task, path = %cache.path().display(), error = %e, "failed to persist results");
        }

        if result.success {
            info!(
                task,
                batch = index + 1,
                elapsed_s = elapsed.as_secs_f64(),
                "batch completed"
            );
        } else {
            error!(
                task,
                batch = index + 1,
                elapsed_s = elapsed.as_secs_f64(),
                salvaged = outcomes.iter().filter(|(_, s)| matches!(s, OutcomeStatus::Success { .. })).count(),
                error = %reason,
                "batch failed"
            );
        }

        BatchReport {
            outcomes,
            dispatched: true,
            cost_usd: result.cost_usd,
        }
    }
}
