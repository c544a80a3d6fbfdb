//! mimir: vocabulary enrichment runner.
//!
//! Runs one enrichment task over a JSON file of items and prints the
//! per-item report.

use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};

use mimir::bootstrap::build_orchestrator;
use mimir::config::{Config, Secrets};
use mimir::{CancellationToken, Item, MimirError, RuntimeConfig, TaskRequest};

/// Vocabulary enrichment task runner
#[derive(Parser)]
#[command(name = "mimir")]
#[command(version)]
#[command(about = "Enrich vocabulary items through pluggable providers")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "MIMIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a task and print the per-item report as JSON
    Run(TaskArgs),

    /// Print pending items, batches and estimated cost without calling a backend
    Estimate(TaskArgs),

    /// List providers registered for a task
    Providers {
        #[arg(short, long)]
        task: String,
    },
}

#[derive(ClapArgs)]
struct TaskArgs {
    /// Task name (lui, wsd, translation, hint, cloze_scoring, usage_level, collocation)
    #[arg(short, long)]
    task: String,
    /// Source language code
    #[arg(short, long)]
    source: String,
    /// Target language code
    #[arg(long)]
    target: String,
    /// JSON file with an array of items
    #[arg(short, long)]
    input: PathBuf,
    /// Provider id (default: the task default)
    #[arg(long)]
    provider: Option<String>,
    /// Model id
    #[arg(short, long)]
    model: Option<String>,
    /// Items per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Prompt id (default: per-language, then per-task default)
    #[arg(long)]
    prompt_id: Option<String>,
    /// Recompute items that are already cached
    #[arg(long)]
    ignore_cache: bool,
}

impl TaskArgs {
    /// Merge flags with the `[tasks.<task>]` section; flags win.
    fn request(&self, config: &Config) -> Result<TaskRequest, MimirError> {
        let defaults = config.task(&self.task).cloned().unwrap_or_default();

        let mut runtime = RuntimeConfig::new(&self.source, &self.target);
        if let Some(model) = self.model.clone().or(defaults.model) {
            runtime = runtime.model(model);
        }
        if let Some(size) = self.batch_size.or(defaults.batch_size) {
            runtime = runtime.batch_size(size);
        }
        if let Some(prompt) = self.prompt_id.clone().or(defaults.prompt_id) {
            runtime = runtime.prompt(prompt);
        }

        let mut request = TaskRequest::new(&self.task, read_items(&self.input)?, runtime)
            .ignore_cache(self.ignore_cache);
        if let Some(provider) = &self.provider {
            request = request.provider(provider);
        }
        Ok(request)
    }
}

fn read_items(path: &Path) -> Result<Vec<Item>, MimirError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MimirError::InvalidInput(format!("failed to read items from {path:?}: {e}"))
    })?;
    Ok(serde_json::from_str(&content)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let orchestrator = build_orchestrator(&config, &secrets)?;

    match args.command {
        Command::Run(task_args) => {
            let request = task_args.request(&config)?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing dispatched batches");
                    on_signal.cancel();
                }
            });

            let report = orchestrator.run(&request, &cancel).await?;
            info!(
                succeeded = report.summary.succeeded,
                failed = report.summary.failed,
                cancelled = report.summary.cancelled,
                "done"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Estimate(task_args) => {
            let request = task_args.request(&config)?;
            let estimate = orchestrator.estimate(&request)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Command::Providers { task } => {
            let providers = orchestrator.registry().describe(&task);
            println!("{}", serde_json::to_string_pretty(&providers)?);
        }
    }

    Ok(())
}
