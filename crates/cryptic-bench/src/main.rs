//! cryptic-bench CLI
//!
//! `run` benchmarks models against the clue file; `serve` exposes the saved
//! results over a read-only JSON API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use grading::PriceTable;
use tracing::info;

use cryptic_bench::config::{load_clues, load_price_table};
use cryptic_bench::dashboard::{self, DashboardState};
use cryptic_bench::{
    finalize, BenchConfig, ModelList, OpenRouterClient, Orchestrator, OutputOptions, RunSettings,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark
    Run(RunArgs),
    /// Serve saved results as JSON
    Serve(ServeArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Comma-separated model ids
    #[arg(long)]
    models: Option<String>,

    /// JSON array of model ids or {name, inputCostPerM, outputCostPerM} objects
    #[arg(long)]
    models_file: Option<PathBuf>,

    /// Output file; `.csv` writes CSV, anything else JSON
    #[arg(long, alias = "output")]
    out: Option<PathBuf>,

    /// API key (overrides OPENROUTER_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Run only the cheap test model
    #[arg(long, default_value_t = false)]
    test: bool,

    /// Clues in flight per model (overrides CRYPTIC_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Models in flight at once (overrides CRYPTIC_MODEL_CONCURRENCY)
    #[arg(long)]
    model_concurrency: Option<usize>,

    /// Clue file (overrides CRYPTIC_CLUES_PATH)
    #[arg(long)]
    clues: Option<PathBuf>,

    /// Extra price table JSON, keyed by model id
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Directory for timestamped result snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Overwrite the output instead of merging with previous results
    #[arg(long, default_value_t = false)]
    fresh: bool,

    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    #[arg(long, default_value_t = 200)]
    max_tokens: u32,

    /// Log each raw model response
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(ClapArgs, Debug)]
struct ServeArgs {
    /// Directory holding results-*.json snapshots
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run(run) => run_benchmark(run).await,
        Command::Serve(serve) => {
            let root = std::env::current_dir().context("Failed to resolve working directory")?;
            dashboard::serve(DashboardState::new(serve.data_dir, root), &serve.bind).await
        }
    }
}

async fn run_benchmark(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::default();
    if let Some(path) = args.clues {
        config.clues_path = path;
    }
    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(n) = args.model_concurrency {
        config.model_concurrency = Some(n);
    }

    // Clues first: a missing clue file is fatal before anything else.
    let clues = load_clues(&config.clues_path)?;
    let api_key = config.require_api_key()?.to_string();

    let model_list = ModelList::resolve(
        args.test,
        args.models_file.as_deref(),
        args.models.as_deref(),
    )?;

    let mut prices = PriceTable::builtin();
    if let Some(path) = args.prices.as_deref() {
        prices = prices.extend(load_price_table(path)?);
    }
    let prices = prices.extend(model_list.prices);

    let models = model_list.models;
    info!(
        models = %models.join(", "),
        clues = clues.len(),
        clues_path = %config.clues_path.display(),
        "starting benchmark"
    );

    let client = OpenRouterClient::new(&config.base_url, api_key, config.request_timeout)
        .context("Failed to build chat client")?;

    let settings = RunSettings {
        clue_concurrency: config.concurrency,
        model_concurrency: config.model_concurrency_for(models.len()),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        verbose: args.verbose,
    };

    let orchestrator = Orchestrator::new(Arc::new(client), prices, clues, settings);
    let results = orchestrator.run(&models).await;

    let output = OutputOptions {
        out: args.out,
        snapshot_dir: args.snapshot_dir,
        fresh: args.fresh,
    };
    finalize(results, orchestrator.clues(), &output, Utc::now());
    Ok(())
}
