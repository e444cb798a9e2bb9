use anyhow::Context;
use api_client::{CftcClient, Ingestor};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use configuration::{Config, ReportFormat};
use core_types::CurrencyCode;
use database::PgReportStore;
use engine::{IngestStatus, PositioningEngine};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// The main entry point for the positioning analytics application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine when variables are exported.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = configuration::init_tracing(&config.logging)?;
    tracing::debug!(path = %cli.config.display(), currencies = config.engine.currencies.len(), "Configuration loaded.");

    match cli.command {
        Commands::Fetch(args) => handle_fetch(args, &config).await,
        Commands::Refresh(args) => handle_refresh(args, &config).await,
        Commands::Backfill(args) => handle_backfill(args, &config).await,
        Commands::Rank(args) => handle_rank(args, &config).await,
        Commands::Score(args) => handle_score(args, &config).await,
        Commands::Serve(args) => handle_serve(args, &config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Speculative positioning analytics over weekly CFTC Commitments of Traders reports.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and validate one report from upstream without storing it.
    Fetch(FetchArgs),
    /// Fetch the current report of every tracked currency and store it.
    Refresh(AsOfArgs),
    /// Load weekly history into the store.
    Backfill(BackfillArgs),
    /// Rank every tracked currency by composite score.
    Rank(FormatArgs),
    /// Show the latest composite score of one currency.
    Score(ScoreArgs),
    /// Serve the JSON read API.
    Serve(ServeArgs),
}

#[derive(Parser)]
struct AsOfArgs {
    /// Evaluation date (format: YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Parser)]
struct FetchArgs {
    /// The currency to fetch (e.g., "EUR").
    #[arg(long)]
    currency: CurrencyCode,

    #[command(flatten)]
    date: AsOfArgs,
}

#[derive(Parser)]
struct BackfillArgs {
    /// Only this currency. Defaults to every tracked currency.
    #[arg(long)]
    currency: Option<CurrencyCode>,

    /// Number of weekly reports to load. Defaults to `engine.history_weeks`.
    #[arg(long)]
    weeks: Option<usize>,

    #[command(flatten)]
    date: AsOfArgs,
}

#[derive(Parser)]
struct FormatArgs {
    /// Output format. Defaults to `output.format`.
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,
}

#[derive(Parser)]
struct ScoreArgs {
    #[arg(long)]
    currency: CurrencyCode,

    #[command(flatten)]
    output: FormatArgs,
}

#[derive(Parser)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: SocketAddr,
}

impl AsOfArgs {
    fn resolve(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl FormatArgs {
    fn resolve(&self, config: &Config) -> ReportFormat {
        self.format.unwrap_or(config.output.format)
    }
}

// ==============================================================================
// Wiring
// ==============================================================================

/// Connects to Postgres, applies migrations and builds the engine.
async fn build_engine(config: &Config) -> anyhow::Result<PositioningEngine> {
    let db_pool = database::connect()
        .await
        .context("Failed to connect to the database")?;
    database::run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(PgReportStore::new(db_pool));
    let source = Arc::new(CftcClient::new(&config.upstream)?);
    Ok(PositioningEngine::new(config, store, source)?)
}

fn progress_bar(len: usize) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(len as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(progress_bar)
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_fetch(args: FetchArgs, config: &Config) -> anyhow::Result<()> {
    let as_of = args.date.resolve();
    let source = Arc::new(CftcClient::new(&config.upstream)?);
    let ingestor = Ingestor::new(source, &config.upstream);

    let report = ingestor.fetch(&args.currency, as_of).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn handle_refresh(args: AsOfArgs, config: &Config) -> anyhow::Result<()> {
    let as_of = args.resolve();
    let engine = build_engine(config).await?;

    let progress_bar = progress_bar(engine.currencies().len())?;
    let summary = engine
        .refresh_with(as_of, |currency, result| {
            let status = match result {
                Ok(ingested) if ingested.status == IngestStatus::Cached => "cached",
                Ok(_) => "stored",
                Err(_) => "failed",
            };
            progress_bar.inc(1);
            progress_bar.set_message(format!("{} {}", currency, status));
        })
        .await;
    progress_bar.finish_with_message("Refresh complete!");

    for (currency, result) in &summary.outcomes {
        match result {
            Ok(ingested) => println!(
                "{}  {}  net {:>10}  oi {:>10}  ({:?})",
                currency,
                ingested.report.report_date(),
                ingested.report.net_position(),
                ingested.report.open_interest(),
                ingested.status
            ),
            Err(e) => eprintln!("{}  failed ({}): {}", currency, e.kind(), e),
        }
    }
    println!(
        "{} of {} currencies refreshed as of {}.",
        summary.succeeded(),
        summary.outcomes.len(),
        as_of
    );
    Ok(())
}

async fn handle_backfill(args: BackfillArgs, config: &Config) -> anyhow::Result<()> {
    let as_of = args.date.resolve();
    let engine = build_engine(config).await?;

    if let Some(currency) = &args.currency {
        let summary = engine.backfill(currency, as_of, args.weeks).await?;
        println!(
            "{}: {} reports fetched, {} new, {} corrected.",
            currency, summary.fetched, summary.inserted, summary.updated
        );
        return Ok(());
    }

    let progress_bar = progress_bar(engine.currencies().len())?;
    let results = engine
        .backfill_all(as_of, args.weeks, |currency, _| {
            progress_bar.inc(1);
            progress_bar.set_message(format!("Done {}!", currency));
        })
        .await;
    progress_bar.finish_with_message("Backfill complete!");

    for (currency, result) in results {
        match result {
            Ok(summary) => println!(
                "{}: {} reports fetched, {} new, {} corrected.",
                currency, summary.fetched, summary.inserted, summary.updated
            ),
            Err(e) => eprintln!("{}: backfill failed ({}): {}", currency, e.kind(), e),
        }
    }
    Ok(())
}

async fn handle_rank(args: FormatArgs, config: &Config) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    let ranking = engine.rankings().await;

    match args.resolve(config) {
        ReportFormat::Table => println!("{}", analyzer::format_ranking(&ranking)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&ranking)?),
    }
    Ok(())
}

async fn handle_score(args: ScoreArgs, config: &Config) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    let analysis = engine.evaluate(&args.currency).await?;

    match args.output.resolve(config) {
        ReportFormat::Table => {
            let score = &analysis.score;
            println!("Currency:     {}", score.currency);
            println!("Report date:  {}", analysis.index.report_date);
            println!(
                "Index:        {} (window {}, range {} .. {})",
                score.index_value.round_dp(2),
                analysis.index.window_size,
                analysis.index.window_low,
                analysis.index.window_high
            );
            println!(
                "Momentum:     {} (baseline {} over {} weeks)",
                score.momentum_value.round_dp(0),
                analysis.momentum.baseline_average.round_dp(0),
                analysis.momentum.baseline_window
            );
            println!("Signal:       {}", analysis.signal);
            println!("Score:        {}", score.score.round_dp(4));
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
    }
    Ok(())
}

async fn handle_serve(args: ServeArgs, config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(build_engine(config).await?);
    web_server::run_server(args.addr, engine, config.cache.ttl).await
}
