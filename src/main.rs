//! job-digest binary: one-shot ingest runs, score maintenance and the admin HTTP surface.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use job_digest::api::{create_router, AppState};
use job_digest::config::AppConfig;
use job_digest::digest;
use job_digest::fetch::ResilientClient;
use job_digest::ingest::registry::{build_adapters, SourceSecrets};
use job_digest::metrics::Metrics;
use job_digest::notify::build_notifier;
use job_digest::pipeline::{recompute_scores, Pipeline};
use job_digest::scoring::{load_weights_file, Weights};
use job_digest::store::{JobStore, JsonFileStore};

#[derive(Parser)]
#[command(name = "job-digest")]
#[command(author, version, about = "Collect, score and digest job postings", long_about = None)]
struct Cli {
    /// Config file (defaults to DIGEST_CONFIG_PATH, then config/digest.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every enabled source once, store new postings and send the digest
    Run {
        /// Collect and score but do not notify or mark anything as sent
        #[arg(long)]
        dry_run: bool,
    },

    /// Recompute stored totals under new weights
    Recompute {
        #[arg(long)]
        money: Option<f64>,
        #[arg(long)]
        passion: Option<f64>,
        #[arg(long)]
        location: Option<f64>,
        /// JSON file with {"money", "passion", "location"}
        #[arg(long, conflicts_with_all = ["money", "passion", "location"])]
        weights_file: Option<PathBuf>,
    },

    /// Recompute every score component from stored raw fields
    Rescore,

    /// Print the current top-N without sending it
    Digest {
        #[arg(short, long)]
        n: Option<usize>,
    },

    /// Serve the admin HTTP surface
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

/// Compact logs by default, JSON lines with DIGEST_LOG_JSON=1.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("job_digest=info,warn"));
    let json = std::env::var("DIGEST_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load_default(),
    }
}

fn open_store(cfg: &AppConfig) -> Result<JsonFileStore> {
    let path = &cfg.run.store_path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
    }
    JsonFileStore::open(path).with_context(|| format!("opening store {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run { dry_run } => {
            let client = ResilientClient::from_config(&cfg.fetch).context("building HTTP client")?;
            let sources = build_adapters(&cfg.sources, &client, &SourceSecrets::from_env());
            let notifier = (!dry_run).then(|| build_notifier(&cfg.notify, &client));
            let mut store = open_store(&cfg)?;
            let pipeline = Pipeline::new(cfg).context("invalid configuration")?;

            let summary = pipeline
                .run_once(&sources, &mut store, notifier.as_deref())
                .await?;
            println!("{summary}");
        }
        Commands::Recompute {
            money,
            passion,
            location,
            weights_file,
        } => {
            let mut store = open_store(&cfg)?;
            let weights = match weights_file {
                Some(path) => load_weights_file(&path)
                    .with_context(|| format!("reading weights from {}", path.display()))?,
                None => {
                    let base = store.weights().unwrap_or(cfg.scoring.weights);
                    Weights::new(
                        money.unwrap_or(base.money),
                        passion.unwrap_or(base.passion),
                        location.unwrap_or(base.location),
                    )
                }
            };
            let n = recompute_scores(&mut store, &weights)?;
            store.flush()?;
            println!("recomputed {n} posting(s)");
        }
        Commands::Rescore => {
            let mut store = open_store(&cfg)?;
            let pipeline = Pipeline::new(cfg).context("invalid configuration")?;
            let n = pipeline.rescore(&mut store);
            store.flush()?;
            println!("rescored {n} posting(s)");
        }
        Commands::Digest { n } => {
            let store = open_store(&cfg)?;
            let picked = digest::select(&store.all(), n.unwrap_or(cfg.run.digest_size));
            for (i, item) in digest::items(&picked).iter().enumerate() {
                println!(
                    "{:>2}. {:>4.1}  {}  ({}, {})  [{}]\n    {}",
                    i + 1,
                    item.total,
                    item.title,
                    item.company,
                    item.location,
                    item.source,
                    item.url
                );
            }
            if picked.is_empty() {
                println!("no unsent postings");
            }
        }
        Commands::Serve { addr } => {
            let metrics = Metrics::install()?;
            let store = open_store(&cfg)?;
            let state = AppState::new(Box::new(store), cfg.run.digest_size);
            let router = create_router(state, Some(&metrics));

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "admin server listening");
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}
