//! RENTWATCH: car-rental price watcher
//!
//! Entry point. Parses the command line, loads configuration, initialises
//! structured logging, and dispatches to a single cycle, the watch loop,
//! the stats report, an HTML dump or the dashboard server.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use rentwatch::analysis::get_stats;
use rentwatch::config::{AppConfig, MAX_POLL_INTERVAL_MINUTES};
use rentwatch::dashboard::{self, DashboardState};
use rentwatch::engine::report::{cycle_summary, stats_summary};
use rentwatch::engine::Orchestrator;
use rentwatch::fetcher::rentalcars::RentalcarsClient;
use rentwatch::notify::AlertDispatcher;
use rentwatch::storage::{RunFilter, RunStore};
use rentwatch::types::{CycleOutcome, Observation, RunRecord};

const BANNER: &str = r#"
 ___ ___ _  _ _______      ___ _____ ___ _  _
| _ \ __| \| |_   _\ \    / /_\_   _/ __| || |
|   / _|| .` | | |  \ \/\/ / _ \| || (__| __ |
|_|_\___|_|\_| |_|   \_/\_/_/ \_\_| \___|_||_|

  Car-rental price watcher
"#;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "rentwatch", about, version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "RENTWATCH_CONFIG",
        default_value = "config.toml",
        value_name = "PATH"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch prices once, record the run, alert if cheap, and exit
    Once {
        /// Print the run as one JSON object; exit 1 when no price was found
        #[arg(long)]
        json: bool,
    },
    /// Fetch on a fixed interval until interrupted
    Watch {
        /// Minutes between runs (overrides the config file)
        #[arg(
            long,
            value_name = "N",
            value_parser = clap::value_parser!(u64).range(1..=MAX_POLL_INTERVAL_MINUTES)
        )]
        poll_minutes: Option<u64>,
    },
    /// Print statistics for the configured rental window
    Stats,
    /// Save the raw search-results HTML for debugging extraction
    DumpHtml {
        /// Output file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Serve the dashboard and ingest endpoint
    Serve {
        /// Listen port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    // Initialise structured logging
    init_logging();

    let cfg = AppConfig::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        location = %cfg.location.iata,
        window = %cfg.window(),
        rental_days = cfg.rental_days(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Once { json } => run_once(&cfg, json).await,
        Command::Watch { poll_minutes } => {
            let minutes = poll_minutes.unwrap_or(cfg.watch.poll_interval_minutes);
            watch(&cfg, minutes).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            print_stats(&cfg).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::DumpHtml { output } => {
            let client = RentalcarsClient::new(&cfg)?;
            let path = client.dump_page(output.as_deref()).await?;
            println!("Saved HTML to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { port } => {
            serve(&cfg, port.unwrap_or(cfg.dashboard.port)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn open_store(cfg: &AppConfig) -> Result<RunStore> {
    RunStore::open(&cfg.storage.db_path)
        .await
        .with_context(|| format!("Failed to open run store at {}", cfg.storage.db_path.display()))
}

/// Wire the rentalcars fetcher, the run store and the alert dispatcher.
async fn build_orchestrator(cfg: &AppConfig) -> Result<Orchestrator> {
    let store = open_store(cfg).await?;
    let fetcher = RentalcarsClient::new(cfg)?;
    let notifier = AlertDispatcher::new(
        cfg.label(),
        cfg.watch.cheap_percentile,
        cfg.watch.desktop_notify,
    );
    Ok(Orchestrator::new(
        Box::new(fetcher),
        Box::new(notifier),
        store,
        cfg.watch.cheap_percentile,
    ))
}

async fn run_once(cfg: &AppConfig, json: bool) -> Result<ExitCode> {
    let orchestrator = build_orchestrator(cfg).await?;
    let outcome = orchestrator.run_once().await?;

    if !json {
        print_outcome(&cfg.label(), &outcome);
        return Ok(ExitCode::SUCCESS);
    }

    let record = RunRecord::from_outcome(
        &outcome,
        Observation::empty(&cfg.window(), cfg.rental_days(), cfg.search_url()),
        Utc::now(),
    );
    println!("{}", serde_json::to_string(&record)?);

    Ok(if record.has_price() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn watch(cfg: &AppConfig, poll_minutes: u64) -> Result<()> {
    println!("{BANNER}");

    let orchestrator = build_orchestrator(cfg).await?;

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            orchestrator.store().clone(),
            cfg.window(),
            cfg.watch.cheap_percentile,
        ));
        dashboard::spawn_dashboard(state, cfg.dashboard.port);
    }

    let label = cfg.label();
    let interval = Duration::from_secs(poll_minutes.saturating_mul(60));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(poll_minutes, "Entering watch loop. Press Ctrl+C to stop.");

    tokio::select! {
        res = orchestrator.watch(interval, |outcome| print_outcome(&label, outcome)) => {
            res.context("Watch loop stopped")?;
        }
        _ = &mut shutdown => {
            info!("Shutdown signal received.");
        }
    }

    info!("RENTWATCH shut down cleanly.");
    Ok(())
}

async fn print_stats(cfg: &AppConfig) -> Result<()> {
    let store = open_store(cfg).await?;
    let window = cfg.window();
    let runs = store.list(&RunFilter::window(&window)).await?;
    let history: Vec<f64> = runs.iter().filter_map(|r| r.min_price_per_day).collect();
    let stats = get_stats(&history);

    println!("{}", stats_summary(&cfg.label(), &window, &stats, &runs));
    Ok(())
}

async fn serve(cfg: &AppConfig, port: u16) -> Result<()> {
    let store = open_store(cfg).await?;
    let state = Arc::new(DashboardState::new(
        store,
        cfg.window(),
        cfg.watch.cheap_percentile,
    ));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tokio::select! {
        res = dashboard::serve(state, port) => res?,
        _ = &mut shutdown => info!("Shutdown signal received."),
    }
    Ok(())
}

/// Print the human-readable result of one cycle.
fn print_outcome(label: &str, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed(report) => println!("{}", cycle_summary(label, report)),
        CycleOutcome::NoResult(reason) => {
            warn!(%reason, "No result this run");
            println!("\n--- {label} ---\nNo result: {reason}");
        }
    }
}

/// Initialise the `tracing` subscriber. Logs go to stderr so that stdout
/// carries only reports and `--json` output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rentwatch=info"));

    let json_logging = std::env::var("RENTWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
