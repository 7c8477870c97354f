//! Cardsort command line interface
//! Runs sorting batches and inspects the scan record store

use anyhow::{anyhow, bail};
use cardsort_arm::SafetyValidator;
use cardsort_core::{ScanRecord, WaypointName};
use cardsort_pipeline::{open_store, LoggingConfig, Orchestrator, SorterConfig};
use cardsort_storage::{ScanQuery, ScanStore};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status of a batch that halted on a fault
const EXIT_HALTED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "cardsort")]
#[command(about = "Card sorting cell - pick, scan, identify and sort cards", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML or TOML); defaults to config/settings.yaml
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sort a batch of cards
    Run {
        /// Number of cards; defaults to pipeline.batch_size
        #[arg(long = "cards", short = 'n')]
        cards: Option<u32>,

        /// Simulated arm, no hardware required
        #[arg(long, short)]
        simulation: bool,
    },

    /// Show statistics over all scan records
    Stats,

    /// Show the most recent scan records
    Recent {
        #[arg(long, short, default_value = "10")]
        limit: usize,
    },

    /// Search scan records
    Search {
        /// Substring of the card code
        #[arg(long)]
        code: Option<String>,

        /// Only accepted cards
        #[arg(long, conflicts_with = "rejected")]
        accepted: bool,

        /// Only rejected cards
        #[arg(long)]
        rejected: bool,

        #[arg(long)]
        min_confidence: Option<f64>,

        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,

        /// End date, inclusive (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        until: Option<String>,

        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Back up the scan record store
    Backup {
        /// Destination file; defaults to a timestamped file in the backup directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and check every waypoint against the envelope
    CheckConfig {
        /// Print the effective configuration
        #[arg(long, short)]
        print: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = SorterConfig::load_or_default(cli.config.as_deref())?;
    init_logging(cli.debug, &config.logging);

    match cli.command {
        Commands::Run { cards, simulation } => {
            if run_batch(&config, cards, simulation).await? {
                std::process::exit(EXIT_HALTED);
            }
        }
        Commands::Stats => {
            let stats = open_store(&config.storage).statistics().await?;
            println!("{}", stats);
        }
        Commands::Recent { limit } => {
            let records = open_store(&config.storage).query(&ScanQuery::recent(limit)).await?;
            print_records(&records);
        }
        Commands::Search {
            code,
            accepted,
            rejected,
            min_confidence,
            since,
            until,
            limit,
        } => {
            let query = ScanQuery {
                code_contains: code,
                accepted: match (accepted, rejected) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                since: since.as_deref().map(|s| parse_bound(s, false)).transpose()?,
                until: until.as_deref().map(|s| parse_bound(s, true)).transpose()?,
                min_confidence,
                limit,
            };
            let records = open_store(&config.storage).query(&query).await?;
            print_records(&records);
        }
        Commands::Backup { output } => {
            let path = open_store(&config.storage).backup(output.as_deref()).await?;
            println!("Backup written to {}", path.display());
        }
        Commands::CheckConfig { print } => {
            check_config(&config, print)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins, then `--debug`, then the configured level
fn init_logging(debug: bool, logging: &LoggingConfig) {
    let default = if debug { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run one batch; returns whether it halted
async fn run_batch(config: &SorterConfig, cards: Option<u32>, simulation: bool) -> anyhow::Result<bool> {
    let cards = cards.unwrap_or(config.pipeline.batch_size);
    if cards == 0 {
        bail!("Number of cards must be greater than 0");
    }

    let mut orchestrator = Orchestrator::from_config(config, simulation)?;
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current card");
            cancel.cancel();
        }
    });

    let outcome = orchestrator.run_batch(cards).await;
    orchestrator.shutdown().await;
    let summary = outcome?;

    println!("{}", summary);
    if summary.is_halted() {
        warn!("Batch halted, see the report above before restarting");
    } else {
        info!("Batch done");
    }
    Ok(summary.is_halted())
}

fn check_config(config: &SorterConfig, print: bool) -> anyhow::Result<()> {
    let safety = SafetyValidator::new(config.arm.envelope);
    let mut violations = 0;

    println!("Waypoints:");
    for name in WaypointName::ALL {
        let waypoint = config.arm.waypoints.get(name);
        match safety.validate_waypoint(name, waypoint) {
            Ok(()) => println!("  {:<14} {}  ok", name.as_str(), waypoint.pose),
            Err(e) => {
                violations += 1;
                println!("  {:<14} {}  {}", name.as_str(), waypoint.pose, e);
            }
        }
    }

    if print {
        println!("{}", serde_yaml::to_string(config)?);
    }

    if violations > 0 {
        bail!("{} waypoint(s) outside the workspace envelope", violations);
    }
    println!("Configuration OK");
    Ok(())
}

fn print_records(records: &[ScanRecord]) {
    if records.is_empty() {
        println!("No records");
        return;
    }

    println!(
        "{:<19}  {:>4}  {:<16}  {:>5}  {:<8}  {:<7}  Outcome",
        "Time", "Card", "Code", "Conf", "Accepted", "Pile"
    );
    for record in records {
        println!(
            "{:<19}  {:>4}  {:<16}  {:>5.2}  {:<8}  {:<7}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.card_index,
            record.normalized_code.as_deref().unwrap_or("-"),
            record.confidence,
            if record.accepted { "yes" } else { "no" },
            record.destination.map(|p| p.as_str()).unwrap_or("-"),
            record.outcome
        );
    }
    println!("{} record(s)", records.len());
}

/// Date or timestamp; a bare `--until` date covers the whole day
fn parse_bound(value: &str, end_of_day: bool) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| anyhow!("Invalid time of day"))?;
    Ok(date.and_time(time).and_utc())
}
