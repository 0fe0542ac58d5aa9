//! weighit - Main Entry Point
//!
//! Command line front end for the donation kiosk: log weights, undo and redo
//! the last entry, print daily totals and manage sources and food types.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weighit::{
    config::{self, AppConfig},
    scale::{list_devices, ScaleReader, ScriptedTransport},
    store::{today_utc, LogStore},
    types::LogEntry,
};

/// Donation weighing kiosk
#[derive(Parser, Debug)]
#[command(name = "weighit", version, about, long_about = None)]
struct Cli {
    /// Database file (overrides WEIGHIT_DB_PATH and the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to ~/weighit/weighit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a simulated scale instead of the USB device
    #[arg(long, global = true)]
    simulate: bool,

    /// Print listings and totals as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log a donation with a known weight
    Log {
        source: String,
        #[arg(value_name = "TYPE")]
        food_type: String,
        /// Weight in pounds
        weight: f64,
        #[command(flatten)]
        temps: Temperatures,
    },
    /// Read a stable weight from the scale and log it
    Weigh {
        source: String,
        #[arg(value_name = "TYPE")]
        food_type: String,
        /// Seconds to wait for the scale to settle
        #[arg(long)]
        timeout: Option<f64>,
        #[command(flatten)]
        temps: Temperatures,
    },
    /// Soft-delete the most recent entry
    Undo,
    /// Restore the most recently deleted entry
    Redo,
    /// Per-type totals for one day
    Totals {
        /// Day to total (YYYY-MM-DD, UTC); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only count this source
        #[arg(long)]
        source: Option<String>,
        /// Show per-source totals instead
        #[arg(long, conflicts_with = "source")]
        by_source: bool,
    },
    /// Show the last entries, deleted ones included
    Tail {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Show the last active entries
    Recent {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Export active entries for a date range as CSV
    Export {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Manage donation sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Manage food types
    Type {
        #[command(subcommand)]
        action: TypeAction,
    },
    /// Inspect the scale
    Scale {
        #[command(subcommand)]
        action: ScaleAction,
    },
}

#[derive(Args, Debug)]
struct Temperatures {
    /// Temperature at pickup, Fahrenheit
    #[arg(long)]
    pickup_temp: Option<f64>,
    /// Temperature at dropoff, Fahrenheit
    #[arg(long)]
    dropoff_temp: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum SourceAction {
    List,
    Add { name: String },
}

#[derive(Subcommand, Debug)]
enum TypeAction {
    List,
    Add {
        name: String,
        #[arg(long, default_value_t = 0)]
        sort_order: i64,
        /// Entries of this type need pickup and dropoff temperatures
        #[arg(long)]
        requires_temp: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ScaleAction {
    /// List HID devices
    List,
    /// Print readings as they arrive
    Watch {
        /// Seconds to watch
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load_or_default(),
    };

    run(&cli, &config)
}

/// Stderr logging plus a daily log file under `~/weighit/logs`
///
/// The returned guard flushes the file writer; keep it alive until exit.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,weighit=info"));

    let (file_layer, guard) = match config::app_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "weighit.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn open_store(cli: &Cli, config: &AppConfig) -> anyhow::Result<LogStore> {
    let store = match &cli.db {
        Some(path) => LogStore::open_at(path)?,
        None => LogStore::open(&config.database)?,
    };
    Ok(store)
}

fn open_scale(cli: &Cli, config: &AppConfig) -> anyhow::Result<ScaleReader> {
    let reader = if cli.simulate {
        tracing::info!("Using simulated scale");
        ScaleReader::with_transport(Box::new(ScriptedTransport::settling(12.4)), &config.scale)?
    } else {
        ScaleReader::open(&config.scale)?
    };
    Ok(reader)
}

fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    match &cli.command {
        Command::Log {
            source,
            food_type,
            weight,
            temps,
        } => {
            let store = open_store(cli, config)?;
            log_weight(&store, source, food_type, *weight, temps)?;
        }
        Command::Weigh {
            source,
            food_type,
            timeout,
            temps,
        } => {
            let store = open_store(cli, config)?;
            let scale = open_scale(cli, config)?;
            let timeout = match timeout {
                Some(secs) => settle_timeout(*secs)?,
                None => config.scale.stable_timeout(),
            };

            let reading = scale.read_stable_weight(timeout);
            scale.close();

            let Some(reading) = reading else {
                bail!("No scale reading");
            };
            let Some(pounds) = reading.pounds() else {
                bail!("Scale reports an unknown unit ({})", reading.unit);
            };
            if !reading.is_stable {
                println!("Warning: scale did not settle, logging {}", reading);
            }
            log_weight(&store, source, food_type, pounds, temps)?;
        }
        Command::Undo => {
            let store = open_store(cli, config)?;
            match store.undo_last()? {
                Some(id) => println!("Undid entry #{}", id),
                None => println!("Nothing to undo"),
            }
        }
        Command::Redo => {
            let store = open_store(cli, config)?;
            match store.redo_last()? {
                Some(id) => println!("Restored entry #{}", id),
                None => println!("Nothing to redo"),
            }
        }
        Command::Totals {
            date,
            source,
            by_source,
        } => {
            let store = open_store(cli, config)?;
            let date = date.unwrap_or_else(today_utc);
            let totals = if *by_source {
                store.totals_per_source(date)?
            } else {
                store.totals_per_type(date, source.as_deref())?
            };
            let overall: f64 = totals.iter().map(|t| t.weight_lb).sum();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&totals)?);
            } else {
                println!("Totals for {}", date);
                for total in &totals {
                    println!("  {:<16} {:>8.2} lb", total.name, total.weight_lb);
                }
                println!("  {:<16} {:>8.2} lb", "All", overall);
            }
        }
        Command::Tail { count } => {
            let store = open_store(cli, config)?;
            print_entries(&store.history(*count)?, cli.json)?;
        }
        Command::Recent {
            count,
            source,
            date,
        } => {
            let store = open_store(cli, config)?;
            print_entries(&store.recent(*count, source.as_deref(), *date)?, cli.json)?;
        }
        Command::Export { start, end } => {
            if start > end {
                bail!("Start date {} is after end date {}", start, end);
            }
            let store = open_store(cli, config)?;
            println!("id,timestamp,weight_lb,source,type,temp_pickup_f,temp_dropoff_f");
            for entry in store.logs_between(*start, *end)? {
                println!(
                    "{},{},{:.2},{},{},{},{}",
                    entry.id,
                    entry.timestamp,
                    entry.weight_lb,
                    csv_field(&entry.source),
                    csv_field(&entry.food_type),
                    entry.temp_pickup_f.map(|t| t.to_string()).unwrap_or_default(),
                    entry.temp_dropoff_f.map(|t| t.to_string()).unwrap_or_default(),
                );
            }
        }
        Command::Source { action } => {
            let store = open_store(cli, config)?;
            match action {
                SourceAction::List => {
                    let sources = store.sources()?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&sources)?);
                    } else {
                        for source in sources {
                            println!("{:>3}  {}", source.id, source.name);
                        }
                    }
                }
                SourceAction::Add { name } => {
                    store.add_source(name)?;
                    println!("Source '{}' available", name);
                }
            }
        }
        Command::Type { action } => {
            let store = open_store(cli, config)?;
            match action {
                TypeAction::List => {
                    let types = store.types()?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&types)?);
                    } else {
                        for t in types {
                            println!(
                                "{:>3}  {:<16}{}",
                                t.sort_order,
                                t.name,
                                if t.requires_temp { " (temps required)" } else { "" }
                            );
                        }
                    }
                }
                TypeAction::Add {
                    name,
                    sort_order,
                    requires_temp,
                } => {
                    store.add_type(name, *sort_order, *requires_temp)?;
                    println!("Food type '{}' available", name);
                }
            }
        }
        Command::Scale { action } => match action {
            ScaleAction::List => {
                for device in list_devices()? {
                    println!("{}", device);
                }
            }
            ScaleAction::Watch { seconds } => {
                let scale = open_scale(cli, config)?;
                let deadline = Instant::now() + Duration::from_secs(*seconds);
                while Instant::now() < deadline {
                    match scale.latest() {
                        Some(reading) => println!("{}", reading),
                        None => println!("No reading"),
                    }
                    std::thread::sleep(Duration::from_millis(500));
                }
                let stats = scale.stats();
                scale.close();
                println!(
                    "{} decoded, {} discarded, {} transport errors",
                    stats.decoded, stats.discarded, stats.transport_errors
                );
            }
        },
    }
    Ok(())
}

/// Convert a `--timeout` in seconds, rejecting negative and unrepresentable values
fn settle_timeout(secs: f64) -> anyhow::Result<Duration> {
    if secs < 0.0 {
        bail!("Timeout must not be negative");
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid timeout {}", secs))
}

fn log_weight(
    store: &LogStore,
    source: &str,
    food_type: &str,
    weight: f64,
    temps: &Temperatures,
) -> anyhow::Result<()> {
    if weight.is_nan() || weight <= 0.0 {
        bail!("Weight must be positive, got {}", weight);
    }
    if let Some(kind) = store.food_type(food_type)? {
        kind.check_temperatures(temps.pickup_temp, temps.dropoff_temp)?;
    }

    let id = store.append(weight, source, food_type, temps.pickup_temp, temps.dropoff_temp)?;
    println!("Logged #{}: {:.2} lb {} from {}", id, weight, food_type, source);
    Ok(())
}

fn print_entries(entries: &[LogEntry], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    for entry in entries {
        println!(
            "{:>5}  {}  {:>8.2} lb  {:<16} {:<12}{}",
            entry.id,
            entry.timestamp,
            entry.weight_lb,
            entry.source,
            entry.food_type,
            if entry.deleted { "  [deleted]" } else { "" }
        );
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_timeout_accepts_seconds() {
        assert_eq!(settle_timeout(0.5).unwrap(), Duration::from_millis(500));
        assert_eq!(settle_timeout(0.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_settle_timeout_rejects_bad_values() {
        assert!(settle_timeout(-1.0).is_err());
        assert!(settle_timeout(f64::INFINITY).is_err());
        assert!(settle_timeout(1e20).is_err());
        assert!(settle_timeout(f64::NAN).is_err());
    }

    #[test]
    fn test_by_source_conflicts_with_source() {
        let result = Cli::try_parse_from(["weighit", "totals", "--by-source", "--source", "Aldi"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["weighit", "totals", "--by-source"]).unwrap();
        assert!(matches!(cli.command, Command::Totals { by_source: true, .. }));
    }

    #[test]
    fn test_weigh_timeout_flag_parses() {
        let cli =
            Cli::try_parse_from(["weighit", "weigh", "Wegmans", "Produce", "--timeout", "0.5"])
                .unwrap();
        assert!(matches!(cli.command, Command::Weigh { timeout: Some(t), .. } if t == 0.5));
    }
}
