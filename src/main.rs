//! `places2go` command line interface
//!
//! Loads the configured data directory and prints summaries, merged views,
//! flight searches and data-quality reports.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use places2go::fetch::FlightFetcher;
use places2go::{
    check_integrity, logging, CostRecord, DashboardConfig, DashboardError, DataLoader, Destination, FileCache,
    FlightQuote, Frame, JoinMode, LoadOptions, Table, WeatherObservation,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "places2go")]
#[command(version, about = "Travel destination data: flights, weather and cost of living", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "PLACES2GO_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory, overriding the configured one
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of aligned text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-destination cost, flight and weather statistics
    Summary {
        /// Source tag to restrict to
        #[arg(long)]
        source: Option<String>,
    },
    /// Source tags present in each dataset
    Sources,
    /// Destinations joined with latest costs, flights and weather
    Merged {
        #[arg(long)]
        source: Option<String>,
        /// Join mode (left, inner, outer)
        #[arg(long, default_value = "left")]
        mode: JoinMode,
        /// Maximum number of rows to print
        #[arg(long)]
        limit: Option<usize>,
        /// Columns to print, comma separated, in the order given
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Cheapest flights per destination from an origin airport
    Flights {
        /// Origin airport code
        #[arg(long)]
        origin: String,
        /// Destination airport codes, comma separated
        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,
        /// Departure date (YYYY-MM-DD); requires --return
        #[arg(long, requires = "return_date")]
        depart: Option<NaiveDate>,
        /// Return date (YYYY-MM-DD); requires --depart
        #[arg(long = "return", requires = "depart")]
        return_date: Option<NaiveDate>,
        /// Quotes per destination
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Data-quality report across all datasets
    Check,
    /// Remove every persisted provider response
    ClearCache,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = err
                .downcast_ref::<DashboardError>()
                .map_or_else(|| format!("{err:#}"), DashboardError::user_message);
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = DashboardConfig::load_from_path(cli.config.clone())?;
    if let Some(dir) = &cli.data_dir {
        config.data.dir.clone_from(dir);
    }
    let _guard = logging::init(&config.logging)?;
    debug!(data_dir = %config.data.dir.display(), "Configuration loaded");

    let mut loader = DataLoader::from_config(&config);
    let default_source = config.data.default_source.clone();

    match cli.command {
        Commands::Summary { source } => {
            let source = source.or(default_source);
            let summary = loader.aggregates(source.as_deref())?;
            print_frame(&summary, cli.json)?;
        }
        Commands::Sources => {
            let sources = loader.available_data_sources()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sources)?);
            } else {
                for (dataset, tags) in sources {
                    println!("{:<12} {}", dataset.name(), tags.join(", "));
                }
            }
        }
        Commands::Merged {
            source,
            mode,
            limit,
            columns,
        } => {
            let source = source.or(default_source);
            let mut merged = loader.load_all(source.as_deref(), mode)?;
            if !columns.is_empty() {
                merged = merged.project(&columns.iter().map(String::as_str).collect::<Vec<_>>())?;
            }
            let merged = match limit {
                Some(n) => merged.select_rows(&(0..n.min(merged.len())).collect::<Vec<_>>()),
                None => merged,
            };
            print_frame(&merged, cli.json)?;
        }
        Commands::Flights {
            origin,
            to,
            depart,
            return_date,
            limit,
        } => {
            let mut fetcher = FlightFetcher::from_config(&config)?;
            let dates = depart.zip(return_date);
            let quotes = fetcher.cheapest_flights(&mut loader, &origin, &to, dates, limit)?;
            print_frame(&quotes.to_frame(), cli.json)?;
        }
        Commands::Check => {
            let all = LoadOptions::new();
            let destinations: Table<Destination> = loader.load(&all)?;
            let costs: Table<CostRecord> = loader.load(&all)?;
            let flights: Table<FlightQuote> = loader.load(&all)?;
            let weather: Table<WeatherObservation> = loader.load(&all)?;
            let report = check_integrity(&destinations, &costs, &flights, &weather);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
                println!("{}", if report.is_clean() { "clean" } else { "issues found" });
            }
        }
        Commands::ClearCache => {
            let mut removed = 0;
            for scope in ["flights", "weather", "costs"] {
                let dir = Path::new(&config.cache.location).join(scope);
                let cache = FileCache::new(&dir, config.cache.ttl())
                    .with_context(|| format!("Failed to open cache directory: {}", dir.display()))?;
                removed += cache.clear()?;
            }
            println!("Removed {removed} cached responses");
        }
    }
    Ok(())
}

fn print_frame(frame: &Frame, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&frame.to_json())?);
        return Ok(());
    }

    let cells: Vec<Vec<String>> = frame
        .rows()
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    let widths: Vec<usize> = frame
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .fold(name.len(), usize::max)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    println!("{}", line(frame.columns().iter().map(String::as_str).collect()));
    for row in &cells {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!("({} rows)", frame.len());
    Ok(())
}
