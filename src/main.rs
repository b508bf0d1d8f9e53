//! CLI entry point for the station rollup tool.
//!
//! Provides subcommands for building a consolidated report across every
//! configured station, listing the station registry, and probing a single
//! station's connectivity.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use station_rollup::config::Settings;
use station_rollup::fetch::{BasicClient, WfsFetcher};
use station_rollup::orchestrator::Orchestrator;
use station_rollup::output::{append_station_rows, print_pretty, write_json};
use station_rollup::probe::check_station;
use station_rollup::report::ReportKind;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "station_rollup")]
#[command(about = "Consolidated metrics across GeoServer stations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one consolidated report across every configured station
    Report {
        /// Report kind to build
        #[arg(value_enum)]
        kind: ReportKind,

        /// Write the JSON report to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Also append one CSV row per station to this file
        #[arg(long)]
        csv: Option<String>,

        /// Maximum number of concurrent station queries (overrides MAX_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// List configured stations
    ListStations,
    /// Check connectivity to one station
    CheckStation {
        /// Station identifier as configured in the registry
        #[arg(value_name = "STATION")]
        station: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/station_rollup.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("station_rollup.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let registry = settings
        .load_registry(|name| std::env::var(name).ok())
        .context("could not load station registry")?;

    match cli.command {
        Commands::Report {
            kind,
            output,
            csv,
            concurrency,
        } => {
            let client = BasicClient::new()?;
            let mut orchestrator = Orchestrator::new(
                Arc::new(WfsFetcher::new(client)),
                concurrency.unwrap_or(settings.max_concurrency),
            );
            if let Some(timeout) = settings.fetch_timeout {
                orchestrator = orchestrator.with_fetch_timeout(timeout);
            }

            info!(
                report = %kind,
                stations = registry.len(),
                max_concurrency = orchestrator.max_concurrency(),
                "Starting report"
            );
            let report = orchestrator.run(&registry, kind).await?;
            print_pretty(&report);

            match output {
                Some(path) => {
                    write_json(&path, &report)?;
                    info!(path = %path, "Report saved");
                }
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }

            if let Some(path) = csv {
                append_station_rows(&path, &report)?;
            }

            info!(
                report = %kind,
                stations = report.stations.len(),
                failed = report.failed_stations(),
                "Report complete"
            );
        }
        Commands::ListStations => {
            for station in registry.get_stations().values() {
                info!(
                    station = %station.id,
                    address = %station.address,
                    has_token = !station.token.is_empty(),
                    "Station"
                );
            }
            info!(total = registry.len(), "Station list summary");
        }
        Commands::CheckStation { station } => {
            let station = registry
                .get(&station)
                .with_context(|| format!("station {station} not found in registry"))?;
            let client = BasicClient::new()?;
            let report = check_station(&client, station).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
