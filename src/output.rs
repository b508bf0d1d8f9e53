//! Output formatting and persistence for composed reports.
//!
//! Supports pretty-printing, JSON files, and a per-station CSV append.

use anyhow::Result;
use tracing::{debug, info};

use crate::report::Report;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs the report using Rust's debug pretty-print format.
pub fn print_pretty(report: &Report) {
    debug!("{:#?}", report);
}

/// Logs the report as pretty-printed JSON.
pub fn print_json(report: &Report) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Writes the report as pretty-printed JSON, replacing `path`.
pub fn write_json(path: &str, report: &Report) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_vec_pretty(report)?)?;
    debug!(path, "Report written");
    Ok(())
}

/// Appends one row per station to a CSV file: timestamp, station, success,
/// error, then every metric of the report's schema.
///
/// Creates the file with headers if it does not already exist.
pub fn append_station_rows(path: &str, report: &Report) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    if !file_exists {
        let mut header = vec![
            "timestamp".to_string(),
            "station_name".to_string(),
            "success".to_string(),
            "error".to_string(),
        ];
        header.extend(report.total_summary.names().map(str::to_string));
        writer.write_record(&header)?;
    }

    let timestamp = report.timestamp.to_rfc3339();
    for station in &report.stations {
        let mut row = vec![
            timestamp.clone(),
            station.station_name.clone(),
            station.success.to_string(),
            station.error.clone().unwrap_or_default(),
        ];
        row.extend(station.totals.values().iter().map(|v| v.as_f64().to_string()));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
