//! Error taxonomy for report generation.
//!
//! Fetch failures are per-station and never abort a report. Configuration
//! errors and schema violations do.

use std::time::Duration;
use thiserror::Error;

/// Outcome of a failed dataset query against one station.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("station unreachable: {0}")]
    Unreachable(String),

    #[error("station returned HTTP status {code}")]
    BadStatus { code: u16 },

    #[error("malformed feature collection: {0}")]
    MalformedBody(String),
}

impl FetchError {
    /// Short machine-readable tag, used in CSV exports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Unreachable(_) => "unreachable",
            FetchError::BadStatus { .. } => "bad_status",
            FetchError::MalformedBody(_) => "malformed_body",
        }
    }
}

/// Problems with the station registry or process settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("station registry is empty")]
    EmptyRegistry,

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment variable {0} is not set")]
    MissingVariable(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Two accumulators of different report kinds met in one merge. Always a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("accumulator schema mismatch: expected `{expected}`, found `{found}`")]
pub struct SchemaViolation {
    pub expected: &'static str,
    pub found: &'static str,
}

/// Fatal errors that abort a whole report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}
