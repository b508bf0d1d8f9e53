//! Process settings read once at startup from the environment (and `.env`).

use crate::error::ConfigError;
use crate::registry::StationRegistry;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_STATIONS_FILE: &str = "stations.json";
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub stations_file: String,
    pub station_names: Option<String>,
    pub max_concurrency: usize,
    pub fetch_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stations_file: DEFAULT_STATIONS_FILE.to_string(),
            station_names: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads `STATIONS_FILE`, `STATION_NAMES`, `MAX_CONCURRENCY` and
    /// `FETCH_TIMEOUT_SECS` through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(path) = lookup("STATIONS_FILE").filter(|p| !p.trim().is_empty()) {
            settings.stations_file = path;
        }
        settings.station_names = lookup("STATION_NAMES").filter(|n| !n.trim().is_empty());

        if let Some(raw) = lookup("MAX_CONCURRENCY") {
            settings.max_concurrency = parse_positive("MAX_CONCURRENCY", &raw)?;
        }
        if let Some(raw) = lookup("FETCH_TIMEOUT_SECS") {
            let secs = parse_positive("FETCH_TIMEOUT_SECS", &raw)?;
            settings.fetch_timeout = Some(Duration::from_secs(secs as u64));
        }

        Ok(settings)
    }

    /// Loads the station registry: the JSON file when it exists, otherwise the
    /// `STATION_NAMES` environment table. Either way an empty result is an error.
    pub fn load_registry<F>(&self, lookup: F) -> Result<StationRegistry, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let registry = if Path::new(&self.stations_file).exists() {
            debug!(path = %self.stations_file, "Loading station registry from file");
            StationRegistry::load(&self.stations_file)?
        } else if let Some(names) = &self.station_names {
            debug!(names = %names, "Loading station registry from environment");
            StationRegistry::from_vars(names, lookup)?
        } else {
            return Err(ConfigError::EmptyRegistry);
        };

        registry.ensure_not_empty()?;
        info!(stations = registry.len(), "Station registry loaded");
        Ok(registry)
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
