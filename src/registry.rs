//! Station registry: the immutable table of stations a report fans out to.
//!
//! Stored as a plain JSON object on disk:
//! ```json
//! {
//!   "multan": { "address": "10.0.0.12:8080", "token": "..." },
//!   "lahore": { "address": "10.0.0.13", "token": "..." }
//! }
//! ```
//!
//! When no file is present the same table can be assembled from environment
//! variables (`STATION_NAMES=multan,lahore`, `MULTAN_ADDRESS`, `MULTAN_TOKEN`).

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Connection parameters for one remote geospatial server.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Station {
    #[serde(skip)]
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub token: String,
}

impl Station {
    pub fn new(id: impl Into<String>, address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            token: token.into(),
        }
    }

    /// Base URL of the station's GeoServer, with `http://` assumed when the
    /// configured address carries no scheme.
    pub fn base_url(&self) -> String {
        let address = self.address.trim().trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            format!("{address}/geoserver")
        } else {
            format!("http://{address}/geoserver")
        }
    }
}

impl fmt::Debug for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Station")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("token", &"REDACTED")
            .finish()
    }
}

/// Read-only mapping from station identifier to [`Station`].
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: BTreeMap<String, Arc<Station>>,
}

impl StationRegistry {
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Self {
        let stations = stations
            .into_iter()
            .map(|s| (s.id.clone(), Arc::new(s)))
            .collect();
        Self { stations }
    }

    /// Parses the JSON registry format shown in the module docs.
    pub fn from_json(path: &str, content: &str) -> Result<Self, ConfigError> {
        let entries: BTreeMap<String, Station> =
            serde_json::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;

        Ok(Self::new(entries.into_iter().map(|(id, mut station)| {
            station.id = id;
            station
        })))
    }

    /// Loads the registry from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(path, &content)
    }

    /// Builds the registry from `<ID>_ADDRESS` / `<ID>_TOKEN` pairs, one per
    /// comma-separated name in `names`. A missing address is an error, a
    /// missing token is allowed (open stations).
    pub fn from_vars<F>(names: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut stations = Vec::new();

        for id in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let prefix = id.to_uppercase();
            let address_var = format!("{prefix}_ADDRESS");
            let address = lookup(&address_var)
                .filter(|a| !a.trim().is_empty())
                .ok_or(ConfigError::MissingVariable(address_var))?;
            let token = lookup(&format!("{prefix}_TOKEN")).unwrap_or_default();

            stations.push(Station::new(id, address, token));
        }

        Ok(Self::new(stations))
    }

    /// All stations keyed by identifier.
    pub fn get_stations(&self) -> &BTreeMap<String, Arc<Station>> {
        &self.stations
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Station>> {
        self.stations.get(id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Fails with [`ConfigError::EmptyRegistry`] when there is nothing to query.
    pub fn ensure_not_empty(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            Err(ConfigError::EmptyRegistry)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_json_assigns_ids() {
        let json = r#"{
            "multan": { "address": "10.0.0.1", "token": "abc" },
            "lahore": { "address": "http://10.0.0.2:8080/" }
        }"#;
        let registry = StationRegistry::from_json("stations.json", json).unwrap();

        assert_eq!(registry.len(), 2);
        let multan = registry.get("multan").unwrap();
        assert_eq!(multan.id, "multan");
        assert_eq!(multan.token, "abc");
        assert_eq!(registry.get("lahore").unwrap().token, "");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = StationRegistry::from_json("stations.json", "[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_base_url_adds_scheme() {
        let plain = Station::new("a", "10.0.0.1:8080", "");
        assert_eq!(plain.base_url(), "http://10.0.0.1:8080/geoserver");

        let schemed = Station::new("b", "https://gis.example.org/", "");
        assert_eq!(schemed.base_url(), "https://gis.example.org/geoserver");
    }

    #[test]
    fn test_debug_hides_token() {
        let station = Station::new("a", "10.0.0.1", "super-secret");
        let printed = format!("{station:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MULTAN_ADDRESS", "10.0.0.1"),
            ("MULTAN_TOKEN", "t1"),
            ("KARACHI_CITY_ADDRESS", "10.0.0.2"),
        ]);
        let registry = StationRegistry::from_vars(" multan, karachi_city ,", |k| {
            vars.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("multan").unwrap().token, "t1");
        assert_eq!(registry.get("karachi_city").unwrap().token, "");
    }

    #[test]
    fn test_from_vars_missing_address() {
        let err = StationRegistry::from_vars("quetta", |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(v) if v == "QUETTA_ADDRESS"));
    }

    #[test]
    fn test_empty_registry_is_config_error() {
        let registry = StationRegistry::default();
        assert!(matches!(
            registry.ensure_not_empty(),
            Err(ConfigError::EmptyRegistry)
        ));
    }
}
