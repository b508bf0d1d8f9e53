//! Serializable report payload.

use crate::report::aggregate::{Accumulator, MetricKind, Schema};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A rounded output value: three decimals for amounts, integers for counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Amount(f64),
    Count(i64),
}

impl MetricValue {
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::Amount(v) => v,
            MetricValue::Count(n) => n as f64,
        }
    }
}

/// Metric name → value, serialized as a JSON object in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable {
    schema: &'static Schema,
    prefix: &'static str,
    values: Vec<MetricValue>,
}

impl MetricTable {
    pub fn from_accumulator(acc: &Accumulator, prefix: &'static str) -> Self {
        let values = acc
            .iter()
            .map(|(metric, total)| match metric.kind {
                MetricKind::Amount => MetricValue::Amount(round_to(total, 3)),
                MetricKind::Count => MetricValue::Count(total.round() as i64),
            })
            .collect();

        Self {
            schema: acc.schema(),
            prefix,
            values,
        }
    }

    /// Looks a metric up by its schema name (without the prefix).
    pub fn get(&self, metric: &str) -> Option<MetricValue> {
        self.schema.index_of(metric).map(|i| self.values[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schema.metrics.iter().map(|m| m.name)
    }

    pub fn values(&self) -> &[MetricValue] {
        &self.values
    }
}

impl Serialize for MetricTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (metric, value) in self.schema.metrics.iter().zip(&self.values) {
            if self.prefix.is_empty() {
                map.serialize_entry(metric.name, value)?;
            } else {
                map.serialize_entry(&format!("{}{}", self.prefix, metric.name), value)?;
            }
        }
        map.end()
    }
}

/// One station's slice of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    pub station_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub totals: MetricTable,
    /// Grouping output key (e.g. `phases`) → grouping key → totals.
    #[serde(flatten)]
    pub groupings: BTreeMap<&'static str, BTreeMap<String, MetricTable>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total_summary: MetricTable,
    pub stations: Vec<StationReport>,
    pub timestamp: DateTime<Utc>,
}

impl Report {
    pub fn station(&self, name: &str) -> Option<&StationReport> {
        self.stations.iter().find(|s| s.station_name == name)
    }

    pub fn failed_stations(&self) -> usize {
        self.stations.iter().filter(|s| !s.success).count()
    }
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
