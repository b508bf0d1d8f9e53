use crate::error::FetchError;
use crate::report::aggregate::{Accumulator, StationAggregate};
use crate::report::kinds::ReportDescriptor;
use crate::report::types::{MetricTable, Report, StationReport};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A failed dataset query, kept for the station's error annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetFailure {
    pub layer: &'static str,
    pub error: FetchError,
}

/// Final state of one station once all of its datasets have reported.
#[derive(Debug, Clone, PartialEq)]
pub struct StationOutcome {
    pub station: String,
    pub result: Result<StationAggregate, Vec<DatasetFailure>>,
}

impl StationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Error annotation for a failed station. Single-dataset kinds get the bare
/// error; multi-dataset kinds name the failing layer.
pub fn describe_failures(single_dataset: bool, failures: &[DatasetFailure]) -> String {
    if single_dataset && failures.len() == 1 {
        return failures[0].error.to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.layer, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builds the output payload. Pure; stations are ordered by identifier.
///
/// Every accumulator must belong to `descriptor`'s schema; anything else is a
/// caller bug and panics.
pub fn compose(
    descriptor: &ReportDescriptor,
    global: &Accumulator,
    mut stations: Vec<StationOutcome>,
    timestamp: DateTime<Utc>,
) -> Report {
    assert_eq!(
        global.schema(),
        descriptor.schema,
        "global accumulator does not match report schema"
    );

    stations.sort_by(|a, b| a.station.cmp(&b.station));

    let single_dataset = descriptor.datasets.len() == 1;
    let stations = stations
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(aggregate) => station_report(descriptor, outcome.station, &aggregate),
            Err(failures) => StationReport {
                station_name: outcome.station,
                success: false,
                error: Some(describe_failures(single_dataset, &failures)),
                totals: MetricTable::from_accumulator(&Accumulator::zeroed(descriptor.schema), ""),
                groupings: descriptor
                    .groupings
                    .iter()
                    .map(|name| (*name, BTreeMap::new()))
                    .collect(),
            },
        })
        .collect();

    Report {
        total_summary: MetricTable::from_accumulator(global, descriptor.summary_prefix),
        stations,
        timestamp,
    }
}

fn station_report(
    descriptor: &ReportDescriptor,
    station: String,
    aggregate: &StationAggregate,
) -> StationReport {
    assert_eq!(
        aggregate.totals.schema(),
        descriptor.schema,
        "station accumulator does not match report schema"
    );

    let groupings = descriptor
        .groupings
        .iter()
        .zip(&aggregate.groups)
        .map(|(name, groups)| {
            let tables = groups
                .iter()
                .map(|(key, acc)| (key.clone(), MetricTable::from_accumulator(acc, "")))
                .collect();
            (*name, tables)
        })
        .collect();

    StationReport {
        station_name: station,
        success: true,
        error: None,
        totals: MetricTable::from_accumulator(&aggregate.totals, ""),
        groupings,
    }
}
