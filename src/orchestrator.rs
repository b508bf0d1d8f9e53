//! Concurrent fan-out of dataset queries and fan-in of station results.
//!
//! One task per (station × dataset) fetches and folds into a private partial
//! aggregate. The coordinating task is the only writer of shared state: it
//! merges partials per station and, once a station has reported every
//! dataset, merges it into the global accumulator if nothing failed.

use crate::error::{FetchError, ReportError, SchemaViolation};
use crate::fetch::{DatasetRequest, FeatureSource};
use crate::registry::StationRegistry;
use crate::report::kinds::{ReportDescriptor, ReportKind};
use crate::report::{Accumulator, DatasetFailure, Report, StationAggregate, StationOutcome, compose};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

pub struct Orchestrator {
    source: Arc<dyn FeatureSource>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    fetch_timeout: Option<Duration>,
}

impl Orchestrator {
    /// `max_concurrency` caps in-flight dataset queries across every report
    /// this orchestrator runs. Zero is treated as one.
    pub fn new(source: Arc<dyn FeatureSource>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            source,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            fetch_timeout: None,
        }
    }

    /// Overrides every report kind's per-request timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Builds one report over every station in `registry`.
    ///
    /// Station failures are reported inside the result. Only an empty
    /// registry or a schema violation (a bug) fails the call.
    #[tracing::instrument(skip(self, registry), fields(report = %kind, stations = registry.len()))]
    pub async fn run(
        &self,
        registry: &StationRegistry,
        kind: ReportKind,
    ) -> Result<Report, ReportError> {
        registry.ensure_not_empty()?;

        let descriptor = kind.descriptor();
        let timeout = self.fetch_timeout.unwrap_or(descriptor.timeout);
        let started = Instant::now();

        let mut pending: BTreeMap<String, PendingStation> = registry
            .get_stations()
            .keys()
            .map(|id| (id.clone(), PendingStation::new(descriptor)))
            .collect();

        let mut tasks = JoinSet::new();
        for station in registry.get_stations().values() {
            for dataset in descriptor.datasets {
                let request = DatasetRequest {
                    station: station.clone(),
                    dataset,
                    timeout,
                };
                let span = tracing::info_span!(
                    "fetch_dataset",
                    station = %station.id,
                    layer = dataset.layer,
                );
                tasks.spawn(
                    run_dataset(
                        self.source.clone(),
                        self.permits.clone(),
                        descriptor,
                        request,
                    )
                    .instrument(span),
                );
            }
        }

        info!(
            requests = tasks.len(),
            max_concurrency = self.max_concurrency,
            timeout_ms = timeout.as_millis() as u64,
            "Dispatched dataset requests"
        );

        let mut global = Accumulator::zeroed(descriptor.schema);
        let mut outcomes = Vec::with_capacity(pending.len());

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    error!(error = %e, "Dataset worker cancelled");
                    continue;
                }
            };

            let result = match outcome.result {
                Ok(partial) => Ok(partial),
                Err(DatasetError::Fetch(e)) => Err(e),
                Err(DatasetError::Schema(v)) => return Err(v.into()),
            };

            let Some(station) = pending.get_mut(&outcome.station) else {
                continue;
            };
            station.record(outcome.layer, result)?;

            if station.remaining == 0 {
                if let Some(station) = pending.remove(&outcome.station) {
                    let finished = station.finish(outcome.station);
                    if let Ok(aggregate) = &finished.result {
                        global.merge(&aggregate.totals)?;
                    }
                    outcomes.push(finished);
                }
            }
        }

        // Only reachable if a worker was cancelled before reporting.
        for (id, mut station) in pending {
            warn!(station = %id, "Station has datasets that never reported");
            station.failures.push(DatasetFailure {
                layer: "worker",
                error: FetchError::Unreachable("dataset worker cancelled".to_string()),
            });
            outcomes.push(station.finish(id));
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            stations = outcomes.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report assembled"
        );

        Ok(compose(descriptor, &global, outcomes, Utc::now()))
    }
}

enum DatasetError {
    Fetch(FetchError),
    Schema(SchemaViolation),
}

struct DatasetOutcome {
    station: String,
    layer: &'static str,
    result: Result<StationAggregate, DatasetError>,
}

/// One worker: wait for a permit, fetch, release, fold.
async fn run_dataset(
    source: Arc<dyn FeatureSource>,
    permits: Arc<Semaphore>,
    descriptor: &'static ReportDescriptor,
    request: DatasetRequest,
) -> DatasetOutcome {
    let station = request.station.id.clone();
    let layer = request.dataset.layer;

    let fetched = match permits.acquire().await {
        Ok(_permit) => {
            let fetch_start = Instant::now();
            let fetched = source.fetch(&request).await;
            let elapsed = fetch_start.elapsed();
            if elapsed > request.timeout {
                warn!(elapsed_ms = elapsed.as_millis() as u64, "Dataset fetch overran its timeout");
            }
            fetched
        }
        Err(_) => Err(FetchError::Unreachable("worker pool closed".to_string())),
    };

    let result = match fetched {
        Ok(features) => {
            let mut partial = StationAggregate::new(descriptor);
            match partial.fold_features(descriptor, request.dataset, &features) {
                Ok(skipped) => {
                    debug!(
                        feature_count = features.len(),
                        skipped, "Dataset folded"
                    );
                    Ok(partial)
                }
                Err(v) => Err(DatasetError::Schema(v)),
            }
        }
        Err(e) => {
            warn!(error = %e, error_kind = e.kind(), "Dataset fetch failed");
            Err(DatasetError::Fetch(e))
        }
    };

    DatasetOutcome {
        station,
        layer,
        result,
    }
}

/// A station whose datasets are still arriving.
struct PendingStation {
    remaining: usize,
    aggregate: StationAggregate,
    failures: Vec<DatasetFailure>,
}

impl PendingStation {
    fn new(descriptor: &ReportDescriptor) -> Self {
        Self {
            remaining: descriptor.datasets.len(),
            aggregate: StationAggregate::new(descriptor),
            failures: Vec::new(),
        }
    }

    fn record(
        &mut self,
        layer: &'static str,
        result: Result<StationAggregate, FetchError>,
    ) -> Result<(), SchemaViolation> {
        self.remaining = self.remaining.saturating_sub(1);
        match result {
            Ok(partial) => self.aggregate.merge(&partial)?,
            Err(error) => self.failures.push(DatasetFailure { layer, error }),
        }
        Ok(())
    }

    /// Any failed dataset fails the station; its partial values are dropped.
    fn finish(self, station: String) -> StationOutcome {
        if self.failures.is_empty() && self.remaining == 0 {
            info!(
                station = %station,
                features = self.aggregate.feature_count,
                "Station aggregated"
            );
            StationOutcome {
                station,
                result: Ok(self.aggregate),
            }
        } else {
            warn!(station = %station, failures = self.failures.len(), "Station failed");
            StationOutcome {
                station,
                result: Err(self.failures),
            }
        }
    }
}
