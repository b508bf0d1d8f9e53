//! Aggregation engine and report composition.
//!
//! Each report kind is data (a [`kinds::ReportDescriptor`]) driving one
//! shared fold over feature properties. Station partials merge into a global
//! summary and are rendered with fixed rounding by [`compose::compose`].

pub mod aggregate;
pub mod compose;
pub mod kinds;
pub mod types;

pub use aggregate::{Accumulator, Contribution, StationAggregate};
pub use compose::{DatasetFailure, StationOutcome, compose};
pub use kinds::{DatasetSpec, ReportDescriptor, ReportKind};
pub use types::{MetricTable, MetricValue, Report, StationReport};
