pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod orchestrator;
pub mod output;
pub mod probe;
pub mod registry;
pub mod report;
