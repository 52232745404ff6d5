//! Trigger, poll and observe the CeLOE and Monev ETL jobs, and proxy the summary
//! analytics endpoints with a deterministic mock fallback.

pub mod api;
pub mod client;
pub mod config;
pub mod orchestrator;
pub mod summary;

pub use etl_monitor_core::{mock, models};
