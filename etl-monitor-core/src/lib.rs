//! Wire models and deterministic mock data shared by the etl-monitor client,
//! orchestrator and summary proxy.

pub mod mock;
pub mod models;
