use serde::{Deserialize, Serialize};

/// `POST /etl-cp/orchestrate`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestrateRequest {
    pub start_date: String,
    pub concurrency: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrateResponse {
    /// Missing means the backend accepted the request.
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub orchestration_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<OrchestrationStep>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A step as reported by the backend's orchestration endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestrationStep {
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /etl/stop-pipeline`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopPipelineResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub stopped_count: Option<u32>,
    #[serde(default)]
    pub stopped_processes: Vec<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}
