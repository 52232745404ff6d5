use serde::{Deserialize, Serialize};

/// Status text Monev reports for a run that completed successfully.
pub const MONEV_FINISHED: &str = "finished";

/// `GET /etl-cp/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonevStatusResponse {
    #[serde(default)]
    pub status: MonevStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonevStatus {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub last_run: Option<MonevRun>,
}

impl MonevStatus {
    /// Status text of the last run, if any.
    pub fn last_status(&self) -> Option<&str> {
        self.last_run.as_ref().and_then(|run| run.status.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonevRun {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /etl-cp/run`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMonevResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /etl-cp/history`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonevHistoryResponse {
    #[serde(default)]
    pub data: MonevHistory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonevHistory {
    #[serde(default)]
    pub logs: Vec<MonevLogRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonevLogRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
