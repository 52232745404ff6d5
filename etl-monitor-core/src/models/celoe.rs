use serde::{Deserialize, Serialize};

/// Numeric status reported by the CeLOE job for its last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeloeStatusCode {
    Finished,
    Running,
    Failed,
    Unknown(i64),
}

impl CeloeStatusCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Finished,
            2 => Self::Running,
            3 => Self::Failed,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Finished => 1,
            Self::Running => 2,
            Self::Failed => 3,
            Self::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// `GET /etl/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CeloeStatusResponse {
    #[serde(default)]
    pub data: CeloeStatusData,
}

impl CeloeStatusResponse {
    /// Status of the last run, if the backend reported one.
    pub fn status_code(&self) -> Option<CeloeStatusCode> {
        self.data
            .last_run
            .as_ref()
            .and_then(|run| run.status_code)
            .map(CeloeStatusCode::from_code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CeloeStatusData {
    #[serde(default)]
    pub last_run: Option<CeloeRun>,
    #[serde(default)]
    pub watermark: Option<Watermark>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CeloeRun {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status_code: Option<i64>,
    /// Rows extracted so far.
    #[serde(default)]
    pub numrow: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Extraction checkpoint reported by the backend. Display only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Watermark {
    #[serde(default)]
    pub last_extracted_date: Option<String>,
    #[serde(default)]
    pub next_extract_date: Option<String>,
}

/// `POST /etl/run`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCeloeRequest {
    pub start_date: String,
    pub concurrency: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCeloeResponse {
    #[serde(default)]
    pub log_id: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One row of `GET /etl/logs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CeloeLogRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_records: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}
