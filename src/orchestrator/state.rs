use serde::Serialize;

use etl_monitor_core::models::*;

/// Where the sequential CeLOE-then-Monev workflow currently is.
///
/// - `Idle`: nothing running, or reset by a stop
/// - `Celoe`: waiting for the CeLOE job to report a terminal code
/// - `Monev`: CeLOE finished, waiting for Monev
/// - `Done`: both jobs finished
/// - `Error`: a job failed, timed out, or the trigger was rejected
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStep {
    #[default]
    Idle,
    Celoe,
    Monev,
    Done,
    Error,
}

impl RunStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Celoe => "celoe",
            Self::Monev => "monev",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// States driven by the poller.
    pub fn is_polled(&self) -> bool {
        matches!(self, Self::Celoe | Self::Monev)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for RunStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of inspecting one poll result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Next(RunStep),
    Fail(String),
}

pub const CELOE_FAILED: &str = "CeLOE ETL failed";
pub const CELOE_TIMEOUT: &str = "CeLOE ETL timeout";
pub const MONEV_TIMEOUT: &str = "Monev ETL timeout";

/// Decide the CeLOE transition after `attempts` polls. `code` is `None` when the
/// status could not be read on this tick.
pub fn celoe_transition(
    code: Option<CeloeStatusCode>,
    attempts: u32,
    max_attempts: u32,
) -> Transition {
    match code {
        Some(CeloeStatusCode::Finished) => Transition::Next(RunStep::Monev),
        Some(CeloeStatusCode::Failed) => Transition::Fail(CELOE_FAILED.to_string()),
        _ if attempts >= max_attempts => Transition::Fail(CELOE_TIMEOUT.to_string()),
        _ => Transition::Stay,
    }
}

/// Decide the Monev transition after `attempts` polls.
///
/// Monev is settled once it reports `isRunning == false`; only a last run of
/// `"finished"` counts as success.
pub fn monev_transition(
    status: Option<&MonevStatus>,
    attempts: u32,
    max_attempts: u32,
) -> Transition {
    match status {
        Some(status) if !status.is_running => match status.last_status() {
            Some(MONEV_FINISHED) => Transition::Next(RunStep::Done),
            Some(other) => Transition::Fail(format!("Monev ETL failed: {}", other)),
            None => Transition::Fail("Monev ETL failed: no run reported".to_string()),
        },
        _ if attempts >= max_attempts => Transition::Fail(MONEV_TIMEOUT.to_string()),
        _ => Transition::Stay,
    }
}

/// Latest known state of the CeLOE job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CeloeView {
    pub status: Option<CeloeStatusResponse>,
    pub logs: Vec<CeloeLogRow>,
}

/// Latest known state of the Monev job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonevView {
    pub status: Option<MonevStatus>,
    pub logs: Vec<MonevLogRow>,
}

/// Everything a dashboard shows, published after every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub step: RunStep,
    /// A trigger request is in flight or the poller is active.
    pub running: bool,
    /// Display only; polls are not scoped by it.
    pub orchestration_id: Option<String>,
    pub remote_steps: Vec<OrchestrationStep>,
    /// Polls spent in the current step.
    pub attempts: u32,
    pub error: Option<String>,
    pub info: Option<String>,
    pub result: Option<String>,
    pub celoe: CeloeView,
    pub monev: MonevView,
    pub active_timers: usize,
}
