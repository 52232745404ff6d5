//! Sequential CeLOE-then-Monev workflow with polling and background refresh.
//!
//! One [`Orchestrator`] owns the shared [`RunState`]. Two kinds of timer task read it:
//!
//! - the **poller** (every `interval_secs`), active while the run is in `celoe` or
//!   `monev`, reads the current step on every tick and polls that job only;
//! - the **auto-refresh** (every `refresh_interval_secs`), armed by the first user
//!   action, refreshes both jobs for passive viewing and skips its tick while the
//!   poller is active.
//!
//! Timers are cancelled cooperatively. Each task carries a generation number and
//! exits as soon as the state no longer names it; a request already in flight is
//! allowed to finish and its result is dropped. Tasks hold only a [`Weak`] reference,
//! so dropping the last orchestrator handle tears everything down.

mod state;

pub use state::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use etl_monitor_core::models::*;

use crate::client::{ClientError, EtlBackend};
use crate::config::PollSettings;

pub const MAX_CONCURRENCY: u8 = 10;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid start date {0:?}: expected YYYY-MM-DD")]
    InvalidStartDate(String),

    #[error("Concurrency must be between 1 and 10, got {0}")]
    InvalidConcurrency(u8),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result of [`Orchestrator::run_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunAllOutcome {
    /// A run was already in flight; nothing was sent.
    AlreadyRunning,
    /// The backend accepted the orchestration and polling has started.
    Started { orchestration_id: Option<String> },
    /// The backend answered `success: false`.
    Rejected { message: String },
    /// A stop or shutdown landed while the trigger was in flight; nothing is polled.
    Cancelled,
}

/// Result of [`Orchestrator::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { stopped_count: u32 },
    Refused { message: String },
}

#[derive(Debug)]
struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Mutable state shared between user actions and timer tasks.
#[derive(Debug, Default)]
struct RunState {
    step: RunStep,
    in_flight: bool,
    attempts: u32,
    orchestration_id: Option<String>,
    remote_steps: Vec<OrchestrationStep>,
    error: Option<String>,
    info: Option<String>,
    result: Option<String>,
    celoe: CeloeView,
    monev: MonevView,
    poller: Option<Timer>,
    auto_refresh: Option<Timer>,
    /// Poller generation performing the final refresh before `done`.
    settling: Option<u64>,
    generation: u64,
    /// Bumped by stop and shutdown; a trigger answered under an older epoch is dropped.
    trigger_epoch: u64,
}

impl RunState {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn poller_is(&self, generation: u64) -> bool {
        self.poller.as_ref().is_some_and(|t| t.generation == generation)
    }

    fn auto_refresh_is(&self, generation: u64) -> bool {
        self.auto_refresh
            .as_ref()
            .is_some_and(|t| t.generation == generation)
    }

    /// Detach the poller. Its task notices on the next tick and exits.
    fn cancel_poller(&mut self) {
        self.poller = None;
    }

    fn cancel_auto_refresh(&mut self) {
        self.auto_refresh = None;
    }

    fn active_timers(&self) -> usize {
        usize::from(self.poller.is_some()) + usize::from(self.auto_refresh.is_some())
    }

    /// Forget any trigger still waiting for its answer.
    fn abandon_trigger(&mut self) {
        self.trigger_epoch += 1;
        self.in_flight = false;
    }

    fn clear_messages(&mut self) {
        self.error = None;
        self.info = None;
        self.result = None;
    }

    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            step: self.step,
            running: self.in_flight || self.poller.is_some() || self.settling.is_some(),
            orchestration_id: self.orchestration_id.clone(),
            remote_steps: self.remote_steps.clone(),
            attempts: self.attempts,
            error: self.error.clone(),
            info: self.info.clone(),
            result: self.result.clone(),
            celoe: self.celoe.clone(),
            monev: self.monev.clone(),
            active_timers: self.active_timers(),
        }
    }

    /// Record a failed user action. 401s stay silent; the caller still gets the error.
    fn surface(&mut self, context: &str, error: &ClientError) {
        if error.is_unauthorized() {
            tracing::debug!("{}: unauthorized", context);
        } else {
            tracing::warn!("{}: {}", context, error);
            self.error = Some(format!("{}: {}", context, error));
        }
    }
}

/// Which feeds a refresh should fetch.
#[derive(Debug, Clone, Copy)]
struct Refresh {
    celoe: bool,
    monev: bool,
    logs: bool,
}

impl Refresh {
    const ALL: Self = Self {
        celoe: true,
        monev: true,
        logs: true,
    };
    const STATUS_ONLY: Self = Self {
        celoe: true,
        monev: true,
        logs: false,
    };
    const CELOE: Self = Self {
        celoe: true,
        monev: false,
        logs: true,
    };
    const MONEV: Self = Self {
        celoe: false,
        monev: true,
        logs: true,
    };
}

type Fetched<T> = Option<Result<T, ClientError>>;

#[derive(Debug, Default)]
struct Fetch {
    celoe_status: Fetched<CeloeStatusResponse>,
    celoe_logs: Fetched<Vec<CeloeLogRow>>,
    monev_status: Fetched<MonevStatusResponse>,
    monev_logs: Fetched<MonevHistoryResponse>,
}

struct Inner {
    backend: Arc<dyn EtlBackend>,
    settings: PollSettings,
    state: Mutex<RunState>,
    updates: watch::Sender<DashboardSnapshot>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for timer in [state.poller.take(), state.auto_refresh.take()]
            .into_iter()
            .flatten()
        {
            timer.handle.abort();
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &RunState) {
        self.updates.send_replace(state.snapshot());
    }

    fn publish_and(&self, state: &RunState, keep_going: bool) -> bool {
        self.publish(state);
        keep_going
    }

    fn log_page(&self) -> LogPage {
        LogPage::first(self.settings.log_limit)
    }

    async fn fetch(&self, refresh: Refresh) -> Fetch {
        let page = self.log_page();
        let backend = &self.backend;
        let (celoe_status, celoe_logs, monev_status, monev_logs) = tokio::join!(
            async {
                if refresh.celoe {
                    Some(backend.celoe_status().await)
                } else {
                    None
                }
            },
            async {
                if refresh.celoe && refresh.logs {
                    Some(backend.celoe_logs(page).await)
                } else {
                    None
                }
            },
            async {
                if refresh.monev {
                    Some(backend.monev_status().await)
                } else {
                    None
                }
            },
            async {
                if refresh.monev && refresh.logs {
                    Some(backend.monev_history(page).await)
                } else {
                    None
                }
            },
        );
        Fetch {
            celoe_status,
            celoe_logs,
            monev_status,
            monev_logs,
        }
    }

    /// Store whatever was fetched. Failures keep the previous value.
    fn apply(state: &mut RunState, fetch: Fetch) {
        match fetch.celoe_status {
            Some(Ok(status)) => state.celoe.status = Some(status),
            Some(Err(e)) => log_poll_error("CeLOE status", &e),
            None => {}
        }
        match fetch.celoe_logs {
            Some(Ok(rows)) => state.celoe.logs = rows,
            Some(Err(e)) => log_poll_error("CeLOE logs", &e),
            None => {}
        }
        match fetch.monev_status {
            Some(Ok(status)) => state.monev.status = Some(status.status),
            Some(Err(e)) => log_poll_error("Monev status", &e),
            None => {}
        }
        match fetch.monev_logs {
            Some(Ok(history)) => state.monev.logs = history.data.logs,
            Some(Err(e)) => log_poll_error("Monev history", &e),
            None => {}
        }
    }

    /// One poller tick. Returns `false` once the poller should exit.
    async fn poll_tick(&self, generation: u64) -> bool {
        let step = {
            let mut state = self.lock();
            if !state.poller_is(generation) {
                return false;
            }
            if !state.step.is_polled() {
                state.cancel_poller();
                self.publish(&state);
                return false;
            }
            state.step
        };

        let refresh = if step == RunStep::Celoe {
            Refresh::CELOE
        } else {
            Refresh::MONEV
        };
        let fetch = self.fetch(refresh).await;

        let settle = {
            let mut state = self.lock();
            if !state.poller_is(generation) {
                tracing::debug!("Discarding poll result of a cancelled poller");
                return false;
            }

            state.attempts += 1;
            let max_attempts = self.settings.max_attempts;
            let transition = match step {
                RunStep::Celoe => {
                    let code = match &fetch.celoe_status {
                        Some(Ok(status)) => status.status_code(),
                        _ => None,
                    };
                    celoe_transition(code, state.attempts, max_attempts)
                }
                _ => {
                    let status = match &fetch.monev_status {
                        Some(Ok(status)) => Some(status.status.clone()),
                        _ => None,
                    };
                    monev_transition(status.as_ref(), state.attempts, max_attempts)
                }
            };
            Self::apply(&mut state, fetch);
            tracing::debug!(step = %step, attempt = state.attempts, "Polled");

            let settle = match transition {
                Transition::Stay => return self.publish_and(&state, true),
                Transition::Next(RunStep::Done) => {
                    // The final refresh runs outside the lock; stop() clears `settling`.
                    state.cancel_poller();
                    state.settling = Some(generation);
                    true
                }
                Transition::Next(next) => {
                    tracing::info!(from = %step, to = %next, "Step finished");
                    state.step = next;
                    state.attempts = 0;
                    false
                }
                Transition::Fail(message) => {
                    tracing::warn!(step = %step, "{}", message);
                    state.step = RunStep::Error;
                    state.error = Some(message);
                    state.cancel_poller();
                    return self.publish_and(&state, false);
                }
            };
            self.publish(&state);
            settle
        };

        if !settle {
            return true;
        }

        let fetch = self.fetch(Refresh::ALL).await;

        let mut state = self.lock();
        Self::apply(&mut state, fetch);
        if state.settling == Some(generation) {
            state.settling = None;
            state.step = RunStep::Done;
            state.attempts = 0;
            state.result = Some("CeLOE and Monev ETL finished".to_string());
            tracing::info!("Orchestration finished");
        }
        self.publish(&state);
        false
    }

    /// One auto-refresh tick. Returns `false` once the timer should exit.
    async fn refresh_tick(&self, generation: u64) -> bool {
        {
            let state = self.lock();
            if !state.auto_refresh_is(generation) {
                return false;
            }
            if state.poller.is_some() || state.in_flight || state.settling.is_some() {
                tracing::trace!("Auto-refresh yielding to the orchestration poller");
                return true;
            }
        }

        let fetch = self.fetch(Refresh::ALL).await;

        let mut state = self.lock();
        if !state.auto_refresh_is(generation) {
            return false;
        }
        Self::apply(&mut state, fetch);
        self.publish(&state);
        true
    }
}

fn log_poll_error(what: &str, error: &ClientError) {
    if error.is_unauthorized() {
        tracing::debug!("{} poll unauthorized", what);
    } else {
        tracing::warn!("{} poll failed: {}", what, error);
    }
}

fn spawn_poller(
    inner: Weak<Inner>,
    generation: u64,
    period: Duration,
    span: tracing::Span,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else { break };
                if !inner.poll_tick(generation).await {
                    break;
                }
            }
            tracing::debug!("Poller stopped");
        }
        .instrument(span),
    )
}

fn spawn_auto_refresh(inner: Weak<Inner>, generation: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else { break };
            if !inner.refresh_tick(generation).await {
                break;
            }
        }
        tracing::debug!("Auto-refresh stopped");
    })
}

/// Validate the trigger input and normalise the date.
pub fn validate_input(start_date: &str, concurrency: u8) -> Result<String, OrchestratorError> {
    if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
        return Err(OrchestratorError::InvalidConcurrency(concurrency));
    }
    let date = NaiveDate::parse_from_str(start_date.trim(), "%Y-%m-%d")
        .map_err(|_| OrchestratorError::InvalidStartDate(start_date.to_string()))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Handle to the workflow. Cheap to clone; the last clone dropped stops all timers.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn EtlBackend>, settings: PollSettings) -> Self {
        let (updates, _) = watch::channel(DashboardSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                settings,
                state: Mutex::new(RunState::default()),
                updates,
            }),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.inner.lock().snapshot()
    }

    /// Receive a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn step(&self) -> RunStep {
        self.inner.lock().step
    }

    pub fn active_timers(&self) -> usize {
        self.inner.lock().active_timers()
    }

    /// Arm the background auto-refresh if it is not running.
    fn engage(&self) {
        let mut state = self.inner.lock();
        if state.auto_refresh.is_some() {
            return;
        }
        let generation = state.next_generation();
        let handle = spawn_auto_refresh(
            Arc::downgrade(&self.inner),
            generation,
            self.inner.settings.refresh_interval(),
        );
        state.auto_refresh = Some(Timer { generation, handle });
        self.inner.publish(&state);
    }

    /// Ask the backend to run CeLOE then Monev, then poll both to completion.
    ///
    /// A call while a run is in flight or being polled does nothing.
    pub async fn run_all(
        &self,
        start_date: &str,
        concurrency: u8,
    ) -> Result<RunAllOutcome, OrchestratorError> {
        let start_date = validate_input(start_date, concurrency)?;

        let run_id = Uuid::new_v4();
        let epoch = {
            let mut state = self.inner.lock();
            if state.in_flight || state.step.is_polled() || state.settling.is_some() {
                tracing::debug!("run_all ignored: already running");
                return Ok(RunAllOutcome::AlreadyRunning);
            }
            state.in_flight = true;
            state.cancel_poller();
            state.clear_messages();
            state.step = RunStep::Idle;
            state.attempts = 0;
            state.orchestration_id = None;
            state.remote_steps.clear();
            self.inner.publish(&state);
            state.trigger_epoch
        };
        self.engage();

        let span = tracing::info_span!("run_all", %run_id);
        tracing::info!(parent: &span, %start_date, concurrency, "Starting orchestration");
        let request = OrchestrateRequest {
            start_date,
            concurrency,
        };
        let result = self
            .inner
            .backend
            .orchestrate(&request)
            .instrument(span.clone())
            .await;

        let mut state = self.inner.lock();
        if state.trigger_epoch != epoch {
            tracing::info!(parent: &span, "Orchestration answered after a stop, not polling");
            return Ok(RunAllOutcome::Cancelled);
        }
        state.in_flight = false;
        let outcome = match result {
            Err(e) => {
                if e.is_unauthorized() {
                    state.step = RunStep::Idle;
                } else {
                    state.step = RunStep::Error;
                }
                state.surface("Failed to start orchestration", &e);
                self.inner.publish(&state);
                return Err(e.into());
            }
            Ok(response) if !response.success => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Orchestration rejected".to_string());
                tracing::warn!(parent: &span, "Orchestration rejected: {}", message);
                state.step = RunStep::Error;
                state.error = Some(message.clone());
                state.remote_steps = response.steps;
                RunAllOutcome::Rejected { message }
            }
            Ok(response) => {
                tracing::info!(
                    parent: &span,
                    orchestration_id = ?response.orchestration_id,
                    "Orchestration accepted"
                );
                state.step = RunStep::Celoe;
                state.attempts = 0;
                state.orchestration_id = response.orchestration_id.clone();
                state.remote_steps = response.steps;
                state.info = response.message;

                let generation = state.next_generation();
                let handle = spawn_poller(
                    Arc::downgrade(&self.inner),
                    generation,
                    self.inner.settings.interval(),
                    span,
                );
                state.poller = Some(Timer { generation, handle });
                RunAllOutcome::Started {
                    orchestration_id: response.orchestration_id,
                }
            }
        };
        self.inner.publish(&state);
        Ok(outcome)
    }

    /// Stop every pipeline process on the backend and reset the workflow.
    pub async fn stop(&self) -> Result<StopOutcome, OrchestratorError> {
        let result = self.inner.backend.stop_pipeline().await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let mut state = self.inner.lock();
                state.surface("Failed to stop pipeline", &e);
                self.inner.publish(&state);
                return Err(e.into());
            }
        };

        if !response.status {
            let message = response
                .message
                .unwrap_or_else(|| "Failed to stop pipeline".to_string());
            let mut state = self.inner.lock();
            state.error = Some(message.clone());
            self.inner.publish(&state);
            return Ok(StopOutcome::Refused { message });
        }

        let stopped_count = response
            .stopped_count
            .unwrap_or(response.stopped_processes.len() as u32);
        tracing::info!(stopped_count, "Pipeline stopped");
        {
            let mut state = self.inner.lock();
            state.cancel_poller();
            state.cancel_auto_refresh();
            state.abandon_trigger();
            state.settling = None;
            state.step = RunStep::Idle;
            state.attempts = 0;
            state.orchestration_id = None;
            state.remote_steps.clear();
            state.clear_messages();
            self.inner.publish(&state);
        }

        let fetch = self.inner.fetch(Refresh::STATUS_ONLY).await;
        let mut state = self.inner.lock();
        Inner::apply(&mut state, fetch);
        self.inner.publish(&state);
        Ok(StopOutcome::Stopped { stopped_count })
    }

    /// Trigger the CeLOE job alone.
    pub async fn run_celoe(
        &self,
        start_date: &str,
        concurrency: u8,
    ) -> Result<RunCeloeResponse, OrchestratorError> {
        let start_date = validate_input(start_date, concurrency)?;
        self.engage();

        let request = RunCeloeRequest {
            start_date,
            concurrency,
        };
        match self.inner.backend.run_celoe(&request).await {
            Ok(response) => {
                {
                    let mut state = self.inner.lock();
                    state.error = None;
                    state.info = Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "CeLOE ETL started".to_string()),
                    );
                    self.inner.publish(&state);
                }
                self.refresh_jobs(Refresh::CELOE).await;
                Ok(response)
            }
            Err(e) => {
                let mut state = self.inner.lock();
                state.surface("Failed to run CeLOE ETL", &e);
                self.inner.publish(&state);
                Err(e.into())
            }
        }
    }

    /// Trigger the Monev job alone.
    pub async fn run_monev(&self) -> Result<RunMonevResponse, OrchestratorError> {
        self.engage();

        match self.inner.backend.run_monev().await {
            Ok(response) => {
                {
                    let mut state = self.inner.lock();
                    state.error = None;
                    state.info = Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "Monev ETL started".to_string()),
                    );
                    self.inner.publish(&state);
                }
                self.refresh_jobs(Refresh::MONEV).await;
                Ok(response)
            }
            Err(e) => {
                let mut state = self.inner.lock();
                state.surface("Failed to run Monev ETL", &e);
                self.inner.publish(&state);
                Err(e.into())
            }
        }
    }

    /// Fetch status and logs of both jobs once.
    pub async fn refresh(&self) -> DashboardSnapshot {
        self.refresh_jobs(Refresh::ALL).await;
        self.snapshot()
    }

    /// Start the background auto-refresh without triggering anything.
    pub fn watch(&self) {
        self.engage();
    }

    async fn refresh_jobs(&self, refresh: Refresh) {
        let fetch = self.inner.fetch(refresh).await;
        let mut state = self.inner.lock();
        Inner::apply(&mut state, fetch);
        self.inner.publish(&state);
    }

    /// Cancel both timers. Remote jobs keep running.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        for timer in [state.poller.take(), state.auto_refresh.take()]
            .into_iter()
            .flatten()
        {
            timer.handle.abort();
        }
        state.abandon_trigger();
        state.settling = None;
        self.inner.publish(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_validation_accepts_dates_and_bounded_concurrency() {
        assert_eq!(validate_input("2024-09-01", 4).unwrap(), "2024-09-01");
        assert_eq!(validate_input(" 2024-09-01 ", 1).unwrap(), "2024-09-01");
        assert!(matches!(
            validate_input("2024-09-01", 0),
            Err(OrchestratorError::InvalidConcurrency(0))
        ));
        assert!(matches!(
            validate_input("2024-09-01", 11),
            Err(OrchestratorError::InvalidConcurrency(11))
        ));
        assert!(matches!(
            validate_input("01/09/2024", 2),
            Err(OrchestratorError::InvalidStartDate(_))
        ));
    }

    #[test]
    fn snapshot_counts_timers_and_running() {
        let state = RunState {
            step: RunStep::Celoe,
            ..Default::default()
        };
        let snapshot = state.snapshot();
        assert_eq!(snapshot.active_timers, 0);
        assert!(!snapshot.running);
        assert_eq!(snapshot.step, RunStep::Celoe);
    }
}
