//! Payloads exchanged with the external backends.
//!
//! # Jobs
//!
//! - [`CeloeStatusResponse`]: status of the CeLOE extraction job (job A), keyed by a
//!   numeric [`CeloeStatusCode`].
//! - [`MonevStatusResponse`]: status of the Monev job (job B), keyed by `isRunning`
//!   and the textual status of its last run.
//! - [`OrchestrateResponse`]: result of asking the backend to run both jobs in sequence.
//!
//! # Analytics
//!
//! - [`TableQuery`] / [`ChartQuery`]: filters accepted by the summary proxy.
//! - [`SummaryEnvelope`]: the `{status, message, data}` wrapper every summary answer uses.
//!
//! The backends own these shapes. Fields the client never reads are not modelled and
//! every optional field defaults when missing.

mod celoe;
mod monev;
mod orchestration;
mod summary;

pub use celoe::*;
pub use monev::*;
pub use orchestration::*;
pub use summary::*;

use serde::{Deserialize, Serialize};

/// Paging parameters for the log feeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogPage {
    pub limit: u32,
    pub offset: u32,
}

impl LogPage {
    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}

impl Default for LogPage {
    fn default() -> Self {
        Self::first(10)
    }
}
