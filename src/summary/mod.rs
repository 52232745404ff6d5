//! Data sources behind the summary analytics proxy.
//!
//! [`SummaryService`] asks its primary source first. When the primary fails and a
//! fallback is configured, the fallback answers instead. The fallback is the
//! deterministic [`MockSummarySource`], meant for development and demos only, and is
//! switched on or off through [`MonitorConfig::mock_fallback`].

mod mock;
mod upstream;

pub use mock::MockSummarySource;
pub use upstream::UpstreamSummarySource;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use etl_monitor_core::models::{ChartQuery, TableQuery};

use crate::config::MonitorConfig;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Somewhere summary payloads come from. Answers are JSON, passed to clients verbatim.
#[async_trait]
pub trait SummarySource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chart(&self, query: &ChartQuery) -> Result<Value, SummaryError>;

    async fn table(&self, query: &TableQuery) -> Result<Value, SummaryError>;
}

/// Primary source with an optional fallback.
#[derive(Clone)]
pub struct SummaryService {
    primary: Arc<dyn SummarySource>,
    fallback: Option<Arc<dyn SummarySource>>,
}

impl SummaryService {
    pub fn new(primary: Arc<dyn SummarySource>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn SummarySource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Upstream from config, with the mock fallback when `mock_fallback` is set.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let service = Self::new(Arc::new(UpstreamSummarySource::new(
            &config.summary_url,
            config.summary_token.clone(),
        )));
        if config.mock_fallback {
            service.with_fallback(Arc::new(MockSummarySource::new(config.mock_seed)))
        } else {
            service
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub async fn chart(&self, query: &ChartQuery) -> Result<Value, SummaryError> {
        match self.primary.chart(query).await {
            Ok(value) => Ok(value),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    tracing::warn!(
                        "{} chart failed, answering from {}: {}",
                        self.primary.name(),
                        fallback.name(),
                        e
                    );
                    fallback.chart(query).await
                }
                None => Err(e),
            },
        }
    }

    pub async fn table(&self, query: &TableQuery) -> Result<Value, SummaryError> {
        match self.primary.table(query).await {
            Ok(value) => Ok(value),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    tracing::warn!(
                        "{} table failed, answering from {}: {}",
                        self.primary.name(),
                        fallback.name(),
                        e
                    );
                    fallback.table(query).await
                }
                None => Err(e),
            },
        }
    }
}
