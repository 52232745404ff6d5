//! HTTP client for the ETL backend.
//!
//! The backend owns both jobs; this client only triggers them and reads their state.
//! Business failures (`success: false`, `status: false`) come back as ordinary
//! responses. Only transport and HTTP-level failures are [`ClientError`]s.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use etl_monitor_core::models::*;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: token required or invalid")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Operations the orchestrator needs from the ETL backend.
#[async_trait]
pub trait EtlBackend: Send + Sync {
    async fn orchestrate(&self, request: &OrchestrateRequest)
        -> Result<OrchestrateResponse, ClientError>;

    async fn celoe_status(&self) -> Result<CeloeStatusResponse, ClientError>;

    async fn run_celoe(&self, request: &RunCeloeRequest) -> Result<RunCeloeResponse, ClientError>;

    async fn celoe_logs(&self, page: LogPage) -> Result<Vec<CeloeLogRow>, ClientError>;

    async fn monev_status(&self) -> Result<MonevStatusResponse, ClientError>;

    async fn run_monev(&self) -> Result<RunMonevResponse, ClientError>;

    async fn monev_history(&self, page: LogPage) -> Result<MonevHistoryResponse, ClientError>;

    async fn stop_pipeline(&self) -> Result<StopPipelineResponse, ClientError>;
}

/// reqwest-backed [`EtlBackend`].
#[derive(Debug, Clone)]
pub struct EtlClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl EtlClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional auth header.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
                StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                _ => Err(ClientError::Server(format!("{}: {}", status, body))),
            }
        }
    }
}

#[async_trait]
impl EtlBackend for EtlClient {
    async fn orchestrate(
        &self,
        request: &OrchestrateRequest,
    ) -> Result<OrchestrateResponse, ClientError> {
        let response = self
            .request(Method::POST, "/etl-cp/orchestrate")
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn celoe_status(&self) -> Result<CeloeStatusResponse, ClientError> {
        let response = self.request(Method::GET, "/etl/status").send().await?;
        self.handle_response(response).await
    }

    async fn run_celoe(&self, request: &RunCeloeRequest) -> Result<RunCeloeResponse, ClientError> {
        let response = self
            .request(Method::POST, "/etl/run")
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn celoe_logs(&self, page: LogPage) -> Result<Vec<CeloeLogRow>, ClientError> {
        let response = self
            .request(Method::GET, "/etl/logs")
            .query(&page)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn monev_status(&self) -> Result<MonevStatusResponse, ClientError> {
        let response = self.request(Method::GET, "/etl-cp/status").send().await?;
        self.handle_response(response).await
    }

    async fn run_monev(&self) -> Result<RunMonevResponse, ClientError> {
        let response = self.request(Method::POST, "/etl-cp/run").send().await?;
        self.handle_response(response).await
    }

    async fn monev_history(&self, page: LogPage) -> Result<MonevHistoryResponse, ClientError> {
        let response = self
            .request(Method::GET, "/etl-cp/history")
            .query(&page)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn stop_pipeline(&self) -> Result<StopPipelineResponse, ClientError> {
        let response = self
            .request(Method::POST, "/etl/stop-pipeline")
            .send()
            .await?;
        self.handle_response(response).await
    }
}
