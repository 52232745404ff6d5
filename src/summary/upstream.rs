use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use etl_monitor_core::models::{ChartQuery, TableQuery};

use super::{SummaryError, SummarySource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Forwards summary queries to the analytics upstream with a bearer token.
#[derive(Debug, Clone)]
pub struct UpstreamSummarySource {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl UpstreamSummarySource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    async fn get<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<Value, SummaryError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.get(&url).query(query);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SummarySource for UpstreamSummarySource {
    fn name(&self) -> &'static str {
        "upstream"
    }

    async fn chart(&self, query: &ChartQuery) -> Result<Value, SummaryError> {
        self.get("/summary/chart", query).await
    }

    async fn table(&self, query: &TableQuery) -> Result<Value, SummaryError> {
        self.get("/summary/table", query).await
    }
}
