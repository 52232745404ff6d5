use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use etl_monitor_core::models::{ChartQuery, TableQuery};

use crate::summary::{SummaryError, SummaryService};

// ============================================================
// Error Handling
// ============================================================

/// Log the upstream failure and answer 502 with a generic message.
/// Reached only when no fallback is configured (or the fallback failed too).
fn upstream_error(e: SummaryError) -> (StatusCode, String) {
    tracing::error!("Summary request failed: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        "Summary upstream unavailable".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(summary): State<SummaryService>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "mock_fallback": summary.has_fallback(),
    }))
}

// ============================================================
// Summary
// ============================================================

pub async fn summary_chart(
    State(summary): State<SummaryService>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    summary.chart(&query).await.map(Json).map_err(upstream_error)
}

pub async fn summary_table(
    State(summary): State<SummaryService>,
    Query(query): Query<TableQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    summary.table(&query).await.map(Json).map_err(upstream_error)
}
