use std::sync::{Arc, Mutex};

use axum::{
    extract::RawQuery,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use axum_test::TestServer;
use serde_json::{json, Value};

use etl_monitor::api::create_router;
use etl_monitor::api::middleware::SecurityConfig;
use etl_monitor::summary::{MockSummarySource, SummaryService, UpstreamSummarySource};

/// What the fake upstream saw.
#[derive(Debug, Clone)]
struct Seen {
    authorization: Option<String>,
    query: Option<String>,
}

/// Serve a fake summary upstream on an ephemeral port. Returns its base URL.
async fn spawn_upstream(status: StatusCode, body: Value) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = {
        let seen = seen.clone();
        move |headers: HeaderMap, RawQuery(query): RawQuery| {
            let seen = seen.clone();
            let body = body.clone();
            async move {
                seen.lock().unwrap().push(Seen {
                    authorization: headers
                        .get(header::AUTHORIZATION)
                        .and_then(|h| h.to_str().ok())
                        .map(String::from),
                    query,
                });
                (status, Json(body))
            }
        }
    };
    let app = Router::new()
        .route("/summary/table", get(record.clone()))
        .route("/summary/chart", get(record));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

/// A base URL nothing listens on.
async fn dead_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn server(summary: SummaryService, security: SecurityConfig) -> TestServer {
    TestServer::new(create_router(summary, security)).expect("Failed to create test server")
}

fn with_mock_fallback(upstream_url: &str) -> SummaryService {
    SummaryService::new(Arc::new(UpstreamSummarySource::new(
        upstream_url,
        Some("up-token".to_string()),
    )))
    .with_fallback(Arc::new(MockSummarySource::default()))
}

fn rows(body: &Value) -> &Vec<Value> {
    body["data"].as_array().expect("data is not an array")
}

mod summary_table {
    use super::*;

    #[tokio::test]
    async fn failed_upstream_serves_mock_rows_matching_search() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        let response = server.get("/api/sas/summary/table?search=PPB").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], json!(true));
        assert!(body["message"].as_str().unwrap().contains("mock data"));
        let rows = rows(&body);
        assert!(!rows.is_empty());
        for row in rows {
            let name = row["course_name"].as_str().unwrap().to_lowercase();
            let short = row["course_shortname"].as_str().unwrap().to_lowercase();
            assert!(name.contains("ppb") || short.contains("ppb"), "{row}");
        }
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        let upper: Value = server
            .get("/api/sas/summary/table?search=PPB&limit=100")
            .await
            .json();
        let lower: Value = server
            .get("/api/sas/summary/table?search=ppb&limit=100")
            .await
            .json();

        assert_eq!(upper["data"], lower["data"]);
    }

    #[tokio::test]
    async fn mock_rows_respect_paging_and_filters() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        let response = server
            .get("/api/sas/summary/table?fakultas_id=FIF&page=2&limit=5&sort_by=num_students&sort_dir=desc")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        let rows = rows(&body);
        assert!(rows.len() <= 5);
        assert!(rows.iter().all(|r| r["fakultas_id"] == json!("FIF")));
        assert_eq!(body["pagination"]["page"], json!(2));
        assert_eq!(body["pagination"]["limit"], json!(5));
        let students: Vec<u64> = rows
            .iter()
            .map(|r| r["num_students"].as_u64().unwrap())
            .collect();
        assert!(students.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn mock_answers_are_repeatable() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        let first = server
            .get("/api/sas/summary/table?page=3&limit=7")
            .await
            .text();
        let second = server
            .get("/api/sas/summary/table?page=3&limit=7")
            .await
            .text();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn healthy_upstream_is_forwarded_verbatim_with_token() {
        let upstream_body = json!({
            "status": true,
            "message": "ok",
            "data": [{ "course_name": "Upstream Course", "extra": 1 }]
        });
        let (url, seen) = spawn_upstream(StatusCode::OK, upstream_body.clone()).await;
        let server = server(with_mock_fallback(&url), SecurityConfig::disabled());

        let response = server
            .get("/api/sas/summary/table?fakultas_id=FIF&page=2&search=alg")
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), upstream_body);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer up-token"));
        let query = seen[0].query.clone().unwrap_or_default();
        assert!(query.contains("fakultas_id=FIF"));
        assert!(query.contains("page=2"));
        assert!(query.contains("search=alg"));
    }

    #[tokio::test]
    async fn upstream_error_status_falls_back_to_mock() {
        let (url, seen) = spawn_upstream(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "status": false, "message": "db down" }),
        )
        .await;
        let server = server(with_mock_fallback(&url), SecurityConfig::disabled());

        let response = server.get("/api/sas/summary/table").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("mock data"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upstream_without_fallback_is_bad_gateway() {
        let summary = SummaryService::new(Arc::new(UpstreamSummarySource::new(
            dead_upstream().await,
            None,
        )));
        let server = server(summary, SecurityConfig::disabled());

        let response = server.get("/api/sas/summary/table").await;

        response.assert_status(StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn malformed_paging_is_rejected() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        let response = server.get("/api/sas/summary/table?page=abc").await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

mod summary_chart {
    use super::*;

    #[tokio::test]
    async fn failed_upstream_serves_one_point_per_day() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        let response = server
            .get("/api/sas/summary/chart?date_start=2024-09-01&date_end=2024-09-07&prodi_id=FIF-1")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], json!(true));
        let labels = body["data"]["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 7);
        assert_eq!(labels[0], json!("2024-09-01"));
        assert_eq!(labels[6], json!("2024-09-07"));
        let series = body["data"]["series"].as_array().unwrap();
        assert_eq!(series.len(), 3);
        assert!(series
            .iter()
            .all(|s| s["data"].as_array().unwrap().len() == 7));
    }

    #[tokio::test]
    async fn extreme_dates_are_answered_from_the_mock() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::disabled(),
        );

        for date_end in ["%2B262142-12-31", "-262143-01-01"] {
            let response = server
                .get(&format!("/api/sas/summary/chart?date_end={}", date_end))
                .await;

            response.assert_status_ok();
            let body: Value = response.json();
            assert!(!body["data"]["labels"].as_array().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn healthy_upstream_is_forwarded() {
        let upstream_body = json!({ "status": true, "message": "ok", "data": { "labels": [] } });
        let (url, seen) = spawn_upstream(StatusCode::OK, upstream_body.clone()).await;
        let server = server(with_mock_fallback(&url), SecurityConfig::disabled());

        let response = server
            .get("/api/sas/summary/chart?university=telkom&subject_ids=1001,1002")
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), upstream_body);
        let query = seen.lock().unwrap()[0].query.clone().unwrap_or_default();
        assert!(query.contains("university=telkom"));
        assert!(query.contains("subject_ids=1001%2C1002"));
    }
}

mod security {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::with_api_key("secret"),
        );

        let response = server.get("/api/sas/summary/table").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::with_api_key("secret"),
        );

        let response = server
            .get("/api/sas/summary/table")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_key_is_accepted() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::with_api_key("secret"),
        );

        let response = server
            .get("/api/sas/summary/table")
            .add_header(
                header::AUTHORIZATION,
                HeaderValue::from_static("Bearer secret"),
            )
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn health_stays_open() {
        let server = server(
            with_mock_fallback(&dead_upstream().await),
            SecurityConfig::with_api_key("secret"),
        );

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["mock_fallback"], json!(true));
    }
}
