mod handlers;
pub mod middleware;

use axum::{http::HeaderValue, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::summary::SummaryService;
use middleware::SecurityConfig;

/// Router of the summary proxy: `/api/sas/summary/{chart,table}` plus `/health`.
pub fn create_router(summary: SummaryService, security: SecurityConfig) -> Router {
    let api = Router::new()
        .route("/sas/summary/chart", get(handlers::summary_chart))
        .route("/sas/summary/table", get(handlers::summary_table))
        .layer(from_fn_with_state(
            security.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(summary)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        None => CorsLayer::permissive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{
            header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN},
            Request, StatusCode,
        },
    };
    use tower::ServiceExt;

    use crate::summary::MockSummarySource;

    fn router(cors_origins: Option<Vec<String>>) -> Router {
        let summary = SummaryService::new(Arc::new(MockSummarySource::default()));
        create_router(
            summary,
            SecurityConfig {
                api_key: None,
                cors_origins,
            },
        )
    }

    fn health_from(origin: &str) -> Request<Body> {
        Request::builder()
            .uri("/health")
            .header(ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn configured_origin_is_allowed() {
        let response = router(Some(vec!["http://dash.test".to_string()]))
            .oneshot(health_from("http://dash.test"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://dash.test"
        );
    }

    #[tokio::test]
    async fn other_origins_get_no_cors_header() {
        let response = router(Some(vec!["http://dash.test".to_string()]))
            .oneshot(health_from("http://evil.test"))
            .await
            .unwrap();

        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn permissive_without_configured_origins() {
        let response = router(None)
            .oneshot(health_from("http://anywhere.test"))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
