//! HTTP surfaces.
//!
//! Two routers on two listeners: the health surface (`/health`, `/ready`) on
//! the primary port, and the bearer-gated metrics surface (`/metrics`) on the
//! dedicated metrics port. The metrics router only exists when a metrics port
//! and secret are configured; without them no listener is bound at all.

use crate::metrics::FleetMetrics;
use crate::shard::FleetStatus;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub shards_total: usize,
    pub shards_ready: usize,
    pub guilds_total: u64,
}

/// State for the health router.
#[derive(Clone)]
pub struct AppState {
    pub status: FleetStatus,
    pub metrics: Arc<FleetMetrics>,
}

/// State for the metrics router.
#[derive(Clone)]
pub struct MetricsState {
    pub metrics: Arc<FleetMetrics>,
    pub auth_secret: String,
}

/// Health surface: liveness and readiness.
pub fn health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

/// Metrics surface: the authenticated Prometheus endpoint.
pub fn metrics_router(state: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health endpoint - always returns 200 if the process is running.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness endpoint - 200 once at least one shard is ready.
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = ReadyResponse {
        ready: state.status.is_ready(),
        shards_total: state.status.shard_count(),
        shards_ready: state.status.ready_shards(),
        guilds_total: state.metrics.guild_count(),
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - Prometheus text format behind a bearer check.
///
/// An invalid or missing token yields a bare 401; no registry contents leak.
async fn metrics_handler(State(state): State<MetricsState>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .is_some_and(|token| token == state.auth_secret);

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
        .into_response()
}

/// Strip a case-insensitive `Bearer ` prefix; the remainder is the token.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::ShardHealth;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn metrics_state(secret: &str) -> MetricsState {
        let metrics = Arc::new(FleetMetrics::new());
        metrics.record_gateway_event("GUILD_CREATE");
        metrics.set_guild_count(12);
        MetricsState {
            metrics,
            auth_secret: secret.to_string(),
        }
    }

    async fn scrape(secret: &str, auth_header: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri("/metrics");
        if let Some(value) = auth_header {
            request = request.header(header::AUTHORIZATION, value);
        }

        let response = metrics_router(metrics_state(secret))
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_authorization_is_401_with_empty_body() {
        let (status, body) = scrape("secret", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn wrong_token_is_401_with_empty_body() {
        let (status, body) = scrape("secret", Some("Bearer wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn correct_token_serves_the_snapshot() {
        let (status, body) = scrape("secret", Some("Bearer secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("guild_count 12"));
        assert!(body.contains(r#"gateway_events_count{name="GUILD_CREATE"} 1"#));
    }

    #[tokio::test]
    async fn bearer_scheme_is_case_insensitive() {
        let (status, _) = scrape("secret", Some("bEaReR secret")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn token_comparison_is_exact() {
        let (status, _) = scrape("secret", Some("Bearer secret2")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = scrape("secret", Some("Bearer  secret")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn scheme_without_token_is_401() {
        let (status, _) = scrape("secret", Some("Bearer")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ready_reflects_fleet_health() {
        let status = FleetStatus::new();
        status.register(0);
        status.register(1);

        let state = AppState {
            status: status.clone(),
            metrics: Arc::new(FleetMetrics::new()),
        };
        let router = health_router(state);

        let request = || {
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap()
        };

        let response = router.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        status.set_health(0, ShardHealth::Ready);
        let response = router.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let ready: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(ready["ready"], true);
        assert_eq!(ready["shards_total"], 2);
        assert_eq!(ready["shards_ready"], 1);
    }

    #[tokio::test]
    async fn health_is_always_200() {
        let state = AppState {
            status: FleetStatus::new(),
            metrics: Arc::new(FleetMetrics::new()),
        };
        let response = health_router(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearerabc"), None);
        assert_eq!(bearer_token(""), None);
    }
}
