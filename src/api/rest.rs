// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//   GET  /health      liveness, cache size, uptime
//   POST /analysis    three-timeframe narrative generation (cached)
//   POST /indicators  formatted indicator snapshots for supplied candles
//   GET  /dashboard   latest poller refresh
//   GET  /ws          push feed of the dashboard snapshot
//
// CORS is configured permissively; the dashboard is served from another
// origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::analysis::orchestrator::{AnalysisError, AnalysisRequest};
use crate::analysis::snapshot::IndicatorSnapshot;
use crate::app_state::{AppState, IndicatorPanel};
use crate::types::{Candle, Timeframe};

/// Response header reporting how an analysis was served.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-analysis-cache");

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([CACHE_STATUS_HEADER]);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/analysis", post(analysis))
        .route("/api/v1/indicators", post(indicators))
        .route("/api/v1/dashboard", get(dashboard))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

impl AnalysisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    generation_configured: bool,
    cache_entries: usize,
    uptime_secs: u64,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        generation_configured: state.orchestrator.generator_configured(),
        cache_entries: state.orchestrator.cache_len(),
        uptime_secs: state.uptime_secs(),
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Analysis
// =============================================================================

async fn analysis(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Response, AnalysisError> {
    let Json(request) = body.map_err(|e| {
        warn!(error = %e, "analysis body rejected");
        AnalysisError::InvalidRequest(e.body_text())
    })?;
    let outcome = state.orchestrator.analyze(&request).await.inspect_err(|e| {
        warn!(error = %e, status = %e.status_code(), "analysis request failed");
    })?;

    info!(cache = %outcome.cache_status, "analysis served");
    Ok((
        [(CACHE_STATUS_HEADER, outcome.cache_status.to_string())],
        Json(outcome.narratives),
    )
        .into_response())
}

// =============================================================================
// Indicators
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndicatorsRequest {
    #[serde(default)]
    very_short_data: Vec<Candle>,
    #[serde(default)]
    short_data: Vec<Candle>,
    #[serde(default)]
    long_data: Vec<Candle>,
}

async fn indicators(Json(request): Json<IndicatorsRequest>) -> impl IntoResponse {
    let compute = |candles: &[Candle], tf: Timeframe| {
        IndicatorSnapshot::compute(candles, tf).map(|s| s.formatted())
    };
    Json(IndicatorPanel {
        very_short: compute(&request.very_short_data, Timeframe::VeryShort),
        short: compute(&request.short_data, Timeframe::Short),
        long: compute(&request.long_data, Timeframe::Long),
    })
}

// =============================================================================
// Dashboard
// =============================================================================

async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::app_state::tests::test_state;

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Option<String>, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let cache = resp
            .headers()
            .get(&CACHE_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, cache, json)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(test_state(true));
        let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let (status, _, json) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cache_entries"], 0);
        assert_eq!(json["generation_configured"], true);
    }

    #[tokio::test]
    async fn analysis_miss_then_hit() {
        let state = test_state(true);
        let body = r#"{"price": "0.4512", "change24h": 1.5}"#;

        let (status, cache, json) =
            send(router(state.clone()), post_json("/api/v1/analysis", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("miss"));
        assert_eq!(json["veryShortTerm"], "Cardano SCALPING Analysis (6 Hours)");
        assert_eq!(json["shortTerm"], "Cardano DAY TRADING Analysis (24 Hours)");

        let (status, cache, again) =
            send(router(state.clone()), post_json("/api/v1/analysis", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("hit"));
        assert_eq!(again, json);
        assert_eq!(state.orchestrator.cache_len(), 1);
    }

    #[tokio::test]
    async fn analysis_unconfigured_is_503() {
        let app = router(test_state(false));
        let (status, cache, json) =
            send(app, post_json("/api/v1/analysis", r#"{"price": 0.45}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(cache.is_none());
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn analysis_bad_price_is_400() {
        let app = router(test_state(true));
        let (status, _, json) =
            send(app, post_json("/api/v1/analysis", r#"{"price": "soon"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("soon"));
    }

    #[tokio::test]
    async fn analysis_malformed_body_is_json_400() {
        for body in [r#"{"price": "#, r#"{"price": 0.45, "shortData": "none"}"#] {
            let app = router(test_state(true));
            let (status, _, json) = send(app, post_json("/api/v1/analysis", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert!(json["error"].as_str().is_some_and(|m| !m.is_empty()), "body {body}");
        }
    }

    #[test]
    fn timeout_maps_to_504_with_message() {
        let resp = AnalysisError::Timeout.into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AnalysisError::Timeout.to_string(),
            "Analysis request timed out. Please try again."
        );
        let failed = AnalysisError::Generation(vec![(Timeframe::Long, "boom".into())]);
        assert_eq!(failed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.to_string(), "long: boom");
    }

    #[tokio::test]
    async fn indicators_for_supplied_series() {
        let rows: Vec<String> = (0..40)
            .map(|i| {
                let c = 1.0 + (i as f64 * 0.3).sin() * 0.05;
                format!("[{i}, {c}, {}, {}, {c}]", c + 0.01, c - 0.01)
            })
            .collect();
        let body = format!(r#"{{"shortData": [{}], "longData": []}}"#, rows.join(","));

        let app = router(test_state(true));
        let (status, _, json) = send(app, post_json("/api/v1/indicators", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["veryShort"].is_null());
        assert!(json["short"]["rsi"].is_string());
        assert!(json["long"].is_null());
    }

    #[tokio::test]
    async fn dashboard_serves_published_snapshot() {
        let state = test_state(true);
        state.publish_dashboard(crate::app_state::DashboardSnapshot {
            price: Some(0.4512),
            error: Some("Error fetching market data".into()),
            ..Default::default()
        });
        let req = Request::get("/api/v1/dashboard").body(Body::empty()).unwrap();
        let (status, _, json) = send(router(state.clone()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["price"], 0.4512);
        assert_eq!(json["stateVersion"], state.current_state_version());
    }
}
