use crate::metrics::Metrics;
use crate::source::TelemetrySource;
use crate::speedtest::{Activation, SpeedTestController, SpeedTestPhase};
use crate::surface::{MemorySurface, SurfaceView};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

pub struct HttpAppState<S> {
    pub metrics: Arc<Metrics>,
    pub surface: Arc<MemorySurface>,
    pub speedtest: Arc<SpeedTestController<S>>,
}

impl<S> Clone for HttpAppState<S> {
    fn clone(&self) -> Self {
        Self {
            metrics: self.metrics.clone(),
            surface: self.surface.clone(),
            speedtest: self.speedtest.clone(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiRegions {
    pub last_render: Option<String>,
    pub speedtest_phase: SpeedTestPhase,
    #[serde(flatten)]
    pub surface: SurfaceView,
}

#[derive(Debug, Clone, serde::Serialize)]
struct TriggerResponse {
    outcome: &'static str,
}

pub fn build_router<S: TelemetrySource>(
    metrics: Arc<Metrics>,
    surface: Arc<MemorySurface>,
    speedtest: Arc<SpeedTestController<S>>,
) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler::<S>))
        .route("/api/regions", get(regions_handler::<S>))
        .route("/api/speedtest/trigger", post(trigger_handler::<S>))
        .with_state(HttpAppState {
            metrics,
            surface,
            speedtest,
        })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler<S: TelemetrySource>(State(state): State<HttpAppState<S>>) -> Response {
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn regions_handler<S: TelemetrySource>(
    State(state): State<HttpAppState<S>>,
) -> impl IntoResponse {
    Json(ApiRegions {
        last_render: state.metrics.last_render_unix().map(format_unix),
        speedtest_phase: state.speedtest.phase(),
        surface: state.surface.view(),
    })
}

async fn trigger_handler<S: TelemetrySource>(
    State(state): State<HttpAppState<S>>,
) -> impl IntoResponse {
    let outcome = state.speedtest.activate().await;
    let status = match outcome {
        Activation::Dispatched => StatusCode::ACCEPTED,
        Activation::Busy => StatusCode::CONFLICT,
        Activation::Failed => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(TriggerResponse {
            outcome: outcome.as_str(),
        }),
    )
}

fn format_unix(ts: i64) -> String {
    let st = UNIX_EPOCH + Duration::from_secs(ts.max(0) as u64);
    humantime::format_rfc3339_seconds(st).to_string()
}
