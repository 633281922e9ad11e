use crate::api::{
    CurrentParams, DetectRequest, DetectResponse, MAX_REQUEST_BODY_BYTES, ModelInfoResponse,
    ReloadModelRequest, ReloadModelResponse, UpdateParamsRequest, UpdateParamsResponse,
};
use crate::service::DetectionService;
use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
};
use detector::DetectionBackend;
use opentelemetry::{
    global,
    propagation::{Extractor, TextMapPropagator},
};
use tokio::task::JoinError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub fn router<B: DetectionBackend + 'static>(service: DetectionService<B>) -> Router {
    Router::new()
        .route("/v1/detect", post(detect::<B>))
        .route("/v1/reload_model", post(reload_model::<B>))
        .route("/v1/update_params", post(update_params::<B>))
        .route("/v1/params", get(params::<B>))
        .route("/v1/model", get(model_info::<B>))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Per-request span, parented to the caller's W3C trace context when present.
fn request_span(request: &Request<Body>) -> Span {
    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
    );
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });
    let _ = span.set_parent(parent);
    span
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Run `f` on the blocking pool inside the current request span.
async fn blocking<T, F>(f: F) -> Result<T, JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f)).await
}

fn internal(e: JoinError) -> String {
    format!("Internal error: {e}")
}

async fn detect<B: DetectionBackend + 'static>(
    State(service): State<DetectionService<B>>,
    Json(request): Json<DetectRequest>,
) -> Json<DetectResponse> {
    let frame_id = request.frame_id;
    let worker = service.clone();
    match blocking(move || worker.detect(request)).await {
        Ok(response) => Json(response),
        Err(e) => Json(service.detect_failed(frame_id, &internal(e))),
    }
}

async fn reload_model<B: DetectionBackend + 'static>(
    State(service): State<DetectionService<B>>,
    Json(request): Json<ReloadModelRequest>,
) -> Json<ReloadModelResponse> {
    let requested = request.model_path.clone();
    let worker = service.clone();
    match blocking(move || worker.reload_model(request)).await {
        Ok(response) => Json(response),
        Err(e) => Json(service.reload_failed(requested.as_deref(), &internal(e))),
    }
}

async fn update_params<B: DetectionBackend + 'static>(
    State(service): State<DetectionService<B>>,
    Json(request): Json<UpdateParamsRequest>,
) -> Json<UpdateParamsResponse> {
    let worker = service.clone();
    match blocking(move || worker.update_params(request)).await {
        Ok(response) => Json(response),
        Err(e) => Json(service.update_failed(&internal(e))),
    }
}

// Reads take the detector lock, which a running detection holds.
async fn params<B: DetectionBackend + 'static>(
    State(service): State<DetectionService<B>>,
) -> Result<Json<CurrentParams>, (StatusCode, String)> {
    blocking(move || service.params())
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, internal(e)))
}

async fn model_info<B: DetectionBackend + 'static>(
    State(service): State<DetectionService<B>>,
) -> Result<Json<ModelInfoResponse>, (StatusCode, String)> {
    blocking(move || service.model_info())
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, internal(e)))
}

async fn healthz() -> &'static str {
    "ok"
}
