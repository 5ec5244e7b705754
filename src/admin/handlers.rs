use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use super::service::AdminService;

/// Query parameters of a scale request: `PUT /?code=add&ip=10.0.0.5&type=Node`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScaleParams {
    pub code: String,
    pub ip: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Control surface for operators.
pub fn router(service: Arc<AdminService>) -> Router {
    Router::new()
        .route("/", get(handle_status).put(handle_scale))
        .route("/start", get(handle_start))
        .route("/stop", get(handle_stop))
        .route("/refresh", get(handle_status))
        .layer(Extension(service))
}

pub async fn handle_status(
    Extension(service): Extension<Arc<AdminService>>,
) -> (StatusCode, String) {
    (StatusCode::OK, service.render_status())
}

pub async fn handle_start(
    Extension(service): Extension<Arc<AdminService>>,
) -> (StatusCode, String) {
    if service.start_monitoring() {
        (StatusCode::OK, "Monitoring started".to_string())
    } else {
        (StatusCode::OK, "Monitoring already running".to_string())
    }
}

pub async fn handle_stop(
    Extension(service): Extension<Arc<AdminService>>,
) -> (StatusCode, String) {
    service.stop_monitoring();
    (StatusCode::OK, "Monitoring stopped".to_string())
}

pub async fn handle_scale(
    Extension(service): Extension<Arc<AdminService>>,
    Query(params): Query<ScaleParams>,
) -> (StatusCode, String) {
    let outcome = service.scale(&params.code, &params.ip, &params.kind).await;
    (StatusCode::OK, outcome.to_string())
}
