use crate::routes;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// /health handler - Liveness check
///
/// Answers any method without touching the instances.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Router is alive", body = String)
    ),
    tag = "health"
)]
pub async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
