use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::Request, response::Response};

/// Hands the request to the instance registered under `key`.
pub async fn forward_handler(
    state: &AppState,
    key: &str,
    request: Request,
) -> Result<Response, ApiError> {
    Ok(state.instances.forward(key, request).await?)
}
