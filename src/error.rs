use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors that escape a route handler.
///
/// Rendered as the last-resort 500 with the error text as a plain body.
/// Failures with a documented response shape (instance startup, uploads)
/// are turned into responses by their handlers and never reach this type.
#[derive(Debug)]
pub enum ApiError {
    /// Anything the handlers could not render themselves
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Internal(err) = self;
        tracing::error!("Container error: {:#}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Container Error: {}", err),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}
