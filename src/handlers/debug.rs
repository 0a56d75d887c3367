use crate::models::DebugSecretsResponse;
use crate::routes;
use crate::state::AppState;
use axum::Json;

/// /debug-secrets handler - Report which bindings are present
#[utoipa::path(
    get,
    path = routes::DEBUG_SECRETS,
    responses(
        (status = 200, description = "Binding availability", body = DebugSecretsResponse)
    ),
    tag = "debug"
)]
pub async fn debug_secrets_handler(state: &AppState) -> Json<DebugSecretsResponse> {
    Json(DebugSecretsResponse {
        r2_bucket_available: state.bucket.is_some(),
    })
}
