use utoipa::OpenApi;

use crate::handlers;
use crate::models::{DebugSecretsResponse, InstanceStatusResponse, UploadResponse};

/// OpenAPI documentation for the endpoints the router answers itself.
///
/// Forwarded paths belong to the backend and are not described here.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ytdlp-container-router API",
        version = "0.1.0",
        description = "Request router in front of the yt-dlp container pool with an R2 upload proxy"
    ),
    paths(
        handlers::health::health_handler,
        handlers::upload::upload_handler,
        handlers::debug::debug_secrets_handler
    ),
    components(
        schemas(
            UploadResponse,
            DebugSecretsResponse,
            InstanceStatusResponse
        )
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "storage", description = "Object storage uploads"),
        (name = "debug", description = "Deployment diagnostics")
    )
)]
pub struct ApiDoc;
