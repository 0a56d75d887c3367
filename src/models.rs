use serde::{Deserialize, Serialize};

/// Body returned when an instance could not serve the request
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InstanceStatusResponse {
    pub status: String,
    pub message: String,
}

impl InstanceStatusResponse {
    pub fn starting() -> Self {
        Self {
            status: "starting".to_string(),
            message: "Container is starting up, please try again in 10-15 seconds".to_string(),
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            status: "error".to_string(),
            message: format!("Container Error: {}", message),
        }
    }
}

/// Envelope returned by the upload endpoint
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn uploaded(url: String) -> Self {
        Self {
            success: true,
            url: Some(url),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Response type for the debug endpoint
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DebugSecretsResponse {
    pub r2_bucket_available: bool,
}
