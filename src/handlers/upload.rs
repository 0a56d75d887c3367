use crate::models::UploadResponse;
use crate::routes;
use crate::state::AppState;
use crate::storage::DEFAULT_CONTENT_TYPE;
use axum::{
    Json,
    extract::Request,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};

/// PUT /r2-upload/{key} handler - Store the request body in the bucket
///
/// The key is the rest of the path, taken verbatim. The whole body is read
/// into memory before it is written.
#[utoipa::path(
    put,
    path = routes::R2_UPLOAD_ITEM,
    params(
        ("key" = String, Path, description = "Object key, used verbatim")
    ),
    request_body(
        content = String,
        content_type = "application/octet-stream",
        description = "Raw object bytes"
    ),
    responses(
        (status = 200, description = "Object stored", body = UploadResponse),
        (status = 400, description = "Empty object key", body = UploadResponse),
        (status = 405, description = "Method other than PUT", body = UploadResponse),
        (status = 500, description = "Storage failure", body = UploadResponse)
    ),
    tag = "storage"
)]
pub async fn upload_handler(state: &AppState, key: &str, request: Request) -> Response {
    if request.method() != Method::PUT {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "PUT")],
            Json(UploadResponse::failed("Method not allowed")),
        )
            .into_response();
    }

    if key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResponse::failed("Missing object key")),
        )
            .into_response();
    }

    let Some(bucket) = &state.bucket else {
        tracing::error!("Upload of {} rejected: no R2 bucket bound", key);
        return failure("R2 upload failed: R2 bucket binding is not configured".to_string());
    };

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let data = match axum::body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(data) => data,
        Err(e) => return failure(format!("R2 upload failed: {}", e)),
    };

    match bucket.put(key, data, &content_type).await {
        Ok(meta) => {
            tracing::info!("Stored {} ({} bytes, {})", meta.key, meta.size, meta.content_type);
            let url = format!("{}/{}", state.config.r2_public_url_base, key);
            (StatusCode::OK, Json(UploadResponse::uploaded(url))).into_response()
        }
        Err(e) => {
            tracing::error!("R2 upload of {} failed: {}", key, e);
            failure(format!("R2 upload failed: {}", e))
        }
    }
}

fn failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(UploadResponse::failed(message)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::balancer::RandomChooser;
    use crate::models::UploadResponse;
    use crate::storage::{FsObjectStore, MemoryObjectStore, ObjectStore};
    use crate::testing::{StubRegistry, body_bytes, send, test_config, test_state};
    use axum::{body::Body, http::Request, http::StatusCode, response::Response};
    use std::sync::Arc;
    use tower::ServiceExt;

    const V2: &[(&str, &str)] = &[
        ("ROUTER_PROFILE", "v2"),
        ("R2_PUBLIC_URL_BASE", "https://media.example.com"),
    ];

    fn state_with(bucket: Option<Arc<dyn ObjectStore>>) -> crate::state::AppState {
        test_state(
            test_config(V2),
            Arc::new(StubRegistry::default()),
            Arc::new(RandomChooser),
            bucket,
        )
    }

    async fn envelope(response: Response) -> UploadResponse {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_upload_success() {
        let bucket = MemoryObjectStore::new();
        let state = state_with(Some(Arc::new(bucket.clone())));

        let response = crate::app::build_router(state)
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/r2-upload/task-9/clip.webm")
                    .header("content-type", "video/webm")
                    .body(Body::from("webm-bytes"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = envelope(response).await;
        assert!(body.success);
        assert_eq!(
            body.url.as_deref(),
            Some("https://media.example.com/task-9/clip.webm")
        );
        assert_eq!(body.error, None);

        let (data, meta) = bucket.get("task-9/clip.webm").unwrap();
        assert_eq!(&data[..], b"webm-bytes");
        assert_eq!(meta.content_type, "video/webm");
    }

    #[tokio::test]
    async fn test_upload_default_content_type() {
        let bucket = MemoryObjectStore::new();
        let state = state_with(Some(Arc::new(bucket.clone())));

        let response = send(state, "PUT", "/r2-upload/foo", Body::from("data")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = envelope(response).await;
        assert!(body.success);
        assert!(body.url.unwrap().ends_with("/foo"));
        assert_eq!(bucket.get("foo").unwrap().1.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_rejects_other_methods() {
        let response = send(
            state_with(Some(Arc::new(MemoryObjectStore::new()))),
            "GET",
            "/r2-upload/",
            Body::empty(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "PUT");
        assert!(!envelope(response).await.success);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_key() {
        let response = send(
            state_with(Some(Arc::new(MemoryObjectStore::new()))),
            "PUT",
            "/r2-upload/",
            Body::from("data"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = envelope(response).await;
        assert!(!body.success);
        assert_eq!(body.url, None);
    }

    #[tokio::test]
    async fn test_upload_without_bucket() {
        let response = send(state_with(None), "PUT", "/r2-upload/foo", Body::from("data")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = envelope(response).await;
        assert!(!body.success);
        assert!(body.error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_upload_storage_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = state_with(Some(Arc::new(FsObjectStore::new(dir.path()))));

        let response = send(state, "PUT", "/r2-upload/../escape", Body::from("data")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = envelope(response).await;
        assert!(!body.success);
        assert_eq!(body.url, None);
        assert!(body.error.unwrap().starts_with("R2 upload failed:"));
    }

    #[tokio::test]
    async fn test_upload_route_disabled_in_v1() {
        let state = test_state(
            test_config(&[]),
            Arc::new(StubRegistry::default()),
            Arc::new(RandomChooser),
            Some(Arc::new(MemoryObjectStore::new())),
        );

        let response = send(state, "PUT", "/r2-upload/foo", Body::from("data")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
