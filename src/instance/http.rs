//! Registry backed by the sandbox control plane's HTTP API.
//!
//! Instances are addressed as `{base}/instances/{id}`. Start requests go to
//! `POST {base}/instances/{id}/start`; everything else under the instance
//! prefix is relayed to the instance's own listener, together with the
//! instance definition in `x-instance-definition` so the control plane can
//! start the instance on first contact. Rejections produced by
//! the control plane itself carry the `x-sandbox-error` header, so an
//! instance answering 503 on its own is never mistaken for a cold start.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use super::{InstanceError, InstanceHandle, InstanceRegistry, StartConfig, StartOutcome};

/// Header the control plane sets on responses it generated itself.
pub const SANDBOX_ERROR_HEADER: &str = "x-sandbox-error";
/// Header carrying the logical instance name on forwarded requests.
pub const INSTANCE_NAME_HEADER: &str = "x-instance-name";
/// Header carrying the JSON instance definition on forwarded requests.
pub const INSTANCE_DEFINITION_HEADER: &str = "x-instance-definition";

const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Serialize)]
struct Definition<'a> {
    name: &'a str,
    port: u16,
    sleep_after_secs: u64,
    timeout_secs: u64,
    env: &'a BTreeMap<String, String>,
}

impl<'a> Definition<'a> {
    fn new(handle: &'a InstanceHandle, config: &'a StartConfig) -> Self {
        Self {
            name: &handle.name,
            port: config.port,
            sleep_after_secs: config.sleep_after_secs,
            timeout_secs: config.timeout_secs,
            env: &config.env,
        }
    }
}

#[derive(Deserialize)]
struct StartResponse {
    state: StartOutcome,
}

/// HTTP client for the sandbox control plane.
#[derive(Clone)]
pub struct HttpInstanceRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpInstanceRegistry {
    /// Creates a registry targeting the given control plane base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn instance_url(&self, handle: &InstanceHandle, suffix: &str) -> String {
        format!(
            "{}/instances/{}{}",
            self.base_url.trim_end_matches('/'),
            handle.id,
            suffix
        )
    }
}

#[async_trait]
impl InstanceRegistry for HttpInstanceRegistry {
    fn resolve(&self, key: &str) -> anyhow::Result<InstanceHandle> {
        if key.is_empty() {
            anyhow::bail!("instance key must not be empty");
        }
        Ok(InstanceHandle::from_name(key))
    }

    async fn start(
        &self,
        handle: &InstanceHandle,
        config: &StartConfig,
    ) -> Result<StartOutcome, InstanceError> {
        let response = self
            .client
            .post(self.instance_url(handle, "/start"))
            .json(&Definition::new(handle, config))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let marker = sandbox_marker(response.headers());

        if status.is_success() && marker.is_none() {
            let body = response
                .json::<StartResponse>()
                .await
                .map_err(|e| InstanceError::Other(format!("invalid start response: {e}")))?;
            return Ok(body.state);
        }

        let message = read_message(response).await;
        Err(match marker {
            Some(marker) => classify_marker(&marker, message),
            None if status == StatusCode::CONFLICT => InstanceError::TransientConflict(message),
            None => InstanceError::Other(format!("instance start failed ({status}): {message}")),
        })
    }

    async fn forward(
        &self,
        handle: &InstanceHandle,
        definition: &StartConfig,
        request: Request,
    ) -> Result<Response, InstanceError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.instance_url(handle, path_and_query);

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| InstanceError::Other(format!("failed to read request body: {e}")))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        let name = HeaderValue::from_str(&handle.name)
            .map_err(|e| InstanceError::Other(format!("invalid instance name: {e}")))?;
        headers.insert(INSTANCE_NAME_HEADER, name);
        let definition = serde_json::to_string(&Definition::new(handle, definition))
            .map_err(|e| InstanceError::Other(format!("invalid instance definition: {e}")))?;
        let definition = HeaderValue::from_str(&definition)
            .map_err(|e| InstanceError::Other(format!("invalid instance definition: {e}")))?;
        headers.insert(INSTANCE_DEFINITION_HEADER, definition);

        let response = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        if let Some(marker) = sandbox_marker(response.headers()) {
            let message = read_message(response).await;
            return Err(classify_marker(&marker, message));
        }

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut forwarded = Response::new(Body::from_stream(response.bytes_stream()));
        *forwarded.status_mut() = status;
        *forwarded.headers_mut() = headers;
        Ok(forwarded)
    }
}

/// Removes the fixed hop-by-hop set plus any header the `Connection`
/// header lists.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Body of a control plane rejection, used as the error message.
async fn read_message(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("Failed to read control plane response body: {}", err);
            format!("unreadable response body: {err}")
        }
    }
}

fn sandbox_marker(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SANDBOX_ERROR_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_ascii_lowercase())
}

fn classify_marker(marker: &str, message: String) -> InstanceError {
    let message = if message.is_empty() {
        marker.to_string()
    } else {
        message
    };
    match marker {
        "not-running" => InstanceError::NotReady(message),
        "busy" => InstanceError::TransientConflict(message),
        _ => InstanceError::Other(message),
    }
}

/// A refused connection means the instance's port is not open yet.
fn transport_error(err: reqwest::Error) -> InstanceError {
    if err.is_connect() {
        InstanceError::NotReady(err.to_string())
    } else {
        InstanceError::Other(err.to_string())
    }
}
