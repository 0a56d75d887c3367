use std::sync::Arc;

use axum::Json;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::{
    InstanceError, InstanceHandle, InstanceRegistry, LifecycleHooks, StartConfig, StartOutcome,
};
use crate::models::InstanceStatusResponse;

/// Forwards requests to instances and turns runtime failures into responses.
///
/// Every forward carries the instance definition. With `explicit_start` set
/// it is also preceded by a start call; otherwise the runtime brings
/// instances up on first contact.
#[derive(Clone)]
pub struct InstanceAdapter {
    registry: Arc<dyn InstanceRegistry>,
    hooks: Arc<dyn LifecycleHooks>,
    definition: StartConfig,
    explicit_start: bool,
}

impl InstanceAdapter {
    pub fn new(
        registry: Arc<dyn InstanceRegistry>,
        hooks: Arc<dyn LifecycleHooks>,
        definition: StartConfig,
        explicit_start: bool,
    ) -> Self {
        Self {
            registry,
            hooks,
            definition,
            explicit_start,
        }
    }

    /// Resolves `key`, optionally starts the instance and forwards `request` to it.
    ///
    /// Only a failure to resolve the key is returned as an error; start and
    /// forward failures are already rendered into the response.
    pub async fn forward(&self, key: &str, request: Request) -> anyhow::Result<Response> {
        let handle = self.registry.resolve(key)?;
        tracing::debug!(key, instance = %handle.name, id = %handle.id, "forwarding request");

        if self.explicit_start {
            match self.registry.start(&handle, &self.definition).await {
                Ok(StartOutcome::Started) => self.hooks.on_start(&handle),
                Ok(StartOutcome::Running) => {}
                Err(err) => return Ok(self.failure_response(&handle, err)),
            }
        }

        match self.registry.forward(&handle, &self.definition, request).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(self.failure_response(&handle, err)),
        }
    }

    fn failure_response(&self, handle: &InstanceHandle, err: InstanceError) -> Response {
        if matches!(err, InstanceError::NotReady(_)) {
            self.hooks.on_stop(handle);
        }
        self.hooks.on_error(handle, &err);
        instance_error_response(&err)
    }
}

/// Renders an instance failure: retryable ones as 503 "starting", the rest as 500.
pub fn instance_error_response(err: &InstanceError) -> Response {
    if err.is_retryable() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(InstanceStatusResponse::starting()),
        )
            .into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(InstanceStatusResponse::error(err)),
        )
            .into_response()
    }
}
