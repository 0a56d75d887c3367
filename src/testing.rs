//! Test doubles shared by the module tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;

use crate::balancer::Chooser;
use crate::config::Config;
use crate::instance::{
    InstanceAdapter, InstanceError, InstanceHandle, InstanceRegistry, LifecycleHooks,
    StartConfig, StartOutcome,
};
use crate::routes::RouteTable;
use crate::state::AppState;
use crate::storage::ObjectStore;

/// Registry that answers every forward with the instance name as body.
#[derive(Default)]
pub struct StubRegistry {
    resolve_error: Option<String>,
    start_error: Option<InstanceError>,
    forward_error: Option<InstanceError>,
    resolved: Mutex<Vec<String>>,
    started: Mutex<Vec<String>>,
    forwarded: Mutex<Vec<String>>,
    definitions: Mutex<Vec<StartConfig>>,
}

impl StubRegistry {
    pub fn failing_resolve(message: &str) -> Self {
        Self {
            resolve_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_start(err: InstanceError) -> Self {
        Self {
            start_error: Some(err),
            ..Default::default()
        }
    }

    pub fn failing_forward(err: InstanceError) -> Self {
        Self {
            forward_error: Some(err),
            ..Default::default()
        }
    }

    pub fn resolved_keys(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn started_keys(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn forwarded_keys(&self) -> Vec<String> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn forwarded_definitions(&self) -> Vec<StartConfig> {
        self.definitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstanceRegistry for StubRegistry {
    fn resolve(&self, key: &str) -> anyhow::Result<InstanceHandle> {
        if let Some(message) = &self.resolve_error {
            anyhow::bail!("{}", message);
        }
        self.resolved.lock().unwrap().push(key.to_string());
        Ok(InstanceHandle::from_name(key))
    }

    async fn start(
        &self,
        handle: &InstanceHandle,
        _config: &StartConfig,
    ) -> Result<StartOutcome, InstanceError> {
        if let Some(err) = &self.start_error {
            return Err(err.clone());
        }
        self.started.lock().unwrap().push(handle.name.clone());
        Ok(StartOutcome::Started)
    }

    async fn forward(
        &self,
        handle: &InstanceHandle,
        definition: &StartConfig,
        _request: Request,
    ) -> Result<Response, InstanceError> {
        if let Some(err) = &self.forward_error {
            return Err(err.clone());
        }
        self.forwarded.lock().unwrap().push(handle.name.clone());
        self.definitions.lock().unwrap().push(definition.clone());
        Ok(handle.name.clone().into_response())
    }
}

/// Hooks that remember which events fired, as `"<event>:<instance>"`.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str, handle: &InstanceHandle) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:{}", event, handle.name));
    }
}

impl LifecycleHooks for RecordingHooks {
    fn on_start(&self, handle: &InstanceHandle) {
        self.record("start", handle);
    }

    fn on_stop(&self, handle: &InstanceHandle) {
        self.record("stop", handle);
    }

    fn on_error(&self, handle: &InstanceHandle, _error: &InstanceError) {
        self.record("error", handle);
    }
}

/// Chooser that cycles through a fixed sequence of indices.
pub struct SequenceChooser {
    sequence: Vec<usize>,
    next: AtomicUsize,
}

impl SequenceChooser {
    pub fn new(sequence: Vec<usize>) -> Self {
        Self {
            sequence,
            next: AtomicUsize::new(0),
        }
    }
}

impl Chooser for SequenceChooser {
    fn choose(&self, n: usize) -> usize {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.sequence[i % self.sequence.len()] % n
    }
}

/// Configuration for the given variables on top of a local control plane URL.
pub fn test_config(vars: &[(&str, &str)]) -> Config {
    Config::from_lookup(|name| {
        if name == "SANDBOX_CONTROL_URL" {
            return Some("http://127.0.0.1:9".to_string());
        }
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    })
    .unwrap()
}

/// Application state wired to test doubles.
pub fn test_state(
    config: Config,
    registry: Arc<StubRegistry>,
    chooser: Arc<dyn Chooser>,
    bucket: Option<Arc<dyn ObjectStore>>,
) -> AppState {
    let instances = InstanceAdapter::new(
        registry,
        Arc::new(RecordingHooks::default()),
        StartConfig::from_config(&config),
        config.start_instances,
    );
    AppState {
        routes: Arc::new(RouteTable::from_config(&config)),
        instances,
        chooser,
        bucket,
        config: Arc::new(config),
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_control_plane(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Sends one request through the assembled router.
pub async fn send(state: AppState, method: &str, uri: &str, body: Body) -> Response {
    crate::app::build_router(state)
        .oneshot(
            axum::http::Request::builder()
                .method(method)
                .uri(uri)
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}
