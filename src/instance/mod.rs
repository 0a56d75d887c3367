//! Container instances behind the router.
//!
//! The sandbox runtime owns instance lifecycles and the name-to-instance
//! registry. This module only describes the operations the router needs
//! from it ([`InstanceRegistry`]) and how their failures are reported
//! back to callers ([`InstanceAdapter`]).

pub mod adapter;
pub mod http;
pub mod lifecycle;

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::{Config, Profile};

pub use adapter::InstanceAdapter;
pub use http::HttpInstanceRegistry;
pub use lifecycle::{LifecycleHooks, LoggingHooks};

/// Namespace for deriving instance ids from names.
const INSTANCE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93d7_4b8a_a5e2_7c0d_19f3_b846);

/// A resolved instance: the logical name and the stable id derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    pub name: String,
    pub id: Uuid,
}

impl InstanceHandle {
    /// Same name, same id.
    pub fn from_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: Uuid::new_v5(&INSTANCE_ID_NAMESPACE, name.as_bytes()),
        }
    }
}

/// Definition of an instance: the environment and runtime settings the
/// runtime uses whenever it has to bring the instance up.
///
/// Sent with explicit start calls and with every forwarded request, so an
/// instance started on first contact gets the same settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartConfig {
    pub port: u16,
    /// Idle window after which the runtime may put the instance to sleep.
    pub sleep_after_secs: u64,
    /// Upper bound the runtime allows for a single start.
    pub timeout_secs: u64,
    pub env: BTreeMap<String, String>,
}

impl StartConfig {
    pub fn from_config(config: &Config) -> Self {
        let port = config.instance_port.to_string();
        let mut env = BTreeMap::from([
            ("FLASK_APP".to_string(), config.flask_app.clone()),
            ("FLASK_RUN_HOST".to_string(), "0.0.0.0".to_string()),
            ("FLASK_RUN_PORT".to_string(), port),
            ("FLASK_ENV".to_string(), "production".to_string()),
        ]);
        if config.profile == Profile::V2 {
            env.insert("USE_WORKER_R2_BINDING".to_string(), "true".to_string());
        }

        Self {
            port: config.instance_port,
            sleep_after_secs: config.instance_sleep_after_secs,
            timeout_secs: config.instance_timeout_secs,
            env,
        }
    }
}

/// What a start call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The instance was launched by this call.
    Started,
    /// The instance was already up.
    Running,
}

/// Failures surfaced by the sandbox runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    /// The instance is not running yet.
    #[error("container is not running: {0}")]
    NotReady(String),
    /// The runtime rejected the call because another one holds the instance.
    #[error("container is busy: {0}")]
    TransientConflict(String),
    #[error("{0}")]
    Other(String),
}

impl InstanceError {
    /// Whether the caller should simply retry in a few seconds.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InstanceError::NotReady(_) | InstanceError::TransientConflict(_)
        )
    }
}

/// Keyed access to container instances.
#[async_trait]
pub trait InstanceRegistry: Send + Sync + 'static {
    /// Maps a logical key to its instance. Does not contact the instance.
    fn resolve(&self, key: &str) -> anyhow::Result<InstanceHandle>;

    /// Asks the runtime to bring the instance up with the given configuration.
    async fn start(
        &self,
        handle: &InstanceHandle,
        config: &StartConfig,
    ) -> Result<StartOutcome, InstanceError>;

    /// Sends the request to the instance's HTTP listener. The runtime starts
    /// the instance from `definition` if it is not running.
    async fn forward(
        &self,
        handle: &InstanceHandle,
        definition: &StartConfig,
        request: Request,
    ) -> Result<Response, InstanceError>;
}
