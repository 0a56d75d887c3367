use super::{InstanceError, InstanceHandle};

/// Observers for instance lifecycle events. They never influence request handling.
pub trait LifecycleHooks: Send + Sync + 'static {
    fn on_start(&self, handle: &InstanceHandle);
    fn on_stop(&self, handle: &InstanceHandle);
    fn on_error(&self, handle: &InstanceHandle, error: &InstanceError);
}

/// Default hooks: log and move on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl LifecycleHooks for LoggingHooks {
    fn on_start(&self, handle: &InstanceHandle) {
        tracing::info!(
            instance = %handle.name,
            id = %handle.id,
            "YT-DLP container successfully started"
        );
    }

    fn on_stop(&self, handle: &InstanceHandle) {
        tracing::info!(
            instance = %handle.name,
            id = %handle.id,
            "YT-DLP container is not running"
        );
    }

    fn on_error(&self, handle: &InstanceHandle, error: &InstanceError) {
        tracing::error!(
            instance = %handle.name,
            id = %handle.id,
            "YT-DLP container error: {}",
            error
        );
    }
}
