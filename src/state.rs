use crate::balancer::Chooser;
use crate::config::Config;
use crate::instance::InstanceAdapter;
use crate::routes::RouteTable;
use crate::storage::ObjectStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub routes: Arc<RouteTable>,
    pub instances: InstanceAdapter,
    pub chooser: Arc<dyn Chooser>,
    pub bucket: Option<Arc<dyn ObjectStore>>,
}
