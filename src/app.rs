//! Router assembly and request dispatch.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::balancer::{RandomChooser, pick_pool_instance};
use crate::config::{BucketBinding, Config};
use crate::error::ApiError;
use crate::handlers;
use crate::instance::{HttpInstanceRegistry, InstanceAdapter, LoggingHooks, StartConfig};
use crate::routes::{self, Route, RouteTable};
use crate::state::AppState;
use crate::storage::{FsObjectStore, MemoryObjectStore, ObjectStore};

/// Wires the production collaborators described by `config`.
pub fn state_from_config(config: Config) -> AppState {
    let registry = Arc::new(HttpInstanceRegistry::new(config.sandbox_control_url.clone()));
    let instances = InstanceAdapter::new(
        registry,
        Arc::new(LoggingHooks),
        StartConfig::from_config(&config),
        config.start_instances,
    );

    let bucket: Option<Arc<dyn ObjectStore>> = match &config.r2_bucket {
        Some(BucketBinding::Memory) => Some(Arc::new(MemoryObjectStore::new())),
        Some(BucketBinding::Directory(dir)) => Some(Arc::new(FsObjectStore::new(dir.clone()))),
        None => None,
    };

    AppState {
        routes: Arc::new(RouteTable::from_config(&config)),
        instances,
        chooser: Arc::new(RandomChooser),
        bucket,
        config: Arc::new(config),
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();
    if state.config.openapi_enabled {
        router = router.merge(
            SwaggerUi::new(routes::SWAGGER_UI).url(routes::OPENAPI_JSON, ApiDoc::openapi()),
        );
    }

    router
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
}

/// Looks the path up in the routing table and runs the matching handler.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_owned();
    let Some(route) = state.routes.resolve(&path) else {
        tracing::debug!("No route for {} {}", request.method(), path);
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    match handle_route(&state, route, &path, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_route(
    state: &AppState,
    route: Route,
    path: &str,
    request: Request,
) -> Result<Response, ApiError> {
    match route {
        Route::InstanceByPath => handlers::forward_handler(state, path, request).await,
        Route::LoadBalanced => {
            let instance = pick_pool_instance(state.chooser.as_ref());
            handlers::forward_handler(state, &instance, request).await
        }
        Route::MainInstance => {
            handlers::forward_handler(state, &state.config.main_instance_name, request).await
        }
        Route::Health => Ok(handlers::health_handler().await),
        Route::Upload => {
            let key = path.strip_prefix(routes::R2_UPLOAD_PREFIX).unwrap_or_default();
            Ok(handlers::upload_handler(state, key, request).await)
        }
        Route::DebugSecrets => Ok(handlers::debug_secrets_handler(state).await.into_response()),
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!("Container error: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Container Error: {}", detail),
    )
        .into_response()
}
