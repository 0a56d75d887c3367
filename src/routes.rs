// Route path constants and the ordered routing table

use crate::config::Config;

pub const CONTAINER_PREFIX: &str = "/container";
pub const LOAD_BALANCE_PREFIX: &str = "/lb";
pub const MAIN_INSTANCE_PREFIXES: [&str; 7] = [
    "/get_",
    "/status",
    "/files",
    "/create_key",
    "/delete_key",
    "/get_key",
    "/check_permissions",
];
pub const HEALTH: &str = "/health";
pub const R2_UPLOAD_PREFIX: &str = "/r2-upload/";
pub const R2_UPLOAD_ITEM: &str = "/r2-upload/{key}";
pub const DEBUG_SECRETS: &str = "/debug-secrets";
pub const SWAGGER_UI: &str = "/swagger-ui";
pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";

/// How a path is compared against a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMatcher {
    Exact(&'static str),
    Prefix(&'static str),
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(expected) => path == *expected,
            PathMatcher::Prefix(prefix) => path.starts_with(prefix),
        }
    }
}

/// What to do with a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to the instance named by the full request path.
    InstanceByPath,
    /// Forward to a randomly chosen pool instance.
    LoadBalanced,
    /// Forward to the main singleton instance.
    MainInstance,
    Health,
    Upload,
    DebugSecrets,
}

/// Ordered routing table; the first matching entry wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<(PathMatcher, Route)>,
}

impl RouteTable {
    pub fn new(upload_enabled: bool, debug_enabled: bool) -> Self {
        let mut entries = vec![
            (PathMatcher::Prefix(CONTAINER_PREFIX), Route::InstanceByPath),
            (PathMatcher::Prefix(LOAD_BALANCE_PREFIX), Route::LoadBalanced),
        ];
        entries.extend(
            MAIN_INSTANCE_PREFIXES
                .into_iter()
                .map(|prefix| (PathMatcher::Prefix(prefix), Route::MainInstance)),
        );
        entries.push((PathMatcher::Exact(HEALTH), Route::Health));
        if upload_enabled {
            entries.push((PathMatcher::Prefix(R2_UPLOAD_PREFIX), Route::Upload));
        }
        if debug_enabled {
            entries.push((PathMatcher::Exact(DEBUG_SECRETS), Route::DebugSecrets));
        }
        Self { entries }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upload_route_enabled, config.debug_route_enabled)
    }

    pub fn resolve(&self, path: &str) -> Option<Route> {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(path))
            .map(|(_, route)| *route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_prefixes() {
        let table = RouteTable::new(false, false);

        assert_eq!(table.resolve("/container"), Some(Route::InstanceByPath));
        assert_eq!(table.resolve("/container/7/status"), Some(Route::InstanceByPath));
        assert_eq!(table.resolve("/containers"), Some(Route::InstanceByPath));
        assert_eq!(table.resolve("/lb"), Some(Route::LoadBalanced));
        assert_eq!(table.resolve("/lb/download"), Some(Route::LoadBalanced));
        for path in [
            "/get_info",
            "/get_key/abc",
            "/status/123",
            "/files",
            "/create_key",
            "/delete_key/xyz",
            "/check_permissions",
        ] {
            assert_eq!(table.resolve(path), Some(Route::MainInstance), "{path}");
        }
    }

    #[test]
    fn test_health_is_exact() {
        let table = RouteTable::new(false, false);

        assert_eq!(table.resolve("/health"), Some(Route::Health));
        assert_eq!(table.resolve("/health/"), None);
        assert_eq!(table.resolve("/healthz"), None);
    }

    #[test]
    fn test_optional_routes() {
        let without = RouteTable::new(false, false);
        assert_eq!(without.resolve("/r2-upload/foo"), None);
        assert_eq!(without.resolve("/debug-secrets"), None);

        let with = RouteTable::new(true, true);
        assert_eq!(with.resolve("/r2-upload/foo"), Some(Route::Upload));
        assert_eq!(with.resolve("/r2-upload/"), Some(Route::Upload));
        assert_eq!(with.resolve("/r2-upload"), None);
        assert_eq!(with.resolve("/debug-secrets"), Some(Route::DebugSecrets));
    }

    #[test]
    fn test_unmatched() {
        let table = RouteTable::new(true, true);

        assert_eq!(table.resolve("/"), None);
        assert_eq!(table.resolve("/nonexistent"), None);
        assert_eq!(table.resolve("/api/status"), None);
    }
}
