use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

/// Deployment profile selecting the defaults of the two router generations.
///
/// `V1` forwards only; the runtime starts instances on first contact from the
/// definition sent along with each request.
/// `V2` starts instances explicitly and mounts the upload and debug routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    V1,
    V2,
}

impl FromStr for Profile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(Profile::V1),
            "v2" => Ok(Profile::V2),
            other => bail!("unknown profile '{}', expected 'v1' or 'v2'", other),
        }
    }
}

impl Profile {
    fn main_instance_name(self) -> &'static str {
        match self {
            Profile::V1 => "yt-dlp-main",
            Profile::V2 => "yt-dlp-main-v2",
        }
    }

    fn sleep_after_secs(self) -> u64 {
        match self {
            Profile::V1 => 10_000,
            Profile::V2 => 3_000,
        }
    }

    fn is_v2(self) -> bool {
        self == Profile::V2
    }
}

/// Where uploaded objects go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketBinding {
    /// Process-local bucket, selected with `R2_BUCKET_DIR=:memory:`.
    Memory,
    Directory(PathBuf),
}

impl BucketBinding {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" => None,
            ":memory:" => Some(BucketBinding::Memory),
            dir => Some(BucketBinding::Directory(PathBuf::from(dir))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service_host: String,
    pub service_port: u16,
    pub sandbox_control_url: String,
    pub profile: Profile,
    pub main_instance_name: String,
    pub start_instances: bool,
    pub instance_sleep_after_secs: u64,
    pub instance_timeout_secs: u64,
    pub instance_port: u16,
    pub flask_app: String,
    pub upload_route_enabled: bool,
    pub debug_route_enabled: bool,
    pub r2_bucket: Option<BucketBinding>,
    pub r2_public_url_base: String,
    pub openapi_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_host = lookup("SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let service_port = lookup("SERVICE_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let sandbox_control_url = lookup("SANDBOX_CONTROL_URL")
            .context("SANDBOX_CONTROL_URL environment variable is required")?;
        if !(sandbox_control_url.starts_with("http://")
            || sandbox_control_url.starts_with("https://"))
        {
            bail!(
                "SANDBOX_CONTROL_URL must be an http(s) URL, got '{}'",
                sandbox_control_url
            );
        }

        let profile = match lookup("ROUTER_PROFILE") {
            Some(raw) => raw.parse::<Profile>().context("ROUTER_PROFILE is invalid")?,
            None => Profile::V1,
        };

        let main_instance_name = lookup("MAIN_INSTANCE_NAME")
            .unwrap_or_else(|| profile.main_instance_name().to_string());

        let start_instances = parse_bool(&lookup, "START_INSTANCES", profile.is_v2())?;

        let instance_sleep_after_secs = match lookup("INSTANCE_SLEEP_AFTER_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("INSTANCE_SLEEP_AFTER_SECS must be a number of seconds")?,
            None => profile.sleep_after_secs(),
        };

        let instance_timeout_secs = lookup("INSTANCE_TIMEOUT_SECS")
            .unwrap_or_else(|| "10000".to_string())
            .parse::<u64>()
            .context("INSTANCE_TIMEOUT_SECS must be a number of seconds")?;

        let instance_port = lookup("INSTANCE_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("INSTANCE_PORT must be a valid port number (0-65535)")?;

        let flask_app = lookup("FLASK_APP").unwrap_or_else(|| "src/server.py".to_string());

        let upload_route_enabled = parse_bool(&lookup, "UPLOAD_ROUTE_ENABLED", profile.is_v2())?;
        let debug_route_enabled = parse_bool(&lookup, "DEBUG_ROUTE_ENABLED", profile.is_v2())?;

        let r2_bucket = lookup("R2_BUCKET_DIR").and_then(|raw| BucketBinding::parse(&raw));

        let r2_public_url_base = lookup("R2_PUBLIC_URL_BASE")
            .unwrap_or_else(|| "https://yt-dlp-container.r2.dev".to_string())
            .trim_end_matches('/')
            .to_string();

        let openapi_enabled = parse_bool(&lookup, "OPENAPI_ENABLED", false)?;

        Ok(Config {
            service_host,
            service_port,
            sandbox_control_url,
            profile,
            main_instance_name,
            start_instances,
            instance_sleep_after_secs,
            instance_timeout_secs,
            instance_port,
            flask_app,
            upload_route_enabled,
            debug_route_enabled,
            r2_bucket,
            r2_public_url_base,
            openapi_enabled,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Profile: {:?}", self.profile);
        tracing::info!("  Sandbox control plane: {}", self.sandbox_control_url);
        tracing::info!("  Main instance: {}", self.main_instance_name);
        tracing::info!(
            "  Instance definition: {} on port {} (sleep after {}s, timeout {}s)",
            self.flask_app,
            self.instance_port,
            self.instance_sleep_after_secs,
            self.instance_timeout_secs
        );
        tracing::info!("  Explicit instance start: {}", self.start_instances);
        tracing::info!("  Upload route: {}", self.upload_route_enabled);
        tracing::info!("  Debug route: {}", self.debug_route_enabled);
        tracing::info!(
            "  R2 bucket: {}",
            match &self.r2_bucket {
                Some(BucketBinding::Memory) => "in-memory".to_string(),
                Some(BucketBinding::Directory(dir)) => dir.display().to_string(),
                None => "not bound".to_string(),
            }
        );
        tracing::info!("  OpenAPI docs: {}", self.openapi_enabled);
        tracing::info!(
            "  Service listening on: {}:{}",
            self.service_host,
            self.service_port
        );
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("{} must be a boolean (true/false), got '{}'", name, raw),
    }
}
