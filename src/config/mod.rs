//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables (populated from ConfigMap).
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Configuration is read once at startup and injected into the reconciler; changing it
//! requires a restart.

mod controller;
mod server;

pub use controller::{ControllerConfig, CredentialPublishPolicy, MinioConfig};
pub use server::ServerConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Read a value through `lookup` or return the default value
///
/// Unparseable values fall back to the default rather than failing startup.
pub(crate) fn var_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Environment-backed lookup used by `from_env` constructors
pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
