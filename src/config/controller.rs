//! # Reconciler Configuration
//!
//! MinIO connection settings and reconciliation tuning loaded from environment variables.

use super::{env_lookup, var_or_default};
use crate::constants::{
    DEFAULT_MAX_CONCURRENT_RECONCILES, DEFAULT_MINIO_ENDPOINT, DEFAULT_MINIO_REGION,
    DEFAULT_MINIO_REQUEST_TIMEOUT_SECS, DEFAULT_REQUEUE_MAX_BACKOFF_SECS,
    DEFAULT_REQUEUE_MIN_BACKOFF_SECS, DEFAULT_STATUS_HISTORY_LIMIT,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

/// What to do when a user's credentials Secret already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPublishPolicy {
    /// Reuse the published secret key and leave the Secret untouched
    #[default]
    SkipIfExists,
    /// Generate a fresh secret key every time and replace the Secret
    Upsert,
}

impl CredentialPublishPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkipIfExists => "skip-if-exists",
            Self::Upsert => "upsert",
        }
    }
}

impl FromStr for CredentialPublishPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip-if-exists" | "skip" => Ok(Self::SkipIfExists),
            "upsert" => Ok(Self::Upsert),
            other => Err(format!(
                "unknown credential publish policy '{other}', expected 'skip-if-exists' or 'upsert'"
            )),
        }
    }
}

/// Connection settings for the MinIO administration endpoint
#[derive(Clone)]
pub struct MinioConfig {
    /// Bare `host:port` or URL; see `provider::connection_target`
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: Zeroizing<String>,
    /// Use TLS when talking to MinIO
    pub secure: bool,
    /// Region used for request signing
    pub region: String,
    /// Timeout applied to every remote call
    pub request_timeout: Duration,
}

impl fmt::Debug for MinioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinioConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MINIO_ENDPOINT.to_string(),
            access_key: String::new(),
            secret_key: Zeroizing::new(String::new()),
            secure: false,
            region: DEFAULT_MINIO_REGION.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_MINIO_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Reconciler configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub minio: MinioConfig,
    /// Maximum number of concurrent reconciliations per resource kind
    pub max_concurrent_reconciles: u16,
    /// Maximum number of conditions kept in a record's status (0 = unbounded)
    pub status_history_limit: usize,
    pub credential_publish_policy: CredentialPublishPolicy,
    /// Requeue backoff bounds (seconds)
    pub requeue_min_backoff_secs: u64,
    pub requeue_max_backoff_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            minio: MinioConfig::default(),
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            status_history_limit: DEFAULT_STATUS_HISTORY_LIMIT,
            credential_publish_policy: CredentialPublishPolicy::default(),
            requeue_min_backoff_secs: DEFAULT_REQUEUE_MIN_BACKOFF_SECS,
            requeue_max_backoff_secs: DEFAULT_REQUEUE_MAX_BACKOFF_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let minio = MinioConfig {
            endpoint: lookup("MINIO_ENDPOINT")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_MINIO_ENDPOINT.to_string()),
            access_key: lookup("MINIO_ACCESS_KEY").unwrap_or_default(),
            secret_key: Zeroizing::new(lookup("MINIO_SECRET_KEY").unwrap_or_default()),
            secure: var_or_default(&lookup, "MINIO_SECURE", false),
            region: lookup("MINIO_REGION")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MINIO_REGION.to_string()),
            request_timeout: Duration::from_secs(var_or_default(
                &lookup,
                "MINIO_REQUEST_TIMEOUT_SECS",
                DEFAULT_MINIO_REQUEST_TIMEOUT_SECS,
            )),
        };

        let min_backoff = var_or_default(
            &lookup,
            "REQUEUE_MIN_BACKOFF_SECS",
            DEFAULT_REQUEUE_MIN_BACKOFF_SECS,
        )
        .max(1);
        let max_backoff = var_or_default(
            &lookup,
            "REQUEUE_MAX_BACKOFF_SECS",
            DEFAULT_REQUEUE_MAX_BACKOFF_SECS,
        )
        .max(min_backoff);

        Self {
            minio,
            max_concurrent_reconciles: var_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILES",
                DEFAULT_MAX_CONCURRENT_RECONCILES,
            )
            .max(1),
            status_history_limit: var_or_default(
                &lookup,
                "STATUS_HISTORY_LIMIT",
                DEFAULT_STATUS_HISTORY_LIMIT,
            ),
            credential_publish_policy: var_or_default(
                &lookup,
                "CREDENTIAL_PUBLISH_POLICY",
                CredentialPublishPolicy::default(),
            ),
            requeue_min_backoff_secs: min_backoff,
            requeue_max_backoff_secs: max_backoff,
        }
    }

    /// Status history cap, `None` when history is unbounded
    pub fn history_limit(&self) -> Option<usize> {
        (self.status_history_limit > 0).then_some(self.status_history_limit)
    }
}
