//! # MinIO Client
//!
//! `AdminClient` implementation backed by a MinIO deployment.
//!
//! - Bucket operations use the S3 API (`s3`)
//! - Policies and users use the signed admin REST API (`admin`)
//! - User secret keys are encrypted for the admin API (`crypto`)

mod admin;
mod crypto;
mod s3;

use crate::config::MinioConfig;
use crate::crd::RetentionMode;
use crate::observability::metrics;
use crate::provider::{AdminClient, AdminConnector};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{warn, Instrument};
use url::Url;

use self::admin::AdminApi;
use self::s3::BucketApi;

/// Derive the `host[:port]` to connect to from a configured endpoint.
///
/// A parseable URL with a host contributes its authority; anything else
/// (a bare `host:port`, an unparseable string) is used unchanged.
pub fn connection_target(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    let Ok(url) = Url::parse(endpoint) else {
        return endpoint.to_string();
    };
    match url.host_str() {
        Some(host) if !host.is_empty() => match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        },
        _ => endpoint.to_string(),
    }
}

/// Opens MinIO sessions from the controller's configured credentials
#[derive(Debug, Clone)]
pub struct MinioConnector {
    config: MinioConfig,
}

impl MinioConnector {
    pub fn new(config: MinioConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AdminConnector for MinioConnector {
    fn endpoint(&self) -> String {
        connection_target(&self.config.endpoint)
    }

    async fn connect(&self) -> Result<Arc<dyn AdminClient>> {
        let client = MinioAdminClient::new(&self.config).await?;
        Ok(Arc::new(client))
    }
}

/// Authenticated session against one MinIO endpoint
pub struct MinioAdminClient {
    target: String,
    buckets: BucketApi,
    admin: AdminApi,
}

impl std::fmt::Debug for MinioAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinioAdminClient")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl MinioAdminClient {
    /// Create a session for the configured endpoint.
    ///
    /// Fails when no credentials are configured or the endpoint does not
    /// form a valid URL.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error conditions are described above"
    )]
    pub async fn new(config: &MinioConfig) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(anyhow!(
                "MinIO credentials are not configured (MINIO_ACCESS_KEY / MINIO_SECRET_KEY)"
            ));
        }

        let target = connection_target(&config.endpoint);
        let scheme = if config.secure { "https" } else { "http" };
        let base_url = Url::parse(&format!("{scheme}://{target}"))
            .context(format!("Invalid MinIO endpoint '{}'", config.endpoint))?;

        let buckets = BucketApi::new(base_url.as_str(), config).await;
        let admin = AdminApi::new(base_url, config)?;

        Ok(Self {
            target,
            buckets,
            admin,
        })
    }
}

/// Time a MinIO call and record it under `operation`
async fn observe<T, F>(operation: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let span = tracing::debug_span!("minio.operation", operation);
    let start = Instant::now();
    let result = call.instrument(span).await;
    metrics::record_minio_operation(operation, start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::increment_minio_operation_errors(operation);
        warn!(operation, error = %format!("{e:#}"), "MinIO operation failed");
    }
    result
}

#[async_trait]
impl AdminClient for MinioAdminClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        observe("bucket_exists", self.buckets.exists(bucket)).await
    }

    async fn make_bucket(&self, bucket: &str, object_locking: bool) -> Result<()> {
        observe("make_bucket", self.buckets.create(bucket, object_locking)).await
    }

    async fn set_object_lock_config(
        &self,
        bucket: &str,
        mode: RetentionMode,
        retention_days: u32,
    ) -> Result<()> {
        observe(
            "set_object_lock_config",
            self.buckets.set_object_lock(bucket, mode, retention_days),
        )
        .await
    }

    async fn enable_versioning(&self, bucket: &str) -> Result<()> {
        observe("enable_versioning", self.buckets.enable_versioning(bucket)).await
    }

    async fn add_canned_policy(&self, name: &str, statement: &str) -> Result<()> {
        observe("add_canned_policy", self.admin.add_canned_policy(name, statement)).await
    }

    async fn add_user(&self, access_key: &str, secret_key: &str) -> Result<()> {
        observe("add_user", self.admin.add_user(access_key, secret_key)).await
    }

    async fn attach_policy(&self, policy: &str, user: &str) -> Result<()> {
        observe("attach_policy", self.admin.attach_policy(policy, user)).await
    }
}
