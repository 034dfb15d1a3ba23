//! # Providers
//!
//! Remote administration adapters. The reconciler only talks to MinIO through
//! the [`AdminClient`] trait, so strategies can be tested against in-memory fakes.
//!
//! - `minio`: MinIO implementation (S3 API for buckets, admin REST API for policies and users)

pub mod minio;

pub use minio::{connection_target, MinioAdminClient, MinioConnector};

use crate::crd::RetentionMode;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Kind-specific operations against the remote storage administration service
///
/// Implementations are stateless; every call is independent.
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Whether the bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket; object locking can only be chosen here
    async fn make_bucket(&self, bucket: &str, object_locking: bool) -> Result<()>;

    /// Set the default retention of an object-locked bucket
    async fn set_object_lock_config(
        &self,
        bucket: &str,
        mode: RetentionMode,
        retention_days: u32,
    ) -> Result<()>;

    async fn enable_versioning(&self, bucket: &str) -> Result<()>;

    /// Create or replace a canned policy
    async fn add_canned_policy(&self, name: &str, statement: &str) -> Result<()>;

    /// Create a user, or reset the secret key of an existing one
    async fn add_user(&self, access_key: &str, secret_key: &str) -> Result<()>;

    /// Attach a canned policy to a user
    async fn attach_policy(&self, policy: &str, user: &str) -> Result<()>;
}

/// Builds admin clients from the injected configuration
#[async_trait]
pub trait AdminConnector: Send + Sync {
    /// Endpoint shown in logs and failure messages
    fn endpoint(&self) -> String;

    async fn connect(&self) -> Result<Arc<dyn AdminClient>>;
}
