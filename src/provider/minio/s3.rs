//! # Bucket Operations
//!
//! MinIO speaks the S3 API for buckets, so bucket existence, creation,
//! object locking and versioning go through the AWS S3 SDK pointed at the
//! MinIO endpoint with path-style addressing.

use crate::config::MinioConfig;
use crate::crd::RetentionMode;
use anyhow::{Context, Result};
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration,
    DefaultRetention, ObjectLockConfiguration, ObjectLockEnabled, ObjectLockRetentionMode,
    ObjectLockRule, VersioningConfiguration,
};
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

/// Region S3 treats as the default location for new buckets
const DEFAULT_LOCATION: &str = "us-east-1";

/// Provider name attached to the static MinIO credentials
pub(super) const CREDENTIALS_PROVIDER: &str = "minio-static";

pub(super) struct BucketApi {
    client: S3Client,
    region: String,
}

impl BucketApi {
    /// Build an S3 client for `base_url` using the configured admin credentials
    pub(super) async fn new(base_url: &str, config: &MinioConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.as_str(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(base_url)
            .credentials_provider(credentials)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.request_timeout)
                    .build(),
            )
            .load()
            .await;

        // MinIO buckets are addressed by path, not by virtual host
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            region: config.region.clone(),
        }
    }

    pub(super) async fn exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Ok(false);
                }
                // HEAD responses carry no error body, so a 404 may not be modeled
                if err
                    .raw_response()
                    .is_some_and(|response| response.status().as_u16() == 404)
                {
                    return Ok(false);
                }
                Err(err).context(format!("Failed to check whether bucket '{bucket}' exists"))
            }
        }
    }

    pub(super) async fn create(&self, bucket: &str, object_locking: bool) -> Result<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .object_lock_enabled_for_bucket(object_locking);

        if self.region != DEFAULT_LOCATION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .context(format!("Failed to create bucket '{bucket}'"))?;
        debug!(bucket, object_locking, "bucket created");
        Ok(())
    }

    pub(super) async fn set_object_lock(
        &self,
        bucket: &str,
        mode: RetentionMode,
        retention_days: u32,
    ) -> Result<()> {
        let retention = DefaultRetention::builder()
            .mode(retention_mode(mode))
            .days(i32::try_from(retention_days).unwrap_or(i32::MAX))
            .build();
        let configuration = ObjectLockConfiguration::builder()
            .object_lock_enabled(ObjectLockEnabled::Enabled)
            .rule(ObjectLockRule::builder().default_retention(retention).build())
            .build();

        self.client
            .put_object_lock_configuration()
            .bucket(bucket)
            .object_lock_configuration(configuration)
            .send()
            .await
            .context(format!(
                "Failed to set {mode} object lock ({retention_days} days) on bucket '{bucket}'"
            ))?;
        Ok(())
    }

    pub(super) async fn enable_versioning(&self, bucket: &str) -> Result<()> {
        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .context(format!("Failed to enable versioning on bucket '{bucket}'"))?;
        Ok(())
    }
}

fn retention_mode(mode: RetentionMode) -> ObjectLockRetentionMode {
    match mode {
        RetentionMode::Governance => ObjectLockRetentionMode::Governance,
        RetentionMode::Compliance => ObjectLockRetentionMode::Compliance,
    }
}
