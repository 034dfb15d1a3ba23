//! Bucket convergence: existence probe, creation with the object-locking
//! flag, then default retention and versioning.

use super::{ConvergenceStrategy, Stage, StageFailure};
use crate::crd::{Bucket, Condition};
use crate::provider::AdminClient;
use async_trait::async_trait;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct BucketStrategy;

#[async_trait]
impl ConvergenceStrategy<Bucket> for BucketStrategy {
    async fn probe(&self, record: &Bucket, admin: &dyn AdminClient) -> Result<bool, StageFailure> {
        let exists = admin
            .bucket_exists(&record.spec.name)
            .await
            .map_err(|e| StageFailure::new(Stage::BucketExistence, e))?;
        if exists {
            debug!(bucket = %record.spec.name, "bucket already exists");
        }
        Ok(exists)
    }

    async fn apply(
        &self,
        record: &Bucket,
        admin: &dyn AdminClient,
    ) -> Result<Vec<Condition>, StageFailure> {
        let spec = &record.spec;

        // Object locking can only be chosen at creation time
        admin
            .make_bucket(&spec.name, spec.object_locking.enabled)
            .await
            .map_err(|e| StageFailure::new(Stage::BucketCreate, e))?;
        info!(bucket = %spec.name, object_locking = spec.object_locking.enabled, "bucket created");

        if spec.object_locking.enabled {
            let mode = spec.object_locking.retention_mode();
            admin
                .set_object_lock_config(&spec.name, mode, spec.object_locking.retention)
                .await
                .map_err(|e| StageFailure::new(Stage::ObjectLock, e))?;
            info!(
                bucket = %spec.name,
                mode = %mode,
                retention_days = spec.object_locking.retention,
                "object lock configured"
            );
        }

        if spec.versioning.enabled {
            admin
                .enable_versioning(&spec.name)
                .await
                .map_err(|e| StageFailure::new(Stage::Versioning, e))?;
            info!(bucket = %spec.name, "versioning enabled");
        }

        Ok(Vec::new())
    }
}
