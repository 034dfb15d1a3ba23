//! Policy convergence: the canned policy is upserted on every pass.

use super::{ConvergenceStrategy, Stage, StageFailure};
use crate::crd::{Condition, Policy};
use crate::provider::AdminClient;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyStrategy;

#[async_trait]
impl ConvergenceStrategy<Policy> for PolicyStrategy {
    async fn apply(
        &self,
        record: &Policy,
        admin: &dyn AdminClient,
    ) -> Result<Vec<Condition>, StageFailure> {
        admin
            .add_canned_policy(&record.spec.name, &record.spec.statement)
            .await
            .map_err(|e| StageFailure::new(Stage::PolicyCreate, e))?;
        info!(policy = %record.spec.name, "canned policy applied");
        Ok(Vec::new())
    }
}
