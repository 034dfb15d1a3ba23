//! # Convergence Strategies
//!
//! One strategy per resource kind. A strategy knows what "desired" means for
//! its kind and which remote calls achieve it; the engine owns everything
//! else (loading, status history, requeue decisions).
//!
//! - `bucket`: probe for existence, create, then object lock and versioning
//! - `policy`: upsert the canned policy
//! - `user`: credentials, user creation, publication and policy attachment

mod bucket;
mod policy;
mod user;

pub use bucket::BucketStrategy;
pub use policy::PolicyStrategy;
pub use user::UserStrategy;

use crate::controller::reconciler::types::Requeue;
use crate::crd::Condition;
use crate::provider::AdminClient;
use async_trait::async_trait;
use std::fmt;

/// Reason recorded for each failed user-policy attachment
pub const POLICY_ATTACHMENT_FAILURE: &str = "policy attachment failure";

/// Step of an apply (or probe) that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BucketExistence,
    BucketCreate,
    ObjectLock,
    Versioning,
    PolicyCreate,
    UserCreate,
    CredentialPublish,
}

impl Stage {
    /// Reason recorded on the Failed condition
    pub fn reason(self) -> &'static str {
        match self {
            Self::BucketExistence => "existence check failure",
            Self::BucketCreate => "bucket creation failure",
            Self::ObjectLock => "object lock failure",
            Self::Versioning => "versioning failure",
            Self::PolicyCreate => "policy creation failure",
            Self::UserCreate => "user creation failure",
            Self::CredentialPublish => "secret creation failure",
        }
    }

    /// Whether the failure can safely be retried
    ///
    /// Object lock settings land on a bucket that already exists; retrying
    /// would not re-run creation, so it is left for an operator.
    pub fn requeue(self) -> Requeue {
        match self {
            Self::ObjectLock => Requeue::None,
            Self::BucketExistence
            | Self::BucketCreate
            | Self::Versioning
            | Self::PolicyCreate
            | Self::UserCreate
            | Self::CredentialPublish => Requeue::Immediate,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A failed stage and the error behind it
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: anyhow::Error,
}

impl StageFailure {
    pub fn new(stage: Stage, error: impl Into<anyhow::Error>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    /// Error detail stored as the condition message
    pub fn message(&self) -> String {
        format!("{:#}", self.error)
    }
}

/// Kind-specific convergence: {Probe, Apply}
#[async_trait]
pub trait ConvergenceStrategy<K>: Send + Sync {
    /// Whether the desired state already exists remotely.
    ///
    /// Kinds without a probe always apply.
    async fn probe(&self, _record: &K, _admin: &dyn AdminClient) -> Result<bool, StageFailure> {
        Ok(false)
    }

    /// Drive the remote state towards the record.
    ///
    /// Returns conditions for non-fatal sub-step failures; the engine appends
    /// them before the Ready condition.
    async fn apply(&self, record: &K, admin: &dyn AdminClient)
        -> Result<Vec<Condition>, StageFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_object_lock_failures_stop() {
        let stages = [
            Stage::BucketExistence,
            Stage::BucketCreate,
            Stage::ObjectLock,
            Stage::Versioning,
            Stage::PolicyCreate,
            Stage::UserCreate,
            Stage::CredentialPublish,
        ];
        let stopping: Vec<_> = stages
            .into_iter()
            .filter(|s| s.requeue() == Requeue::None)
            .collect();
        assert_eq!(stopping, vec![Stage::ObjectLock]);
    }

    #[test]
    fn test_reasons_are_stage_specific() {
        assert_eq!(Stage::BucketCreate.reason(), "bucket creation failure");
        assert_eq!(Stage::CredentialPublish.reason(), "secret creation failure");
        assert_eq!(Stage::Versioning.to_string(), "versioning failure");
    }

    #[test]
    fn test_failure_message_includes_context_chain() {
        let failure = StageFailure::new(
            Stage::UserCreate,
            anyhow::anyhow!("connection reset").context("Failed to add user 'alice'"),
        );
        assert_eq!(
            failure.message(),
            "Failed to add user 'alice': connection reset"
        );
    }
}
