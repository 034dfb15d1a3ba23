//! # Reconciler Types
//!
//! Record identity, the requeue directive returned to the watch loop and the
//! hard errors that escape a reconciliation.

use crate::controller::reconciler::store::StoreError;
use crate::crd::ConditionState;
use kube::ResourceExt;
use std::fmt;
use thiserror::Error;

/// Namespaced identity of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub namespace: String,
    pub name: String,
}

impl RecordId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a cluster object; objects without a namespace map to `default`
    pub fn of<K: kube::Resource>(obj: &K) -> Self {
        Self::new(
            obj.namespace().unwrap_or_else(|| "default".to_string()),
            obj.name_any(),
        )
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What the caller should do once a reconciliation returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change to the record
    None,
    /// Redeliver the record; the caller owns the delay
    Immediate,
}

/// How a pass left the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The record no longer exists
    Gone,
    /// Desired state was already present; nothing was recorded
    Unchanged,
    /// A condition in this state was recorded last
    Recorded(ConditionState),
}

/// Result of one engine pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub requeue: Requeue,
    pub outcome: Outcome,
}

impl Pass {
    pub(crate) fn new(requeue: Requeue, outcome: Outcome) -> Self {
        Self { requeue, outcome }
    }
}

/// Errors surfaced to the watch loop
///
/// Remote failures never appear here; they become conditions on the record.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Failed to load record {id}: {source}")]
    RecordUnavailable {
        id: RecordId,
        #[source]
        source: StoreError,
    },
    #[error("Failed to connect to MinIO at {endpoint}: {source:#}")]
    Connect {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to persist status of {id}: {source}")]
    StatusWrite {
        id: RecordId,
        #[source]
        source: StoreError,
    },
}

impl ReconcilerError {
    /// Short label used for metrics and requeue reasons
    pub fn label(&self) -> &'static str {
        match self {
            Self::RecordUnavailable { .. } => "record-unavailable",
            Self::Connect { .. } => "connect",
            Self::StatusWrite { .. } => "status-write",
        }
    }
}
