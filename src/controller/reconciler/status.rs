//! # Status History
//!
//! Appends conditions to a record's status and persists them through the
//! record store. A failed write is always returned to the engine.

use crate::constants::RECONCILE_ANNOTATION;
use crate::controller::reconciler::store::RecordStore;
use crate::controller::reconciler::types::{ReconcilerError, RecordId};
use crate::crd::{Condition, ManagedResource, ResourceStatus};
use crate::observability;
use kube::ResourceExt;
use tracing::debug;

/// Appends and persists status conditions
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusRecorder {
    history_limit: Option<usize>,
}

impl StatusRecorder {
    /// `history_limit` caps the stored conditions; `None` keeps all of them
    pub fn new(history_limit: Option<usize>) -> Self {
        Self { history_limit }
    }

    /// Append one condition and persist the status
    pub async fn append<K, St>(
        &self,
        store: &St,
        id: &RecordId,
        record: &K,
        status: &mut ResourceStatus,
        condition: Condition,
    ) -> Result<(), ReconcilerError>
    where
        K: ManagedResource,
        St: RecordStore<K> + ?Sized,
    {
        self.append_all(store, id, record, status, vec![condition])
            .await
    }

    /// Append conditions in order and persist them with a single write
    pub async fn append_all<K, St>(
        &self,
        store: &St,
        id: &RecordId,
        record: &K,
        status: &mut ResourceStatus,
        conditions: Vec<Condition>,
    ) -> Result<(), ReconcilerError>
    where
        K: ManagedResource,
        St: RecordStore<K> + ?Sized,
    {
        let kind = K::kind(&());
        let labels: Vec<String> = conditions.iter().map(|c| c.r#type.clone()).collect();

        status.observed_generation = record.meta().generation;
        status.reconcile_request = record.annotations().get(RECONCILE_ANNOTATION).cloned();
        for condition in conditions {
            status.push_condition(condition, self.history_limit);
        }

        store
            .update_status(id, status)
            .await
            .map_err(|source| ReconcilerError::StatusWrite {
                id: id.clone(),
                source,
            })?;

        for label in &labels {
            observability::metrics::increment_conditions_recorded(&kind, label);
        }
        debug!(
            record = %id,
            conditions = ?labels,
            history = status.conditions.len(),
            "status persisted"
        );
        Ok(())
    }
}
