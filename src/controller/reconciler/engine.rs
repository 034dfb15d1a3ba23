//! # Reconciliation Engine
//!
//! Kind-independent convergence:
//!
//! 1. Load the record; a missing record is a silent no-op
//! 2. Open a MinIO session; failure is recorded and returned
//! 3. Probe; an already satisfied record returns quietly
//! 4. Apply; failures become a Failed condition plus the stage's requeue
//!    decision, success appends any non-fatal conditions and then Ready
//!
//! The engine keeps no backoff state. `Requeue::Immediate` asks the caller to
//! redeliver the record; how soon is the caller's decision.

use crate::controller::reconciler::status::StatusRecorder;
use crate::controller::reconciler::store::{RecordStore, StoreError};
use crate::controller::reconciler::strategy::{ConvergenceStrategy, StageFailure};
use crate::controller::reconciler::types::{Outcome, Pass, ReconcilerError, RecordId, Requeue};
use crate::crd::{Condition, ConditionState, ManagedResource, ResourceStatus};
use crate::provider::AdminConnector;
use tracing::{debug, error, info, warn};

/// Reason recorded when no MinIO session could be opened
pub const CONNECT_FAILURE: &str = "connect failure";

/// Converge one record towards its desired state
pub async fn converge<K, St, S>(
    id: &RecordId,
    store: &St,
    strategy: &S,
    connector: &dyn AdminConnector,
    recorder: &StatusRecorder,
) -> Result<Requeue, ReconcilerError>
where
    K: ManagedResource,
    St: RecordStore<K> + ?Sized,
    S: ConvergenceStrategy<K> + ?Sized,
{
    converge_pass(id, store, strategy, connector, recorder)
        .await
        .map(|pass| pass.requeue)
}

/// [`converge`], also reporting how the pass left the record
pub async fn converge_pass<K, St, S>(
    id: &RecordId,
    store: &St,
    strategy: &S,
    connector: &dyn AdminConnector,
    recorder: &StatusRecorder,
) -> Result<Pass, ReconcilerError>
where
    K: ManagedResource,
    St: RecordStore<K> + ?Sized,
    S: ConvergenceStrategy<K> + ?Sized,
{
    let record = match store.get(id).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => {
            debug!(record = %id, "record not found, assuming it was deleted");
            return Ok(Pass::new(Requeue::None, Outcome::Gone));
        }
        Err(source) => {
            error!(record = %id, error = %source, "failed to load record");
            return Err(ReconcilerError::RecordUnavailable {
                id: id.clone(),
                source,
            });
        }
    };
    let mut status = record.resource_status().cloned().unwrap_or_default();

    let admin = match connector.connect().await {
        Ok(admin) => admin,
        Err(source) => {
            let endpoint = connector.endpoint();
            error!(record = %id, endpoint = %endpoint, error = %format!("{source:#}"), "failed to connect to MinIO");
            recorder
                .append(
                    store,
                    id,
                    &record,
                    &mut status,
                    Condition::failed(CONNECT_FAILURE, format!("{endpoint}: {source:#}")),
                )
                .await?;
            return Err(ReconcilerError::Connect { endpoint, source });
        }
    };

    match strategy.probe(&record, admin.as_ref()).await {
        Ok(true) => {
            info!(record = %id, "desired state already present");
            return Ok(Pass::new(Requeue::None, Outcome::Unchanged));
        }
        Ok(false) => {}
        Err(failure) => {
            return record_failure(store, id, &record, &mut status, recorder, failure).await;
        }
    }

    match strategy.apply(&record, admin.as_ref()).await {
        Ok(mut conditions) => {
            for condition in &conditions {
                warn!(
                    record = %id,
                    reason = condition.reason.as_deref().unwrap_or_default(),
                    message = condition.message.as_deref().unwrap_or_default(),
                    "non-fatal failure during apply"
                );
            }
            conditions.push(Condition::ready());
            recorder
                .append_all(store, id, &record, &mut status, conditions)
                .await?;
            info!(record = %id, "record is ready");
            Ok(Pass::new(Requeue::None, Outcome::Recorded(ConditionState::Ready)))
        }
        Err(failure) => record_failure(store, id, &record, &mut status, recorder, failure).await,
    }
}

async fn record_failure<K, St>(
    store: &St,
    id: &RecordId,
    record: &K,
    status: &mut ResourceStatus,
    recorder: &StatusRecorder,
    failure: StageFailure,
) -> Result<Pass, ReconcilerError>
where
    K: ManagedResource,
    St: RecordStore<K> + ?Sized,
{
    let requeue = failure.stage.requeue();
    let message = failure.message();
    error!(
        record = %id,
        stage = %failure.stage,
        requeue = ?requeue,
        error = %message,
        "reconciliation stage failed"
    );
    recorder
        .append(
            store,
            id,
            record,
            status,
            Condition::failed(failure.stage.reason(), message),
        )
        .await?;
    Ok(Pass::new(requeue, Outcome::Recorded(ConditionState::Failed)))
}
