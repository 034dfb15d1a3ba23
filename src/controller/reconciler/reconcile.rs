//! # Reconcile Entry Point
//!
//! The function handed to the watch loop for every managed kind. It gates the
//! delivered object, runs the engine and turns its requeue decision into a
//! controller `Action` using the per-resource backoff.

use crate::controller::reconciler::context::{backoff_key, ReconcileKind, Reconciler};
use crate::controller::reconciler::engine::converge_pass;
use crate::controller::reconciler::trigger::{self, Trigger};
use crate::controller::reconciler::types::{Outcome, ReconcilerError, RecordId, Requeue};
use crate::crd::ConditionState;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Reconcile one delivered object of kind `K`
#[allow(
    clippy::missing_errors_doc,
    reason = "Errors are the engine's hard failures and go to the error policy"
)]
pub async fn reconcile<K: ReconcileKind>(
    obj: Arc<K>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let kind = K::kind(&());
    let id = RecordId::of(obj.as_ref());
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.kind = %kind,
        resource.name = %id.name,
        resource.namespace = %id.namespace
    );

    async move {
        let key = backoff_key::<K>(&id);
        match trigger::evaluate(obj.as_ref(), ctx.retry_schedule(&key)) {
            Trigger::Run => {}
            Trigger::Skip => {
                debug!("last pass covers the current spec, waiting for changes");
                return Ok(Action::await_change());
            }
            Trigger::Defer(remaining) => {
                debug!(remaining_secs = remaining.as_secs(), "retry already scheduled");
                return Ok(Action::requeue(remaining));
            }
        }

        metrics::increment_reconciliations(&kind);
        let start = Instant::now();
        let pass = converge_pass(
            &id,
            K::store(&ctx),
            K::strategy(&ctx),
            ctx.connector.as_ref(),
            &ctx.recorder,
        )
        .await;
        metrics::observe_reconciliation_duration(&kind, start.elapsed().as_secs_f64());

        let pass = pass?;
        match pass.requeue {
            Requeue::None => {
                // Only a final failure needs remembering; the gate skips Ready by status
                if pass.outcome == Outcome::Recorded(ConditionState::Failed) {
                    ctx.settle(&key);
                } else {
                    ctx.forget(&key);
                }
                Ok(Action::await_change())
            }
            Requeue::Immediate => {
                let delay = ctx.schedule_retry(&key);
                info!(delay_secs = delay.as_secs(), "requeueing after stage failure");
                metrics::increment_requeues_total("stage-failure");
                Ok(Action::requeue(delay))
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::constants::RECONCILE_ANNOTATION;
    use crate::controller::backoff::RetrySchedule;
    use crate::controller::reconciler::context::RecordStores;
    use crate::controller::reconciler::fakes::{
        bucket, policy, user, FakeAdmin, FakeConnector, FakeCredentialStore, FakeRecordStore,
    };
    use crate::controller::reconciler::store::RecordStore;
    use crate::crd::{Bucket, ManagedResource, Policy, User};
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct Harness {
        buckets: FakeRecordStore<Bucket>,
        policies: FakeRecordStore<Policy>,
        users: FakeRecordStore<User>,
        admin: FakeAdmin,
        ctx: Arc<Reconciler>,
    }

    fn harness(connector: FakeConnector, admin: FakeAdmin) -> Harness {
        let buckets = FakeRecordStore::<Bucket>::default();
        let policies = FakeRecordStore::<Policy>::default();
        let users = FakeRecordStore::<User>::default();
        let stores = RecordStores {
            buckets: Arc::new(buckets.clone()),
            policies: Arc::new(policies.clone()),
            users: Arc::new(users.clone()),
        };
        let ctx = Reconciler::from_parts(
            ControllerConfig::default(),
            Arc::new(connector),
            stores,
            Arc::new(FakeCredentialStore::default()),
        );
        Harness {
            buckets,
            policies,
            users,
            admin,
            ctx: Arc::new(ctx),
        }
    }

    fn healthy() -> Harness {
        let admin = FakeAdmin::default();
        harness(FakeConnector::new(admin.clone()), admin)
    }

    async fn stored<K: ManagedResource>(store: &FakeRecordStore<K>, id: &RecordId) -> Arc<K> {
        Arc::new(store.get(id).await.unwrap())
    }

    fn min_backoff() -> Duration {
        Duration::from_secs(ControllerConfig::default().requeue_min_backoff_secs)
    }

    #[tokio::test]
    async fn test_ready_record_waits_for_changes() {
        let h = healthy();
        let record = bucket("logs", false, "", 0, false);
        let id = RecordId::of(&record);
        h.buckets.insert(record);

        let action = reconcile(stored(&h.buckets, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.buckets.status_writes(), 1);

        // The status write is redelivered; it must not trigger another pass
        let action = reconcile(stored(&h.buckets, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.buckets.status_writes(), 1);
        assert_eq!(h.admin.calls().len(), 2);
        assert_eq!(
            h.ctx.retry_schedule(&backoff_key::<Bucket>(&id)),
            RetrySchedule::Idle
        );
    }

    #[tokio::test]
    async fn test_stage_failure_requeues_with_backoff() {
        let h = healthy();
        h.admin.fail_on("add_canned_policy");
        let record = policy("readonly", "{}");
        let id = RecordId::of(&record);
        h.policies.insert(record);

        let action = reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(min_backoff()));

        // Redelivery of the Failed status waits for the scheduled retry
        let action = reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_ne!(action, Action::await_change());
        assert_eq!(h.policies.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_final_failure_is_not_retried() {
        let h = healthy();
        h.admin.fail_on("set_object_lock_config");
        let record = bucket("vault", true, "compliance", 30, false);
        let id = RecordId::of(&record);
        h.buckets.insert(record);

        let action = reconcile(stored(&h.buckets, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());

        let action = reconcile(stored(&h.buckets, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.buckets.status_writes(), 1);
        assert_eq!(
            h.ctx.retry_schedule(&backoff_key::<Bucket>(&id)),
            RetrySchedule::Halted
        );
    }

    #[tokio::test]
    async fn test_deleted_record_drops_backoff_state() {
        let h = healthy();
        let record = bucket("logs", false, "", 0, false);
        let key = backoff_key::<Bucket>(&RecordId::of(&record));
        h.ctx.schedule_retry(&key);

        // Delivered after it was removed from the store
        let action = reconcile(Arc::new(record), h.ctx.clone()).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.ctx.retry_schedule(&key), RetrySchedule::Idle);
        assert!(h.admin.calls().is_empty());

        for name in ["a", "b", "c"] {
            let gone = bucket(name, false, "", 0, false);
            reconcile(Arc::new(gone.clone()), h.ctx.clone())
                .await
                .unwrap();
            assert_eq!(
                h.ctx.retry_schedule(&backoff_key::<Bucket>(&RecordId::of(&gone))),
                RetrySchedule::Idle
            );
        }
    }

    #[tokio::test]
    async fn test_removed_reconcile_annotation_settles_after_one_pass() {
        let h = healthy();
        let mut record = policy("readonly", "{}");
        record.metadata.annotations = Some(BTreeMap::from([(
            RECONCILE_ANNOTATION.to_string(),
            "2026-10-19T08:00:00Z".to_string(),
        )]));
        let id = RecordId::of(&record);
        h.policies.insert(record);
        reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(
            h.policies.status(&id).unwrap().reconcile_request.as_deref(),
            Some("2026-10-19T08:00:00Z")
        );

        let mut unannotated = h.policies.get(&id).await.unwrap();
        unannotated.metadata.annotations = None;
        h.policies.insert(unannotated);
        reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(h.policies.status_writes(), 2);
        assert_eq!(h.policies.status(&id).unwrap().reconcile_request, None);

        // The status write is redelivered and must not start another pass
        let action = reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.policies.status_writes(), 2);
    }

    #[tokio::test]
    async fn test_spec_change_reruns_settled_record() {
        let h = healthy();
        let record = policy("readonly", "{}");
        let id = RecordId::of(&record);
        h.policies.insert(record);
        reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();

        let mut changed = h.policies.get(&id).await.unwrap();
        changed.spec.statement = r#"{"Statement":[]}"#.to_string();
        changed.metadata.generation = Some(2);
        h.policies.insert(changed);

        reconcile(stored(&h.policies, &id).await, h.ctx.clone())
            .await
            .unwrap();
        assert_eq!(h.policies.status_writes(), 2);
        assert_eq!(
            h.admin.policies().get("readonly").map(String::as_str),
            Some(r#"{"Statement":[]}"#)
        );
    }

    #[tokio::test]
    async fn test_connect_failure_is_returned() {
        let h = harness(FakeConnector::unreachable("minio.svc:9000"), FakeAdmin::default());
        let record = user("alice", &[]);
        let id = RecordId::of(&record);
        h.users.insert(record);

        let err = reconcile(stored(&h.users, &id).await, h.ctx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcilerError::Connect { .. }));
        assert_eq!(err.label(), "connect");
        assert_eq!(h.users.status_writes(), 1);
        assert_eq!(
            h.ctx.retry_schedule(&backoff_key::<User>(&id)),
            crate::controller::backoff::RetrySchedule::Idle
        );
    }
}
