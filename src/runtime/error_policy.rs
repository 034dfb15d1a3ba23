//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{
    backoff_key, ReconcileKind, Reconciler, ReconcilerError, RecordId,
};
use crate::observability;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing record does not slow
/// down the others. The retry is also what the trigger gate waits for when the
/// failure's own status write is redelivered.
pub fn handle_reconciliation_error<K: ReconcileKind>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let kind = K::kind(&());
    let id = RecordId::of(obj.as_ref());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = %id.name,
        resource.namespace = %id.namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}: {}", kind, id, error);
    observability::metrics::increment_reconciliation_errors(&kind);

    let delay = ctx.schedule_retry(&backoff_key::<K>(&id));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Retrying {} in {}s at {} (trigger source: error-backoff)",
        id,
        delay.as_secs(),
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues_total(error.label());
    Action::requeue(delay)
}

/// Classification of an error surfaced by the controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// 401/403: the service account lost access
    Unauthorized,
    /// 410: resource version expired, the watcher relists
    Expired,
    /// 429: API server storage reinitializing
    Throttled,
    /// The object went away between event and reconcile
    NotFound,
    Other,
}

impl StreamErrorKind {
    /// Classify by the HTTP status the API server answered with
    pub fn from_status(code: Option<u16>) -> Self {
        match code {
            Some(401 | 403) => Self::Unauthorized,
            Some(410) => Self::Expired,
            Some(429) => Self::Throttled,
            Some(404) => Self::NotFound,
            _ => Self::Other,
        }
    }

    pub fn of<E>(error: &controller::Error<E, watcher::Error>) -> Self
    where
        E: std::error::Error + 'static,
    {
        match error {
            controller::Error::ObjectNotFound(_) => Self::NotFound,
            controller::Error::QueueError(watch_error) => {
                Self::from_status(watcher_status(watch_error))
            }
            _ => Self::Other,
        }
    }
}

fn watcher_status(error: &watcher::Error) -> Option<u16> {
    match error {
        watcher::Error::InitialListFailed(e)
        | watcher::Error::WatchStartFailed(e)
        | watcher::Error::WatchFailed(e) => match e {
            kube::Error::Api(response) => Some(response.code),
            _ => None,
        },
        watcher::Error::WatchError(response) => Some(response.code),
        _ => None,
    }
}

/// Log a controller stream error at the level its classification warrants
///
/// The watcher restarts itself with backoff; nothing here blocks the loop.
pub fn handle_watch_stream_error<E>(
    kind: &str,
    error: &controller::Error<E, watcher::Error>,
) -> StreamErrorKind
where
    E: std::error::Error + 'static,
{
    let class = StreamErrorKind::of(error);
    match class {
        StreamErrorKind::Unauthorized => {
            error!(
                resource.kind = kind,
                "Watch authentication failed, RBAC may have been revoked: {}", error
            );
            error!(
                "Verify the controller's ClusterRole grants list/watch on {} and patch on its status",
                kind
            );
        }
        StreamErrorKind::Expired => {
            warn!(resource.kind = kind, "Watch resource version expired, watch will restart");
        }
        StreamErrorKind::Throttled => {
            warn!(resource.kind = kind, "API server throttling or reinitializing storage: {}", error);
        }
        StreamErrorKind::NotFound => {
            warn!(resource.kind = kind, "Resource not found (likely deleted), continuing watch");
        }
        StreamErrorKind::Other => {
            error!(resource.kind = kind, "Controller stream error: {}", error);
        }
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::reconciler::fakes::{
        bucket, FakeAdmin, FakeConnector, FakeCredentialStore, FakeRecordStore,
    };
    use crate::controller::reconciler::RecordStores;
    use std::time::Duration;

    #[test]
    fn test_reconciliation_errors_back_off_per_resource() {
        let stores = RecordStores {
            buckets: Arc::new(FakeRecordStore::default()),
            policies: Arc::new(FakeRecordStore::default()),
            users: Arc::new(FakeRecordStore::default()),
        };
        let ctx = Arc::new(Reconciler::from_parts(
            ControllerConfig::default(),
            Arc::new(FakeConnector::new(FakeAdmin::default())),
            stores,
            Arc::new(FakeCredentialStore::default()),
        ));
        let failing = Arc::new(bucket("logs", false, "", 0, false));
        let error = ReconcilerError::Connect {
            endpoint: "minio.svc:9000".to_string(),
            source: anyhow::anyhow!("connection refused"),
        };

        let delays: Vec<Action> = (0..3)
            .map(|_| handle_reconciliation_error(failing.clone(), &error, ctx.clone()))
            .collect();
        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(10)),
            ]
        );

        let other = Arc::new(bucket("archive", false, "", 0, false));
        assert_eq!(
            handle_reconciliation_error(other, &error, ctx),
            Action::requeue(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_stream_errors_classified_by_status_code() {
        assert_eq!(StreamErrorKind::from_status(Some(401)), StreamErrorKind::Unauthorized);
        assert_eq!(StreamErrorKind::from_status(Some(403)), StreamErrorKind::Unauthorized);
        assert_eq!(StreamErrorKind::from_status(Some(410)), StreamErrorKind::Expired);
        assert_eq!(StreamErrorKind::from_status(Some(429)), StreamErrorKind::Throttled);
        assert_eq!(StreamErrorKind::from_status(Some(404)), StreamErrorKind::NotFound);
        assert_eq!(StreamErrorKind::from_status(Some(500)), StreamErrorKind::Other);
        assert_eq!(StreamErrorKind::from_status(None), StreamErrorKind::Other);
    }

    #[test]
    fn test_numbers_in_messages_do_not_classify() {
        let transport = kube::Error::Service(Box::new(std::io::Error::other(
            "watch of Bucket default/logs-4010 reset after 403 bytes",
        )));
        let error = controller::Error::<ReconcilerError, watcher::Error>::QueueError(
            watcher::Error::WatchFailed(transport),
        );
        assert_eq!(StreamErrorKind::of(&error), StreamErrorKind::Other);

        let error = controller::Error::<ReconcilerError, watcher::Error>::QueueError(
            watcher::Error::NoResourceVersion,
        );
        assert_eq!(StreamErrorKind::of(&error), StreamErrorKind::Other);
    }
}
