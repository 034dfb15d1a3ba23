//! # Reconciler Context
//!
//! Shared state handed to every reconciliation: configuration, the MinIO
//! connector, record stores, strategies and per-resource backoff tracking.

use crate::config::ControllerConfig;
use crate::constants;
use crate::controller::backoff::{BackoffState, RetrySchedule};
use crate::controller::reconciler::status::StatusRecorder;
use crate::controller::reconciler::store::{
    CredentialStore, KubeCredentialStore, KubeRecordStore, RecordStore,
};
use crate::controller::reconciler::strategy::{
    BucketStrategy, ConvergenceStrategy, PolicyStrategy, UserStrategy,
};
use crate::controller::reconciler::types::RecordId;
use crate::crd::{Bucket, ManagedResource, Policy, User};
use crate::provider::{AdminConnector, MinioConnector};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Status stores for the three managed kinds
#[derive(Clone)]
pub struct RecordStores {
    pub buckets: Arc<dyn RecordStore<Bucket>>,
    pub policies: Arc<dyn RecordStore<Policy>>,
    pub users: Arc<dyn RecordStore<User>>,
}

impl std::fmt::Debug for RecordStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStores").finish_non_exhaustive()
    }
}

pub struct Reconciler {
    pub config: ControllerConfig,
    pub(crate) connector: Arc<dyn AdminConnector>,
    pub(crate) recorder: StatusRecorder,
    stores: RecordStores,
    buckets: BucketStrategy,
    policies: PolicyStrategy,
    users: UserStrategy,
    // Keyed by `kind/namespace/name`
    backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("endpoint", &self.connector.endpoint())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Context backed by the cluster API and the configured MinIO endpoint
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let stores = RecordStores {
            buckets: Arc::new(KubeRecordStore::new(client.clone())),
            policies: Arc::new(KubeRecordStore::new(client.clone())),
            users: Arc::new(KubeRecordStore::new(client.clone())),
        };
        let connector = Arc::new(MinioConnector::new(config.minio.clone()));
        let credentials = Arc::new(KubeCredentialStore::new(client));
        Self::from_parts(config, connector, stores, credentials)
    }

    pub fn from_parts(
        config: ControllerConfig,
        connector: Arc<dyn AdminConnector>,
        stores: RecordStores,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let recorder = StatusRecorder::new(config.history_limit());
        let users = UserStrategy::new(credentials, config.credential_publish_policy);
        Self {
            config,
            connector,
            recorder,
            stores,
            buckets: BucketStrategy,
            policies: PolicyStrategy,
            users,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    fn new_backoff(&self) -> BackoffState {
        BackoffState::new(
            self.config.requeue_min_backoff_secs,
            self.config.requeue_max_backoff_secs,
        )
    }

    /// Count a failure for `key` and return the delay before its retry
    pub fn schedule_retry(&self, key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| self.new_backoff())
                .schedule_retry(),
            Err(e) => {
                warn!(resource = key, error = %e, "Failed to lock backoff states, using default backoff");
                Duration::from_secs(constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS)
            }
        }
    }

    /// Drop the backoff state of `key`
    ///
    /// Used once a record is Ready or gone; the gate then decides from status alone.
    pub fn forget(&self, key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(key);
            }
            Err(e) => warn!(resource = key, error = %e, "Failed to lock backoff states"),
        }
    }

    /// Mark the last failure of `key` as final
    pub fn settle(&self, key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| self.new_backoff())
                .halt(),
            Err(e) => warn!(resource = key, error = %e, "Failed to lock backoff states"),
        }
    }

    pub fn retry_schedule(&self, key: &str) -> RetrySchedule {
        self.backoff_states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(BackoffState::schedule))
            .unwrap_or(RetrySchedule::Idle)
    }
}

/// Backoff key of a record
pub fn backoff_key<K: ManagedResource>(id: &RecordId) -> String {
    format!("{}/{}", K::kind(&()), id)
}

/// Binds a managed kind to its record store and strategy
pub trait ReconcileKind: ManagedResource {
    fn store(ctx: &Reconciler) -> &dyn RecordStore<Self>;

    fn strategy(ctx: &Reconciler) -> &dyn ConvergenceStrategy<Self>;
}

impl ReconcileKind for Bucket {
    fn store(ctx: &Reconciler) -> &dyn RecordStore<Self> {
        ctx.stores.buckets.as_ref()
    }

    fn strategy(ctx: &Reconciler) -> &dyn ConvergenceStrategy<Self> {
        &ctx.buckets
    }
}

impl ReconcileKind for Policy {
    fn store(ctx: &Reconciler) -> &dyn RecordStore<Self> {
        ctx.stores.policies.as_ref()
    }

    fn strategy(ctx: &Reconciler) -> &dyn ConvergenceStrategy<Self> {
        &ctx.policies
    }
}

impl ReconcileKind for User {
    fn store(ctx: &Reconciler) -> &dyn RecordStore<Self> {
        ctx.stores.users.as_ref()
    }

    fn strategy(ctx: &Reconciler) -> &dyn ConvergenceStrategy<Self> {
        &ctx.users
    }
}
