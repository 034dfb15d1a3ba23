//! # Reconciler
//!
//! Converges `Bucket`, `Policy` and `User` records against MinIO.
//!
//! - `reconcile`: entry point for the watch loop (gate, engine, requeue)
//! - `engine`: kind-independent convergence and failure handling
//! - `strategy`: per-kind remote operations
//! - `status`: condition history persistence
//! - `store`: record and credential storage in the cluster

mod context;
mod credentials;
mod engine;
mod reconcile;
mod status;
mod store;
pub mod strategy;
mod trigger;
mod types;

#[cfg(test)]
pub(crate) mod fakes;

pub use context::{backoff_key, ReconcileKind, Reconciler, RecordStores};
pub use credentials::{credentials_secret_name, generate, GeneratedCredential};
pub use engine::{converge, converge_pass, CONNECT_FAILURE};
pub use reconcile::reconcile;
pub use status::StatusRecorder;
pub use store::{
    credentials_secret, CredentialStore, KubeCredentialStore, KubeRecordStore, RecordStore,
    StoreError, ACCESS_KEY_FIELD, SECRET_KEY_FIELD,
};
pub use trigger::{evaluate, Trigger};
pub use types::{Outcome, Pass, ReconcilerError, RecordId, Requeue};
