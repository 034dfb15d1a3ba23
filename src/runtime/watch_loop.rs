//! # Watch Loop
//!
//! One kube-runtime controller per managed kind, all sharing the reconciler
//! context. Each controller bounds its own concurrency and stops on SIGTERM
//! or Ctrl-C once in-flight reconciliations finish.

use crate::controller::reconciler::{reconcile, ReconcileKind, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{Bucket, Policy, User};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::controller::{self, Controller};
use kube_runtime::watcher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// Run the Bucket, Policy and User controllers until shutdown
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) {
    let concurrency = reconciler.config.max_concurrent_reconciles;
    info!(
        "Starting controllers for Bucket, Policy and User (concurrency {} per kind)",
        concurrency
    );

    tokio::join!(
        run_controller::<Bucket>(client.clone(), reconciler.clone(), concurrency),
        run_controller::<Policy>(client.clone(), reconciler.clone(), concurrency),
        run_controller::<User>(client, reconciler, concurrency),
    );

    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("All controllers stopped");
}

async fn run_controller<K: ReconcileKind>(client: Client, ctx: Arc<Reconciler>, concurrency: u16) {
    let kind = K::kind(&()).to_string();
    let api: Api<K> = Api::all(client);

    Controller::new(api, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile::<K>, handle_reconciliation_error::<K>, ctx)
        .for_each(|result| {
            let kind = kind.clone();
            async move {
                match result {
                    Ok((object, _action)) => {
                        debug!(resource.kind = %kind, "Reconciled {}", object);
                    }
                    // Logged and requeued by the error policy
                    Err(controller::Error::ReconcilerFailed(..)) => {}
                    Err(e) => {
                        handle_watch_stream_error(&kind, &e);
                    }
                }
            }
        })
        .await;

    info!(resource.kind = %kind, "Controller stopped");
}
