//! # MinIO Resource Controller
//!
//! A Kubernetes controller that manages MinIO buckets, canned policies and users
//! declared as `Bucket`, `Policy` and `User` resources.
//!
//! ## Overview
//!
//! 1. **Buckets** - Created once with the requested object-locking flag, then
//!    default retention and versioning are applied
//! 2. **Policies** - The policy statement is upserted as a MinIO canned policy
//! 3. **Users** - A secret key is generated, the user is created, the
//!    credentials are published to a `<name>-credentials` Secret and the listed
//!    policies are attached
//!
//! Every pass appends a condition to the resource's status history; the last
//! condition is authoritative.
//!
//! ## Features
//!
//! - **Multi-namespace**: Watches all three kinds across every namespace
//! - **Per-resource backoff**: Failed resources retry on a Fibonacci schedule
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

use anyhow::Result;
use minio_resource_controller::config::load_config;
use minio_resource_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let (controller_config, server_config) = load_config();

    let init_result = initialize(controller_config, server_config).await?;

    run_watch_loop(
        init_result.client,
        init_result.reconciler,
        init_result.server_state,
    )
    .await;

    Ok(())
}
