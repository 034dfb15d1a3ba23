//! # CRD Generator
//!
//! Prints the Bucket, Policy and User CustomResourceDefinitions as a
//! multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use minio_resource_controller::crd::{Bucket, Policy, User};

fn main() -> Result<()> {
    let crds = [Bucket::crd(), Policy::crd(), User::crd()];
    for crd in &crds {
        let yaml = serde_yaml::to_string(crd).context("Failed to serialize CRD")?;
        println!("---");
        print!("{yaml}");
    }
    Ok(())
}
