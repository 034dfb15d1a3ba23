//! # Custom Resource Definitions
//!
//! CRD types for the MinIO Resource Controller.
//!
//! This module contains the Kubernetes Custom Resource Definition types
//! reconciled by the controller: `Bucket`, `Policy` and `User`.

mod status;

pub use status::{Condition, ConditionState, ResourceStatus};

use k8s_openapi::NamespaceResourceScope;
use kube::CustomResource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: pannoi.io/v1beta1
/// kind: Bucket
/// metadata:
///   name: invoices
///   namespace: default
/// spec:
///   name: invoices
///   objectLocking:
///     enabled: true
///     mode: compliance
///     retention: 30
///   versioning:
///     enabled: true
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Bucket",
    group = "pannoi.io",
    version = "v1beta1",
    namespaced,
    status = "ResourceStatus",
    shortname = "mbucket",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.name"}, {"name":"State", "type":"string", "jsonPath":".status.conditions[-1:].type"}, {"name":"Reason", "type":"string", "jsonPath":".status.conditions[-1:].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    /// Name of the bucket in MinIO
    pub name: String,
    /// Object locking can only be enabled when the bucket is created
    #[serde(default)]
    pub object_locking: ObjectLocking,
    #[serde(default)]
    pub versioning: VersioningSpec,
}

/// Object locking configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLocking {
    #[serde(default)]
    pub enabled: bool,
    /// Retention mode: "governance" or "compliance" (case-insensitive).
    /// Anything else is treated as governance.
    #[serde(default)]
    pub mode: String,
    /// Default retention period in days
    #[serde(default)]
    pub retention: u32,
}

impl ObjectLocking {
    pub fn retention_mode(&self) -> RetentionMode {
        RetentionMode::from_mode(&self.mode)
    }
}

/// Bucket versioning configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersioningSpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Object lock retention mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    Governance,
    Compliance,
}

impl RetentionMode {
    /// Case-insensitive match; unknown modes default to governance
    pub fn from_mode(mode: &str) -> Self {
        if mode.eq_ignore_ascii_case("compliance") {
            Self::Compliance
        } else {
            Self::Governance
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy Custom Resource Definition
///
/// The statement is passed to MinIO unmodified.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Policy",
    group = "pannoi.io",
    version = "v1beta1",
    namespaced,
    status = "ResourceStatus",
    shortname = "mpolicy",
    printcolumn = r#"{"name":"Policy", "type":"string", "jsonPath":".spec.name"}, {"name":"State", "type":"string", "jsonPath":".status.conditions[-1:].type"}, {"name":"Reason", "type":"string", "jsonPath":".status.conditions[-1:].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    /// Name of the canned policy in MinIO
    pub name: String,
    /// Policy document (IAM policy JSON)
    pub statement: String,
}

/// User Custom Resource Definition
///
/// The generated credentials are published to a Secret named `<name>-credentials`
/// in the User's namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: pannoi.io/v1beta1
/// kind: User
/// metadata:
///   name: reporting
/// spec:
///   name: reporting
///   policies:
///     - readonly
///     - audit
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "User",
    group = "pannoi.io",
    version = "v1beta1",
    namespaced,
    status = "ResourceStatus",
    shortname = "muser",
    printcolumn = r#"{"name":"User", "type":"string", "jsonPath":".spec.name"}, {"name":"State", "type":"string", "jsonPath":".status.conditions[-1:].type"}, {"name":"Reason", "type":"string", "jsonPath":".status.conditions[-1:].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    /// Access key of the MinIO user
    pub name: String,
    /// Policies attached to the user, in order
    #[serde(default)]
    pub policies: Vec<String>,
}

/// A namespaced resource whose status is a condition history
pub trait ManagedResource:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn resource_status(&self) -> Option<&ResourceStatus>;
}

impl ManagedResource for Bucket {
    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }
}

impl ManagedResource for Policy {
    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }
}

impl ManagedResource for User {
    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_bucket_defaults_disable_locking_and_versioning() {
        let spec: BucketSpec = serde_json::from_value(serde_json::json!({ "name": "logs" })).unwrap();
        assert_eq!(spec.name, "logs");
        assert!(!spec.object_locking.enabled);
        assert!(!spec.versioning.enabled);
    }

    #[test]
    fn test_retention_mode_mapping() {
        assert_eq!(RetentionMode::from_mode("GOVERNANCE"), RetentionMode::Governance);
        assert_eq!(RetentionMode::from_mode("Compliance"), RetentionMode::Compliance);
        assert_eq!(RetentionMode::from_mode("strict"), RetentionMode::Governance);
        assert_eq!(RetentionMode::from_mode(""), RetentionMode::Governance);
    }

    proptest::proptest! {
        #[test]
        fn test_retention_mode_ignores_case(flips in proptest::collection::vec(proptest::bool::ANY, 10)) {
            let mode: String = "compliance"
                .chars()
                .zip(&flips)
                .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                .collect();
            proptest::prop_assert_eq!(RetentionMode::from_mode(&mode), RetentionMode::Compliance);
        }

        #[test]
        fn test_unknown_retention_modes_default_to_governance(mode in "[a-z]{0,12}") {
            proptest::prop_assume!(!mode.eq_ignore_ascii_case("compliance"));
            proptest::prop_assert_eq!(RetentionMode::from_mode(&mode), RetentionMode::Governance);
        }
    }

    #[test]
    fn test_user_policies_keep_order() {
        let spec: UserSpec = serde_json::from_value(serde_json::json!({
            "name": "alice",
            "policies": ["readonly", "audit", "diagnostics"]
        }))
        .unwrap();
        assert_eq!(spec.policies, vec!["readonly", "audit", "diagnostics"]);
    }

    #[test]
    fn test_crds_share_group_and_version() {
        for crd in [Bucket::crd(), Policy::crd(), User::crd()] {
            assert_eq!(crd.spec.group, "pannoi.io");
            assert_eq!(crd.spec.versions[0].name, "v1beta1");
            assert!(crd.spec.versions[0].subresources.is_some());
        }
    }
}
