//! # Record and Credential Stores
//!
//! The reconciler reads desired state and writes status through
//! [`RecordStore`], and publishes user credentials through
//! [`CredentialStore`]. The Kubernetes implementations live here; tests use
//! in-memory fakes.

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::credentials::GeneratedCredential;
use crate::controller::reconciler::types::RecordId;
use crate::crd::{ManagedResource, ResourceStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use thiserror::Error;
use zeroize::Zeroizing;

pub const ACCESS_KEY_FIELD: &str = "accessKey";
pub const SECRET_KEY_FIELD: &str = "secretKey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0:#}")]
    Backend(anyhow::Error),
}

impl StoreError {
    fn from_kube(target: String, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => Self::NotFound(target),
            kube::Error::Api(ref response) if response.code == 409 => Self::AlreadyExists(target),
            other => Self::Backend(anyhow::Error::new(other).context(target)),
        }
    }
}

/// Declarative record store for one resource kind
#[async_trait]
pub trait RecordStore<K>: Send + Sync {
    async fn get(&self, id: &RecordId) -> Result<K, StoreError>;

    /// Replace the record's status subresource
    async fn update_status(&self, id: &RecordId, status: &ResourceStatus) -> Result<(), StoreError>;
}

/// Destination of generated user credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Secret key of already published credentials, `None` if nothing is published
    async fn fetch(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Zeroizing<String>>, StoreError>;

    /// Publish credentials; fails with `AlreadyExists` if the target exists
    async fn create(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError>;

    /// Publish credentials, replacing any existing target
    async fn upsert(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError>;
}

/// Merge patch body replacing a record's status
///
/// Unset fields are sent as `null`; a missing key would leave the server's
/// previous value in place.
pub(crate) fn status_patch(status: &ResourceStatus) -> serde_json::Value {
    serde_json::json!({ "status": status })
}

/// Record store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeRecordStore {
    client: Client,
}

impl std::fmt::Debug for KubeRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRecordStore").finish_non_exhaustive()
    }
}

impl KubeRecordStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<K: ManagedResource> RecordStore<K> for KubeRecordStore {
    async fn get(&self, id: &RecordId) -> Result<K, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &id.namespace);
        api.get(&id.name)
            .await
            .map_err(|e| StoreError::from_kube(id.to_string(), e))
    }

    async fn update_status(&self, id: &RecordId, status: &ResourceStatus) -> Result<(), StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &id.namespace);
        let patch = status_patch(status);
        api.patch_status(
            &id.name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(patch),
        )
        .await
        .map_err(|e| StoreError::from_kube(id.to_string(), e))?;
        Ok(())
    }
}

/// Credential store writing Kubernetes `Secret`s
#[derive(Clone)]
pub struct KubeCredentialStore {
    client: Client,
}

impl std::fmt::Debug for KubeCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCredentialStore").finish_non_exhaustive()
    }
}

impl KubeCredentialStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Opaque Secret holding `accessKey` and `secretKey`
pub fn credentials_secret(namespace: &str, name: &str, credential: &GeneratedCredential) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                FIELD_MANAGER.to_string(),
            )])),
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([
            (ACCESS_KEY_FIELD.to_string(), credential.access_key.clone()),
            (
                SECRET_KEY_FIELD.to_string(),
                credential.secret_key.as_str().to_string(),
            ),
        ])),
        ..Secret::default()
    }
}

#[async_trait]
impl CredentialStore for KubeCredentialStore {
    async fn fetch(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Zeroizing<String>>, StoreError> {
        let target = format!("secret {namespace}/{name}");
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = match secrets.get(name).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(response)) if response.code == 404 => return Ok(None),
            Err(e) => return Err(StoreError::from_kube(target, e)),
        };

        let value = secret
            .data
            .as_ref()
            .and_then(|data| data.get(SECRET_KEY_FIELD))
            .ok_or_else(|| {
                StoreError::Backend(anyhow::anyhow!("{target} has no '{SECRET_KEY_FIELD}' entry"))
            })?;
        let secret_key = String::from_utf8(value.0.clone()).map_err(|e| {
            StoreError::Backend(anyhow::anyhow!("{target} holds a non-UTF-8 secret key: {e}"))
        })?;
        Ok(Some(Zeroizing::new(secret_key)))
    }

    async fn create(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        secrets
            .create(
                &PostParams::default(),
                &credentials_secret(namespace, name, credential),
            )
            .await
            .map_err(|e| StoreError::from_kube(format!("secret {namespace}/{name}"), e))?;
        Ok(())
    }

    async fn upsert(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        secrets
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(credentials_secret(namespace, name, credential)),
            )
            .await
            .map_err(|e| StoreError::from_kube(format!("secret {namespace}/{name}"), e))?;
        Ok(())
    }
}
