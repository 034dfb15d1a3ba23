//! In-memory collaborators for reconciler tests.

use crate::controller::reconciler::credentials::GeneratedCredential;
use crate::controller::reconciler::store::{
    status_patch, CredentialStore, RecordStore, StoreError, ACCESS_KEY_FIELD, SECRET_KEY_FIELD,
};
use crate::controller::reconciler::types::RecordId;
use crate::crd::{
    Bucket, BucketSpec, ManagedResource, ObjectLocking, Policy, PolicySpec, ResourceStatus,
    RetentionMode, User, UserSpec, VersioningSpec,
};
use crate::provider::{AdminClient, AdminConnector};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

pub fn bucket(name: &str, locking: bool, mode: &str, retention: u32, versioning: bool) -> Bucket {
    let mut record = Bucket::new(
        name,
        BucketSpec {
            name: name.to_string(),
            object_locking: ObjectLocking {
                enabled: locking,
                mode: mode.to_string(),
                retention,
            },
            versioning: VersioningSpec {
                enabled: versioning,
            },
        },
    );
    record.metadata.namespace = Some("default".to_string());
    record
}

pub fn policy(name: &str, statement: &str) -> Policy {
    let mut record = Policy::new(
        name,
        PolicySpec {
            name: name.to_string(),
            statement: statement.to_string(),
        },
    );
    record.metadata.namespace = Some("default".to_string());
    record
}

pub fn user(name: &str, policies: &[&str]) -> User {
    user_in("default", name, policies)
}

pub fn user_in(namespace: &str, name: &str, policies: &[&str]) -> User {
    let mut record = User::new(
        name,
        UserSpec {
            name: name.to_string(),
            policies: policies.iter().map(ToString::to_string).collect(),
        },
    );
    record.metadata.namespace = Some(namespace.to_string());
    record
}

/// Record store holding records in memory
#[derive(Clone)]
pub struct FakeRecordStore<K> {
    records: Arc<Mutex<HashMap<RecordId, K>>>,
    status_writes: Arc<AtomicUsize>,
    fail_gets: Arc<AtomicBool>,
    fail_status_writes: Arc<AtomicBool>,
}

impl<K> Default for FakeRecordStore<K> {
    fn default() -> Self {
        Self {
            records: Arc::default(),
            status_writes: Arc::default(),
            fail_gets: Arc::default(),
            fail_status_writes: Arc::default(),
        }
    }
}

impl<K: ManagedResource> FakeRecordStore<K> {
    pub fn with(record: K) -> Self {
        let store = Self::default();
        store.insert(record);
        store
    }

    pub fn insert(&self, record: K) {
        self.records
            .lock()
            .unwrap()
            .insert(RecordId::of(&record), record);
    }

    pub fn status(&self, id: &RecordId) -> Option<ResourceStatus> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .and_then(|r| r.resource_status().cloned())
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self) {
        self.fail_gets.store(true, Ordering::SeqCst);
    }

    pub fn fail_status_writes(&self) {
        self.fail_status_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<K: ManagedResource> RecordStore<K> for FakeRecordStore<K> {
    async fn get(&self, id: &RecordId) -> Result<K, StoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow!("api server unavailable")));
        }
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_status(&self, id: &RecordId, status: &ResourceStatus) -> Result<(), StoreError> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow!("status conflict")));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut stored = serde_json::to_value(&*record).unwrap();
        merge_patch(&mut stored, &status_patch(status));
        *record = serde_json::from_value(stored).unwrap();
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON merge patch (RFC 7386), as the API server applies `Patch::Merge`
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(existing) = target {
        for (key, value) in fields {
            if value.is_null() {
                existing.remove(key);
            } else {
                merge_patch(existing.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[derive(Default)]
struct AdminState {
    calls: Vec<String>,
    failures: Vec<String>,
    buckets: HashSet<String>,
    policies: HashMap<String, String>,
    users: HashMap<String, String>,
}

/// Admin client recording every call; calls matching an injected prefix fail
#[derive(Clone, Default)]
pub struct FakeAdmin {
    state: Arc<Mutex<AdminState>>,
}

impl FakeAdmin {
    pub fn fail_on(&self, prefix: &str) {
        self.state.lock().unwrap().failures.push(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn add_bucket(&self, name: &str) {
        self.state.lock().unwrap().buckets.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn policies(&self) -> HashMap<String, String> {
        self.state.lock().unwrap().policies.clone()
    }

    pub fn users(&self) -> HashMap<String, String> {
        self.state.lock().unwrap().users.clone()
    }

    /// Record `call`, failing if it matches an injected failure
    fn call(&self, call: String, effect: impl FnOnce(&mut AdminState)) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if state.failures.iter().any(|prefix| call.starts_with(prefix)) {
            return Err(anyhow!("injected failure: {call}"));
        }
        effect(&mut state);
        Ok(())
    }
}

#[async_trait]
impl AdminClient for FakeAdmin {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.call(format!("bucket_exists {bucket}"), |_| ())?;
        Ok(self.state.lock().unwrap().buckets.contains(bucket))
    }

    async fn make_bucket(&self, bucket: &str, object_locking: bool) -> Result<()> {
        self.call(
            format!("make_bucket {bucket} locking={object_locking}"),
            |state| {
                state.buckets.insert(bucket.to_string());
            },
        )
    }

    async fn set_object_lock_config(
        &self,
        bucket: &str,
        mode: RetentionMode,
        retention_days: u32,
    ) -> Result<()> {
        self.call(
            format!("set_object_lock_config {bucket} {mode} {retention_days}"),
            |_| (),
        )
    }

    async fn enable_versioning(&self, bucket: &str) -> Result<()> {
        self.call(format!("enable_versioning {bucket}"), |_| ())
    }

    async fn add_canned_policy(&self, name: &str, statement: &str) -> Result<()> {
        self.call(format!("add_canned_policy {name}"), |state| {
            state.policies.insert(name.to_string(), statement.to_string());
        })
    }

    async fn add_user(&self, access_key: &str, secret_key: &str) -> Result<()> {
        self.call(format!("add_user {access_key}"), |state| {
            state
                .users
                .insert(access_key.to_string(), secret_key.to_string());
        })
    }

    async fn attach_policy(&self, policy: &str, user: &str) -> Result<()> {
        self.call(format!("attach_policy {policy} {user}"), |_| ())
    }
}

/// Connector handing out a shared fake admin, or failing to connect
pub struct FakeConnector {
    admin: Option<FakeAdmin>,
    endpoint: String,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(admin: FakeAdmin) -> Self {
        Self {
            admin: Some(admin),
            endpoint: "localhost:9000".to_string(),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn unreachable(endpoint: &str) -> Self {
        Self {
            admin: None,
            endpoint: endpoint.to_string(),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminConnector for FakeConnector {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn connect(&self) -> Result<Arc<dyn AdminClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.admin {
            Some(admin) => Ok(Arc::new(admin.clone())),
            None => Err(anyhow!("connection refused")),
        }
    }
}

/// Credential store keeping secrets as string maps
#[derive(Clone, Default)]
pub struct FakeCredentialStore {
    secrets: Arc<Mutex<HashMap<(String, String), BTreeMap<String, String>>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl FakeCredentialStore {
    pub fn put(&self, namespace: &str, name: &str, access_key: &str, secret_key: &str) {
        self.secrets.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            BTreeMap::from([
                (ACCESS_KEY_FIELD.to_string(), access_key.to_string()),
                (SECRET_KEY_FIELD.to_string(), secret_key.to_string()),
            ]),
        );
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn write(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow!("secrets are forbidden")));
        }
        self.put(
            namespace,
            name,
            &credential.access_key,
            &credential.secret_key,
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn fetch(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Zeroizing<String>>, StoreError> {
        Ok(self
            .get(namespace, name)
            .and_then(|data| data.get(SECRET_KEY_FIELD).cloned())
            .map(Zeroizing::new))
    }

    async fn create(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError> {
        if self.get(namespace, name).is_some() {
            return Err(StoreError::AlreadyExists(format!("secret {namespace}/{name}")));
        }
        self.write(namespace, name, credential)
    }

    async fn upsert(
        &self,
        namespace: &str,
        name: &str,
        credential: &GeneratedCredential,
    ) -> Result<(), StoreError> {
        self.write(namespace, name, credential)
    }
}
