//! User convergence: obtain a credential, create the user, publish the
//! credential, then attach each requested policy.

use super::{ConvergenceStrategy, Stage, StageFailure, POLICY_ATTACHMENT_FAILURE};
use crate::config::CredentialPublishPolicy;
use crate::constants::GENERATED_SECRET_LENGTH;
use crate::controller::reconciler::credentials::{
    credentials_secret_name, generate, GeneratedCredential,
};
use crate::controller::reconciler::store::CredentialStore;
use crate::crd::{Condition, User};
use crate::provider::AdminClient;
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the credential of this pass reaches the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Publish {
    /// Already published; reused as-is
    Skip,
    Create,
    Replace,
}

pub struct UserStrategy {
    credentials: Arc<dyn CredentialStore>,
    publish_policy: CredentialPublishPolicy,
}

impl std::fmt::Debug for UserStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStrategy")
            .field("publish_policy", &self.publish_policy)
            .finish_non_exhaustive()
    }
}

impl UserStrategy {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        publish_policy: CredentialPublishPolicy,
    ) -> Self {
        Self {
            credentials,
            publish_policy,
        }
    }

    async fn credential_for(
        &self,
        namespace: &str,
        user: &str,
        secret_name: &str,
    ) -> Result<(GeneratedCredential, Publish), StageFailure> {
        match self.publish_policy {
            CredentialPublishPolicy::Upsert => Ok((
                GeneratedCredential::new(user, generate(GENERATED_SECRET_LENGTH)),
                Publish::Replace,
            )),
            CredentialPublishPolicy::SkipIfExists => {
                let published = self
                    .credentials
                    .fetch(namespace, secret_name)
                    .await
                    .map_err(|e| StageFailure::new(Stage::CredentialPublish, e))?;
                Ok(match published {
                    Some(secret_key) => (GeneratedCredential::new(user, secret_key), Publish::Skip),
                    None => (
                        GeneratedCredential::new(user, generate(GENERATED_SECRET_LENGTH)),
                        Publish::Create,
                    ),
                })
            }
        }
    }
}

#[async_trait]
impl ConvergenceStrategy<User> for UserStrategy {
    async fn apply(
        &self,
        record: &User,
        admin: &dyn AdminClient,
    ) -> Result<Vec<Condition>, StageFailure> {
        let namespace = record.namespace().unwrap_or_else(|| "default".to_string());
        let user = record.spec.name.as_str();
        let secret_name = credentials_secret_name(user);

        let (credential, publish) = self.credential_for(&namespace, user, &secret_name).await?;

        admin
            .add_user(&credential.access_key, &credential.secret_key)
            .await
            .map_err(|e| StageFailure::new(Stage::UserCreate, e))?;
        info!(user, "user created");

        match publish {
            Publish::Skip => {
                debug!(user, secret = %secret_name, "credentials already published");
            }
            Publish::Create => {
                self.credentials
                    .create(&namespace, &secret_name, &credential)
                    .await
                    .map_err(|e| StageFailure::new(Stage::CredentialPublish, e))?;
                info!(user, secret = %secret_name, "credentials published");
            }
            Publish::Replace => {
                self.credentials
                    .upsert(&namespace, &secret_name, &credential)
                    .await
                    .map_err(|e| StageFailure::new(Stage::CredentialPublish, e))?;
                info!(user, secret = %secret_name, "credentials replaced");
            }
        }

        let mut conditions = Vec::new();
        for policy in &record.spec.policies {
            match admin.attach_policy(policy, user).await {
                Ok(()) => info!(user, policy = %policy, "policy attached"),
                Err(e) => {
                    warn!(user, policy = %policy, error = %format!("{e:#}"), "policy attachment failed");
                    conditions.push(Condition::failed(
                        POLICY_ATTACHMENT_FAILURE,
                        format!("policy '{policy}': {e:#}"),
                    ));
                }
            }
        }

        Ok(conditions)
    }
}
