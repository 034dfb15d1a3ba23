//! # Admin REST API
//!
//! Canned policies, users and policy attachment are not part of the S3 API.
//! They go through MinIO's admin REST endpoints (`/minio/admin/v3/...`),
//! signed with SigV4 like any S3 request.

use super::crypto::encrypt_data;
use super::s3::CREDENTIALS_PROVIDER;
use crate::config::MinioConfig;
use anyhow::{anyhow, Context, Result};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use reqwest::Method;
use serde::Serialize;
use std::time::SystemTime;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

const ADMIN_PREFIX: &str = "/minio/admin/v3";

/// Body of an add-user request, encrypted before it leaves the process
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddUserRequest<'a> {
    secret_key: &'a str,
    status: &'a str,
}

pub(super) struct AdminApi {
    http: reqwest::Client,
    base_url: Url,
    access_key: String,
    secret_key: Zeroizing<String>,
    region: String,
}

impl AdminApi {
    pub(super) fn new(base_url: Url, config: &MinioConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build MinIO admin HTTP client")?;

        Ok(Self {
            http,
            base_url,
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
        })
    }

    /// Create or replace a canned policy; the document is sent verbatim
    pub(super) async fn add_canned_policy(&self, name: &str, statement: &str) -> Result<()> {
        let url = self.endpoint("add-canned-policy", &[("name", name)])?;
        self.put(url, statement.as_bytes().to_vec())
            .await
            .context(format!("Failed to add canned policy '{name}'"))
    }

    /// Create or update a user; the secret key is encrypted with the admin secret key
    pub(super) async fn add_user(&self, access_key: &str, secret_key: &str) -> Result<()> {
        let url = self.endpoint("add-user", &[("accessKey", access_key)])?;
        let payload = Zeroizing::new(
            serde_json::to_vec(&AddUserRequest {
                secret_key,
                status: "enabled",
            })
            .context("Failed to serialize add-user request")?,
        );
        let body = encrypt_data(&self.secret_key, &payload)?;
        self.put(url, body)
            .await
            .context(format!("Failed to add user '{access_key}'"))
    }

    pub(super) async fn attach_policy(&self, policy: &str, user: &str) -> Result<()> {
        let url = self.endpoint(
            "set-user-or-group-policy",
            &[
                ("policyName", policy),
                ("userOrGroup", user),
                ("isGroup", "false"),
            ],
        )?;
        self.put(url, Vec::new())
            .await
            .context(format!("Failed to attach policy '{policy}' to user '{user}'"))
    }

    fn endpoint(&self, operation: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("{ADMIN_PREFIX}/{operation}"))
            .context(format!("Invalid admin endpoint for '{operation}'"))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn put(&self, url: Url, body: Vec<u8>) -> Result<()> {
        let method = Method::PUT;
        let signed_headers = self.sign(method.as_str(), url.as_str(), &body)?;

        debug!(path = url.path(), "calling MinIO admin API");
        let mut request = self.http.request(method, url).body(body);
        for (name, value) in signed_headers {
            request = request.header(name, value);
        }

        let response = request.send().await.context("Admin request failed")?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(anyhow!("MinIO admin API returned {status}: {detail}"))
    }

    /// SigV4 headers for a request; MinIO requires the payload hash header
    fn sign(&self, method: &str, url: &str, body: &[u8]) -> Result<Vec<(String, String)>> {
        let identity = Credentials::new(
            self.access_key.clone(),
            self.secret_key.as_str(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        )
        .into();

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name("s3")
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .context("Failed to build signing parameters")?
            .into();

        let signable = SignableRequest::new(
            method,
            url,
            std::iter::empty::<(&str, &str)>(),
            SignableBody::Bytes(body),
        )
        .context("Failed to prepare admin request for signing")?;

        let (instructions, _signature) = sign(signable, &params)
            .context("Failed to sign admin request")?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn admin_for(server: &MockServer) -> AdminApi {
        let config = MinioConfig {
            endpoint: server.uri(),
            access_key: "minioadmin".to_string(),
            secret_key: Zeroizing::new("minioadmin-secret".to_string()),
            request_timeout: Duration::from_secs(5),
            ..MinioConfig::default()
        };
        AdminApi::new(Url::parse(&server.uri()).unwrap(), &config).unwrap()
    }

    #[tokio::test]
    async fn test_add_canned_policy_sends_statement_verbatim() {
        let server = MockServer::start().await;
        let statement = r#"{"Version":"2012-10-17","Statement":[]}"#;
        Mock::given(method("PUT"))
            .and(path("/minio/admin/v3/add-canned-policy"))
            .and(query_param("name", "readonly"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-content-sha256"))
            .and(wiremock::matchers::body_string(statement))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        admin_for(&server)
            .add_canned_policy("readonly", statement)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_user_body_is_encrypted() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/minio/admin/v3/add-user"))
            .and(query_param("accessKey", "alice"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        admin_for(&server)
            .add_user("alice", "plaintext-secret-key")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = &requests[0].body;
        assert!(!String::from_utf8_lossy(body).contains("plaintext-secret-key"));
        // salt + algorithm id + nonce precede the sealed fragments
        assert_eq!(body[32], 0x02);
    }

    #[tokio::test]
    async fn test_attach_policy_targets_user() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/minio/admin/v3/set-user-or-group-policy"))
            .and(query_param("policyName", "audit"))
            .and(query_param("userOrGroup", "alice"))
            .and(query_param("isGroup", "false"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        admin_for(&server).attach_policy("audit", "alice").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/minio/admin/v3/add-canned-policy"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("XMinioMalformedJSON"),
            )
            .mount(&server)
            .await;

        let err = admin_for(&server)
            .add_canned_policy("broken", "{not json")
            .await
            .unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("broken"));
        assert!(rendered.contains("XMinioMalformedJSON"));
    }
}
