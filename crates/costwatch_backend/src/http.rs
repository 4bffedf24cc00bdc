//! HTTP implementations of the collaborator traits.
//!
//! Plain JSON-over-HTTP clients with bounded request timeouts. Endpoint
//! shapes:
//! - `GET  {base}/api/spaces`
//! - `GET  {base}/api/spaces/{id}/units`
//! - `POST {base}/api/spaces/{id}/records`
//! - `GET  {base}/api/spaces/{space}/units/{unit}/usage` (usage source)

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use costwatch_model::{CostRecordPayload, ResourceUsage, Space, Unit};

use crate::error::{BackendError, BackendResult};
use crate::store::{ConfigStore, UsageSource};

/// Default per-request timeout, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings shared by the HTTP clients.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL without trailing slash, e.g. `https://config.internal`.
    pub base_url: String,
    /// Optional bearer token.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .unwrap_or_default()
    }
}

/// HTTP client for the configuration-management backend.
pub struct HttpConfigStore {
    config: HttpConfig,
    client: reqwest::Client,
}

impl HttpConfigStore {
    pub fn new(config: HttpConfig) -> Self {
        let client = config.build_client();
        Self { config, client }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

/// Map a non-success response to a backend error.
async fn check_status(response: reqwest::Response) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ConfigStore for HttpConfigStore {
    async fn list_spaces(&self) -> BackendResult<Vec<Space>> {
        let response = self
            .request(reqwest::Method::GET, "/api/spaces")
            .send()
            .await?;
        let spaces: Vec<Space> = check_status(response).await?.json().await?;
        debug!("Listed {} spaces", spaces.len());
        Ok(spaces)
    }

    async fn list_units(&self, space_id: &str) -> BackendResult<Vec<Unit>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/spaces/{}/units", space_id),
            )
            .send()
            .await?;
        let units: Vec<Unit> = check_status(response).await?.json().await?;
        debug!("Listed {} units in space {}", units.len(), space_id);
        Ok(units)
    }

    async fn create_record(
        &self,
        space_id: &str,
        payload: &CostRecordPayload,
    ) -> BackendResult<()> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/spaces/{}/records", space_id),
            )
            .json(payload)
            .send()
            .await?;
        check_status(response).await?;
        debug!("Created {} record for unit {}", payload.kind, payload.unit_id);
        Ok(())
    }
}

/// HTTP client for the orchestration runtime's usage query.
pub struct HttpUsageSource {
    config: HttpConfig,
    client: reqwest::Client,
}

impl HttpUsageSource {
    pub fn new(config: HttpConfig) -> Self {
        let client = config.build_client();
        Self { config, client }
    }
}

#[async_trait]
impl UsageSource for HttpUsageSource {
    async fn unit_usage(&self, space_id: &str, unit_id: &str) -> BackendResult<ResourceUsage> {
        let url = format!(
            "{}/api/spaces/{}/units/{}/usage",
            self.config.base_url, space_id, unit_id
        );
        let mut builder = self.client.get(url);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        let usage: ResourceUsage = check_status(response).await?.json().await?;
        Ok(usage)
    }
}
