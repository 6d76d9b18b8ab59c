//! Remote API client over reqwest.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};

use contracts::{ApiConfig, AssignmentInfo, Destination, Registration, RelayError, RemoteApiClient};

/// Remote administrative API client
#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .map_err(|e| RelayError::connection(Destination::RemoteApi, e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_s * 1000,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request_err(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout {
                destination: Destination::RemoteApi,
                timeout_ms: self.timeout_ms,
            }
        } else {
            RelayError::connection(Destination::RemoteApi, e.to_string())
        }
    }
}

impl RemoteApiClient for HttpApiClient {
    #[instrument(name = "api_register", skip(self, registration), fields(machine_id = %registration.machine_id))]
    async fn register(&self, registration: &Registration) -> Result<Value, RelayError> {
        let resp = self
            .client
            .post(self.url("/api/sensors/register"))
            .json(registration)
            .send()
            .await
            .map_err(|e| self.request_err(e))?;

        let status = resp.status();
        if !(status == StatusCode::OK || status == StatusCode::CREATED) {
            return Err(RelayError::UpstreamStatus {
                destination: Destination::RemoteApi,
                status: status.as_u16(),
            });
        }

        let body = resp.json().await.map_err(|e| self.request_err(e))?;
        debug!("registration acknowledged by remote API");
        Ok(body)
    }

    #[instrument(name = "api_fetch_assignment", skip(self))]
    async fn fetch_assignment(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/sensors/{machine_id}/assignment")))
            .send()
            .await
            .map_err(|e| self.request_err(e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let info = resp.json().await.map_err(|e| self.request_err(e))?;
                Ok(Some(info))
            }
            status => Err(RelayError::UpstreamStatus {
                destination: Destination::RemoteApi,
                status: status.as_u16(),
            }),
        }
    }

    /// Trivial request against the API's connectivity-test endpoint
    async fn ping(&self) -> bool {
        match self.client.get(self.url("/api/test")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
