use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::protocol::{ErrorBody, HealthReport, OptimizeRequest, OptimizeResponse, ResultPayload};
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigError, Settings},
    error::RequestError,
};

/// Request/response side of the optimizer.
#[async_trait]
pub trait OptimizerApi: Send + Sync {
    async fn optimize(&self, body: &OptimizeRequest) -> Result<ResultPayload, RequestError>;
}

#[derive(Debug, Clone)]
pub struct RequestClient {
    http: Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl RequestClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(settings.api_base()?, settings.request_timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/optimize-team`. Every failure comes back as one
    /// [`RequestError`]; a success body without `data` is an error too.
    pub async fn submit(&self, body: &OptimizeRequest) -> Result<ResultPayload, RequestError> {
        let url = format!("{}/optimize-team", self.base_url);
        info!(
            %url,
            project = %body.requirements.project_name,
            team_size = body.requirements.team_size,
            candidates = body.personnel.len(),
            "optimizer: submitting optimization request"
        );
        let response: OptimizeResponse = self.execute(&url, self.http.post(&url).json(body)).await?;
        response
            .data
            .ok_or_else(|| RequestError::MalformedResponse("response body has no `data`".into()))
    }

    /// `GET {base}/health`.
    pub async fn health(&self) -> Result<HealthReport, RequestError> {
        let url = format!("{}/health", self.base_url);
        self.execute(&url, self.http.get(&url)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<T, RequestError> {
        let request = match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|err| self.transport_error(url, err))?;
        let status = response.status();

        if !status.is_success() {
            // The status already arrived; an unreadable body only loses the detail.
            let text = response.text().await.unwrap_or_else(|err| {
                debug!(%url, error = %err, "optimizer: error body unreadable");
                String::new()
            });
            let err = http_error(status, &text);
            warn!(%url, status = status.as_u16(), error = %err, "optimizer: non-success response");
            return Err(err);
        }

        let text = response
            .text()
            .await
            .map_err(|err| self.transport_error(url, err))?;

        debug!(%url, bytes = text.len(), "optimizer: response received");
        serde_json::from_str(&text).map_err(|err| RequestError::MalformedResponse(err.to_string()))
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> RequestError {
        if err.is_timeout() {
            RequestError::Timeout {
                url: url.to_string(),
                after: self.timeout.unwrap_or_default(),
            }
        } else {
            RequestError::Network {
                url: url.to_string(),
                reason: error_chain(&err),
            }
        }
    }
}

#[async_trait]
impl OptimizerApi for RequestClient {
    async fn optimize(&self, body: &OptimizeRequest) -> Result<ResultPayload, RequestError> {
        self.submit(body).await
    }
}

fn http_error(status: StatusCode, body: &str) -> RequestError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.detail_text())
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });
    RequestError::Http {
        status: status.as_u16(),
        detail,
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
#[path = "tests/request_tests.rs"]
mod tests;
