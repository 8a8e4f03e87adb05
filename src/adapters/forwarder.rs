use crate::core::{Forwarder, OutputRecord, RequestContext};
use crate::utils::error::{ForwardError, RelayError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// 將成功結果 POST 到下游服務。Client 在啟動時建立一次，所有請求共用。
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client,
    endpoint: String,
}

impl HttpForwarder {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::ConfigError {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        records: &[OutputRecord],
        ctx: &RequestContext,
    ) -> std::result::Result<usize, ForwardError> {
        if records.is_empty() {
            tracing::debug!(request_id = %ctx.request_id, "No records to forward, skipping downstream call");
            return Ok(0);
        }

        let payload = serde_json::to_vec(records).map_err(ForwardError::Serialization)?;

        tracing::info!(
            request_id = %ctx.request_id,
            users_count = records.len(),
            data_size = payload.len(),
            "Sending data to remote server"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, &ctx.request_id)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::info!(request_id = %ctx.request_id, status_code = status.as_u16(), "Remote server response");
        tracing::debug!(request_id = %ctx.request_id, response = %body, "Remote server response body");

        if !status.is_success() {
            return Err(ForwardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            request_id = %ctx.request_id,
            users_sent = records.len(),
            "Data sent successfully to remote server"
        );

        Ok(records.len())
    }
}
