//! HTTP client for the message processor service

use super::types::{WireReply, WireRequest};
use super::{MessageProcessor, ProcessorError, ProcessorReply, ProcessorRequest};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Posts each message to `{base_url}/process-message/`
pub struct HttpMessageProcessor {
    client: Client,
    endpoint: String,
}

impl HttpMessageProcessor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProcessorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/process-message/", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl MessageProcessor for HttpMessageProcessor {
    async fn process(&self, request: &ProcessorRequest) -> Result<ProcessorReply, ProcessorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&WireRequest::new(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProcessorError::status(status.as_u16(), &body));
        }

        let wire: WireReply = serde_json::from_str(&body).map_err(|e| {
            ProcessorError::invalid_response(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(wire.into())
    }
}
