// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the voice-AI batch calling API.
//!
//! Provides [`VoiceClient`] which handles authentication, JSON bodies and
//! transient error retry for the four endpoints the campaign core uses.

use std::time::Duration;

use outreach_core::OutreachError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    ApiErrorResponse, BatchStatusResponse, BatchSubmitRequest, BatchSubmitResponse,
    OutboundCallRequest, OutboundCallResponse,
};

const SUBMIT_PATH: &str = "/v1/convai/batch-calling/submit";
const OUTBOUND_CALL_PATH: &str = "/v1/convai/twilio/outbound-call";

/// HTTP client for the calling provider.
///
/// Retries transient statuses (429, 500, 502, 503) up to `max_retries`
/// times with a one-second pause between attempts.
#[derive(Debug, Clone)]
pub struct VoiceClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl VoiceClient {
    /// Creates a new client.
    ///
    /// `timeout` of `None` keeps reqwest's default (no overall deadline).
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Option<Duration>,
        max_retries: u32,
    ) -> Result<Self, OutreachError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "xi-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| OutreachError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| OutreachError::Provider {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    /// Submit a batch. Returns the provider's batch handle.
    pub async fn submit_batch(
        &self,
        request: &BatchSubmitRequest,
    ) -> Result<BatchSubmitResponse, OutreachError> {
        self.send_json(Method::POST, SUBMIT_PATH, Some(request)).await
    }

    /// Fetch the live status of a batch.
    pub async fn get_batch(&self, batch_id: &str) -> Result<BatchStatusResponse, OutreachError> {
        let path = format!("/v1/convai/batch-calling/{batch_id}");
        self.send_json::<(), _>(Method::GET, &path, None).await
    }

    /// Cancel a batch. The response body is not interpreted.
    pub async fn cancel_batch(&self, batch_id: &str) -> Result<(), OutreachError> {
        let path = format!("/v1/convai/batch-calling/{batch_id}/cancel");
        self.send::<()>(Method::POST, &path, None).await?;
        Ok(())
    }

    /// Place one outbound call.
    pub async fn outbound_call(
        &self,
        request: &OutboundCallRequest,
    ) -> Result<OutboundCallResponse, OutreachError> {
        self.send_json(Method::POST, OUTBOUND_CALL_PATH, Some(request))
            .await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, OutreachError> {
        let text = self.send(method, path, body).await?;
        serde_json::from_str(&text).map_err(|e| OutreachError::Provider {
            message: format!("failed to parse provider response from {path}: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Send a request with transient-error retry and return the success body.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, OutreachError> {
        let url = format!("{}{path}", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying provider request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(|e| OutreachError::Provider {
                message: format!("HTTP request to {path} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            let status = response.status();
            debug!(status = %status, attempt, path, "provider response received");

            if status.is_success() {
                return response.text().await.map_err(|e| OutreachError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(OutreachError::provider(format!(
                    "provider returned {status}: {body}"
                )));
                continue;
            }

            // Non-transient error or exhausted retries.
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("provider error ({status}): {}", api_err.message()),
                Err(_) => format!("provider returned {status}: {body}"),
            };
            return Err(OutreachError::provider(message));
        }

        Err(last_error
            .unwrap_or_else(|| OutreachError::provider("provider request failed after retries")))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
