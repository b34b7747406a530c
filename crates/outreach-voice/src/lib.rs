// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voice-AI calling provider adapter for the outreach platform.
//!
//! This crate implements [`CallingProvider`] over the provider's batch
//! calling HTTP API: batch submission, status polling, cancellation and
//! single outbound calls.

pub mod client;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use outreach_config::model::VoiceConfig;
use outreach_core::CallingProvider;
use outreach_core::error::OutreachError;
use outreach_core::types::{
    BatchCreated, BatchRequest, BatchStatusReport, CallRequest, PlacedCall, ProviderBatchStatus,
    RecipientStatus,
};
use tracing::{debug, info};

use crate::client::VoiceClient;
use crate::types::{
    BatchStatusResponse, BatchSubmitRequest, ClientData, OutboundCallRequest, SubmitRecipient,
};

/// Fallback environment variable for the API key.
const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Calling provider backed by the voice-AI HTTP API.
///
/// API key resolution order: `voice.api_key` (which `OUTREACH_VOICE_API_KEY`
/// already overrides) -> `ELEVENLABS_API_KEY` -> error.
pub struct VoiceCallingProvider {
    client: VoiceClient,
    agent_phone_number_id: Option<String>,
}

impl VoiceCallingProvider {
    pub fn new(config: &VoiceConfig) -> Result<Self, OutreachError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = VoiceClient::new(
            &api_key,
            &config.base_url,
            config.request_timeout_secs.map(Duration::from_secs),
            config.max_retries,
        )?;
        info!(base_url = %config.base_url, "voice calling provider initialized");
        Ok(Self::with_client(client, config.agent_phone_number_id.clone()))
    }

    pub fn with_client(client: VoiceClient, agent_phone_number_id: Option<String>) -> Self {
        Self {
            client,
            agent_phone_number_id,
        }
    }
}

fn resolve_api_key(configured: Option<&str>) -> Result<String, OutreachError> {
    if let Some(key) = configured.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            OutreachError::Config(format!(
                "voice API key not configured: set voice.api_key, \
                 OUTREACH_VOICE_API_KEY or {API_KEY_ENV}"
            ))
        })
}

/// Template variables for one lead.
fn dynamic_variables(
    lead_id: &str,
    lead_name: Option<&str>,
    campaign_id: &str,
    campaign_name: &str,
    custom_message: Option<&str>,
) -> ClientData {
    let mut vars = BTreeMap::new();
    vars.insert("lead_id".to_string(), lead_id.to_string());
    vars.insert("lead_name".to_string(), lead_name.unwrap_or_default().to_string());
    vars.insert("campaign_id".to_string(), campaign_id.to_string());
    vars.insert("campaign_name".to_string(), campaign_name.to_string());
    if let Some(message) = custom_message {
        vars.insert("custom_message".to_string(), message.to_string());
    }
    ClientData {
        dynamic_variables: vars,
    }
}

pub(crate) fn to_submit_request(
    request: &BatchRequest,
    agent_phone_number_id: Option<String>,
) -> BatchSubmitRequest {
    BatchSubmitRequest {
        call_name: request.campaign_name.clone(),
        agent_id: request.agent_id.clone(),
        agent_phone_number_id,
        scheduled_time_unix: request.scheduled_at.map(|ts| ts.timestamp()),
        recipients: request
            .recipients
            .iter()
            .map(|r| SubmitRecipient {
                phone_number: r.phone_number.clone(),
                conversation_initiation_client_data: dynamic_variables(
                    &r.lead_id,
                    Some(&r.name),
                    &request.campaign_id,
                    &request.campaign_name,
                    request.custom_message.as_deref(),
                ),
            })
            .collect(),
    }
}

pub(crate) fn to_status_report(response: BatchStatusResponse) -> BatchStatusReport {
    BatchStatusReport {
        status: ProviderBatchStatus::parse(&response.status),
        total_calls_dispatched: response.total_calls_dispatched,
        total_calls_scheduled: response.total_calls_scheduled,
        recipients: response
            .recipients
            .into_iter()
            .map(|r| RecipientStatus {
                phone_number: r.phone_number,
                status: r.status,
                conversation_id: r.conversation_id,
            })
            .collect(),
    }
}

#[async_trait]
impl CallingProvider for VoiceCallingProvider {
    fn name(&self) -> &str {
        "voice"
    }

    async fn create_batch(&self, request: &BatchRequest) -> Result<BatchCreated, OutreachError> {
        let body = to_submit_request(request, self.agent_phone_number_id.clone());
        let created = self.client.submit_batch(&body).await?;
        debug!(
            campaign_id = %request.campaign_id,
            batch_id = %created.id,
            recipients = body.recipients.len(),
            "batch submitted"
        );
        Ok(BatchCreated {
            batch_id: created.id,
        })
    }

    async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatusReport, OutreachError> {
        let response = self.client.get_batch(batch_id).await?;
        Ok(to_status_report(response))
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<(), OutreachError> {
        self.client.cancel_batch(batch_id).await
    }

    async fn place_call(&self, request: &CallRequest) -> Result<PlacedCall, OutreachError> {
        let agent_phone_number_id = self.agent_phone_number_id.clone().ok_or_else(|| {
            OutreachError::Config(
                "voice.agent_phone_number_id is required for direct dialing".into(),
            )
        })?;
        let body = OutboundCallRequest {
            agent_id: request.agent_id.clone(),
            agent_phone_number_id,
            to_number: request.phone_number.clone(),
            conversation_initiation_client_data: dynamic_variables(
                &request.lead_id,
                request.lead_name.as_deref(),
                &request.campaign_id,
                &request.campaign_name,
                request.custom_message.as_deref(),
            ),
        };
        let response = self.client.outbound_call(&body).await?;
        if !response.success {
            return Err(OutreachError::provider(
                response
                    .message
                    .unwrap_or_else(|| "provider rejected the call".to_string()),
            ));
        }
        Ok(PlacedCall {
            conversation_id: response.conversation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use outreach_core::types::BatchRecipient;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, phone_id: Option<&str>) -> VoiceCallingProvider {
        let client = VoiceClient::new("xi-key", &server.uri(), None, 0).unwrap();
        VoiceCallingProvider::with_client(client, phone_id.map(str::to_string))
    }

    fn batch_request(scheduled_at: Option<DateTime<Utc>>) -> BatchRequest {
        BatchRequest {
            campaign_id: "c1".into(),
            campaign_name: "Spring".into(),
            agent_id: "agent-1".into(),
            custom_message: Some("20% off".into()),
            scheduled_at,
            recipients: vec![BatchRecipient {
                lead_id: "l1".into(),
                name: "Ada".into(),
                phone_number: "+15550001".into(),
                email: None,
            }],
        }
    }

    #[test]
    fn submit_request_carries_personalization() {
        let at = DateTime::from_timestamp(1_780_000_000, 0).unwrap();
        let body = to_submit_request(&batch_request(Some(at)), Some("ph".into()));
        assert_eq!(body.scheduled_time_unix, Some(1_780_000_000));
        let vars = &body.recipients[0].conversation_initiation_client_data.dynamic_variables;
        assert_eq!(vars["lead_id"], "l1");
        assert_eq!(vars["lead_name"], "Ada");
        assert_eq!(vars["campaign_id"], "c1");
        assert_eq!(vars["custom_message"], "20% off");
    }

    #[test]
    fn unknown_provider_status_is_preserved() {
        let response: BatchStatusResponse =
            serde_json::from_str(r#"{"status": "queued_external"}"#).unwrap();
        let report = to_status_report(response);
        assert_eq!(
            report.status,
            ProviderBatchStatus::Other("queued_external".into())
        );
    }

    #[test]
    fn configured_key_wins() {
        assert_eq!(resolve_api_key(Some("abc")).unwrap(), "abc");
    }

    #[tokio::test]
    async fn create_batch_returns_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/convai/batch-calling/submit"))
            .and(body_partial_json(serde_json::json!({"agent_phone_number_id": "ph"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "b-77"})),
            )
            .mount(&server)
            .await;

        let created = provider(&server, Some("ph"))
            .create_batch(&batch_request(None))
            .await
            .unwrap();
        assert_eq!(created.batch_id, "b-77");
    }

    #[tokio::test]
    async fn place_call_requires_phone_number_id() {
        let server = MockServer::start().await;
        let request = CallRequest {
            campaign_id: "c1".into(),
            campaign_name: "Spring".into(),
            agent_id: "agent-1".into(),
            lead_id: "l1".into(),
            lead_name: None,
            phone_number: "+1".into(),
            custom_message: None,
        };
        let err = provider(&server, None).place_call(&request).await.unwrap_err();
        assert!(matches!(err, OutreachError::Config(_)));
    }

    #[tokio::test]
    async fn place_call_maps_unsuccessful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/convai/twilio/outbound-call"))
            .and(body_partial_json(serde_json::json!({"to_number": "+1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"success": false, "message": "number unreachable"}),
            ))
            .mount(&server)
            .await;
        let request = CallRequest {
            campaign_id: "c1".into(),
            campaign_name: "Spring".into(),
            agent_id: "agent-1".into(),
            lead_id: "l1".into(),
            lead_name: Some("Ada".into()),
            phone_number: "+1".into(),
            custom_message: None,
        };
        let err = provider(&server, Some("ph"))
            .place_call(&request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("number unreachable"));
    }
}
