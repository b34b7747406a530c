// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch-calling API request/response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// --- Personalization ---

/// Per-call data handed to the voice agent when the conversation starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    /// Template variables the agent prompt can reference.
    pub dynamic_variables: BTreeMap<String, String>,
}

// --- Batch submission ---

/// One recipient of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRecipient {
    pub phone_number: String,
    pub conversation_initiation_client_data: ClientData,
}

/// Body of `POST /v1/convai/batch-calling/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubmitRequest {
    pub call_name: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_phone_number_id: Option<String>,
    /// Unix seconds; omitted for immediate dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time_unix: Option<i64>,
    pub recipients: Vec<SubmitRecipient>,
}

/// Response of a batch submission.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSubmitResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

// --- Batch status ---

/// Per-recipient entry of a batch status response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientEntry {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Response of `GET /v1/convai/batch-calling/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchStatusResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub total_calls_dispatched: u32,
    #[serde(default)]
    pub total_calls_scheduled: u32,
    #[serde(default)]
    pub recipients: Vec<RecipientEntry>,
}

// --- Single outbound call ---

/// Body of `POST /v1/convai/twilio/outbound-call`.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundCallRequest {
    pub agent_id: String,
    pub agent_phone_number_id: String,
    pub to_number: String,
    pub conversation_initiation_client_data: ClientData,
}

/// Response of an outbound call request.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundCallResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

fn default_success() -> bool {
    true
}

// --- Errors ---

/// Error body returned by the provider. `detail` is either a plain string or
/// an object carrying `message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub detail: serde_json::Value,
}

impl ApiErrorResponse {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.detail.to_string()),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_tolerates_missing_fields() {
        let body = r#"{"status": "in_progress", "recipients": [{"phone_number": "+1"}, {}]}"#;
        let parsed: BatchStatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.total_calls_dispatched, 0);
        assert_eq!(parsed.recipients.len(), 2);
        assert!(parsed.recipients[1].phone_number.is_none());
    }

    #[test]
    fn submit_request_omits_unset_optionals() {
        let req = BatchSubmitRequest {
            call_name: "spring".into(),
            agent_id: "agent".into(),
            agent_phone_number_id: None,
            scheduled_time_unix: None,
            recipients: vec![],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("agent_phone_number_id").is_none());
        assert!(json.get("scheduled_time_unix").is_none());
    }

    #[test]
    fn error_detail_shapes() {
        let plain: ApiErrorResponse = serde_json::from_str(r#"{"detail": "bad agent"}"#).unwrap();
        assert_eq!(plain.message(), "bad agent");
        let nested: ApiErrorResponse =
            serde_json::from_str(r#"{"detail": {"status": "invalid", "message": "no number"}}"#)
                .unwrap();
        assert_eq!(nested.message(), "no number");
    }
}
