// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across collaborator traits and campaign components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use crate::state::{CallStatus, CampaignStatus};

/// Outreach channel of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    #[default]
    VoiceCall,
    Sms,
    Whatsapp,
    Email,
}

/// Result classification recorded against a finished call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Interested,
    NotInterested,
    Callback,
    Appointment,
    NoAnswer,
}

/// How a campaign's calls are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One provider batch opened at creation time; the provider dials.
    #[default]
    Batch,
    /// Legacy mode: the orchestrator dials each lead itself after `start`.
    DirectDial,
}

/// A persisted campaign row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub agent_id: String,
    pub campaign_type: CampaignType,
    pub custom_message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_leads: u32,
    pub called: u32,
    pub successful: u32,
    pub failed: u32,
    /// Ordered lead references captured at creation; never rewritten.
    pub lead_ids: Vec<String>,
    /// Provider batch handle. Set at most once.
    pub batch_id: Option<String>,
    pub status: CampaignStatus,
    /// Optimistic-concurrency token, bumped by every write.
    pub version: i64,
    /// Provider observation time of the last applied reconciliation.
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn counters(&self) -> CallCounters {
        CallCounters {
            called: self.called,
            successful: self.successful,
            failed: self.failed,
        }
    }

    pub fn is_direct_dial(&self) -> bool {
        self.batch_id.is_none()
    }
}

/// A persisted per-lead dial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCall {
    pub id: String,
    pub campaign_id: String,
    pub lead_id: String,
    /// Denormalized at creation for audit stability.
    pub lead_name: Option<String>,
    /// Denormalized at creation for audit stability.
    pub phone_number: String,
    pub status: CallStatus,
    pub conversation_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Call duration in seconds.
    pub duration: Option<u32>,
    pub outcome: Option<CallOutcome>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A lead as seen by the campaign core: just enough to dial it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadContact {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
}

/// Aggregate call counters of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallCounters {
    pub called: u32,
    pub successful: u32,
    pub failed: u32,
}

/// Input for inserting a campaign row.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub agent_id: String,
    pub campaign_type: CampaignType,
    pub custom_message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub total_leads: u32,
    pub lead_ids: Vec<String>,
    pub batch_id: Option<String>,
    pub status: CampaignStatus,
}

/// A targeted, partial campaign update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignPatch {
    pub status: Option<CampaignStatus>,
    /// Only applied when the row has no batch yet.
    pub batch_id: Option<String>,
    /// Only applied when the row has no start time yet.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Merged monotonically: a counter never decreases.
    pub counters: Option<CallCounters>,
    /// Provider observation time; a write older than the last applied
    /// observation is rejected.
    pub observed_at: Option<DateTime<Utc>>,
}

impl CampaignPatch {
    pub fn status(status: CampaignStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.batch_id.is_none()
            && self.started_at.is_none()
            && self.completed_at.is_none()
            && self.counters.is_none()
    }
}

/// Preconditions a campaign write must still satisfy when it lands.
///
/// Writes against a terminal row are always refused, whatever the guard says.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteGuard {
    /// Apply only if the row still carries this version.
    pub expected_version: Option<i64>,
    /// Apply only if the row's status is one of these (empty = any non-terminal).
    pub allowed_from: Vec<CampaignStatus>,
}

impl WriteGuard {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from_statuses(statuses: &[CampaignStatus]) -> Self {
        Self {
            expected_version: None,
            allowed_from: statuses.to_vec(),
        }
    }

    pub fn at_version(version: i64) -> Self {
        Self {
            expected_version: Some(version),
            allowed_from: Vec::new(),
        }
    }
}

/// Whether a guarded write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The guard no longer held (or the row is terminal / gone).
    Conflict,
}

/// A targeted, partial call-row update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallPatch {
    pub status: Option<CallStatus>,
    pub conversation_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Option<u32>,
    pub outcome: Option<CallOutcome>,
    pub error: Option<String>,
}

// --- Calling provider request/response types ---

/// Provider-side lifecycle of a batch.
///
/// Parsed leniently: unknown codes are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderBatchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Other(String),
}

impl ProviderBatchStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Local campaign status implied by this provider status.
    ///
    /// Unknown codes map to `Running`: an unrecognized value never closes
    /// a campaign.
    pub fn to_campaign_status(&self) -> CampaignStatus {
        match self {
            Self::Pending | Self::InProgress => CampaignStatus::Running,
            Self::Completed => CampaignStatus::Completed,
            Self::Failed => CampaignStatus::Failed,
            Self::Cancelled => CampaignStatus::Paused,
            Self::Other(_) => CampaignStatus::Running,
        }
    }
}

/// One recipient as requested in a batch, with its personalization data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecipient {
    pub lead_id: String,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
}

/// A request to open a provider batch for a campaign.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub campaign_id: String,
    pub campaign_name: String,
    pub agent_id: String,
    pub custom_message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub recipients: Vec<BatchRecipient>,
}

impl BatchRequest {
    pub fn phone_numbers(&self) -> Vec<&str> {
        self.recipients
            .iter()
            .map(|r| r.phone_number.as_str())
            .collect()
    }
}

/// A successfully opened provider batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCreated {
    pub batch_id: String,
}

/// Per-recipient progress as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientStatus {
    pub phone_number: Option<String>,
    pub status: Option<String>,
    pub conversation_id: Option<String>,
}

/// A provider snapshot of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatusReport {
    pub status: ProviderBatchStatus,
    pub total_calls_dispatched: u32,
    pub total_calls_scheduled: u32,
    pub recipients: Vec<RecipientStatus>,
}

impl BatchStatusReport {
    /// Counters derived from the report: dispatched calls, and recipients
    /// whose sub-status is exactly `completed` / `failed`.
    pub fn counters(&self) -> CallCounters {
        let count = |wanted: &str| {
            self.recipients
                .iter()
                .filter(|r| {
                    r.status
                        .as_deref()
                        .is_some_and(|s| s.trim().eq_ignore_ascii_case(wanted))
                })
                .count() as u32
        };
        CallCounters {
            called: self.total_calls_dispatched,
            successful: count("completed"),
            failed: count("failed"),
        }
    }
}

/// A single outbound call request (direct-dial path).
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub campaign_id: String,
    pub campaign_name: String,
    pub agent_id: String,
    pub lead_id: String,
    pub lead_name: Option<String>,
    pub phone_number: String,
    pub custom_message: Option<String>,
}

/// A call the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlacedCall {
    pub conversation_id: Option<String>,
}
