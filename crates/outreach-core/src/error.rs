// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the outreach platform.

use thiserror::Error;

use crate::types::CampaignStatus;

/// The primary error type used across all outreach collaborator traits and
/// campaign operations.
#[derive(Debug, Error)]
pub enum OutreachError {
    /// Configuration errors (invalid TOML, missing credentials, bad URLs).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Calling provider transport errors (HTTP failure, unexpected status, bad payload).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No campaign row matches the requested id (within the caller's tenant).
    #[error("campaign not found: {campaign_id}")]
    CampaignNotFound { campaign_id: String },

    /// None of the requested lead ids resolved to a dialable lead.
    #[error("no valid leads: none of the requested lead ids resolved to a phone number")]
    NoValidLeads,

    /// The calling provider rejected the batch request; no rows were created.
    #[error("provider batch creation failed: {message}")]
    ProviderBatchCreationFailed { message: String },

    /// The calling provider refused to cancel a batch; local state is unchanged.
    #[error("provider batch cancellation failed: {message}")]
    ProviderBatchCancellationFailed { message: String },

    /// The campaign is already running.
    #[error("campaign {campaign_id} is already running")]
    AlreadyRunning { campaign_id: String },

    /// The requested state transition is not allowed from the current status.
    #[error("campaign {campaign_id} cannot move from {from} to {to}")]
    InvalidTransition {
        campaign_id: String,
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// Caller input failed validation (empty name, empty lead list, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OutreachError {
    /// Wrap a provider-side failure with no underlying source error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a background loop should simply retry this on its next pass.
    ///
    /// Only transport and storage failures qualify. Batch creation and
    /// cancellation refusals go back to the caller and are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Storage { .. })
    }
}
