// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign and call state machines.
//!
//! ```text
//!   draft ──start──┐
//!                  ├──> running ──pause/cancel──> paused
//!   scheduled ─────┘      │  ^                       │
//!       │                 │  └────────resume─────────┘
//!       │                 ├──> completed   (terminal)
//!       └─────────────────┴──> failed      (terminal)
//! ```
//!
//! Terminal states absorb every further transition. The storage layer
//! enforces the same rule independently, so a stale writer cannot undo it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [CampaignStatus; 6] = [
        Self::Draft,
        Self::Scheduled,
        Self::Running,
        Self::Paused,
        Self::Completed,
        Self::Failed,
    ];

    /// Statuses the reconciliation poller treats as "in flight".
    pub const IN_FLIGHT: [CampaignStatus; 2] = [Self::Running, Self::Scheduled];

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the campaign state machine.
    ///
    /// Self-loops on non-terminal states are allowed so that re-applying the
    /// same status (e.g. cancelling an already paused campaign) is harmless.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;

        if self.is_terminal() {
            return false;
        }
        if self == next {
            return true;
        }
        match (self, next) {
            (Draft | Scheduled, Running) => true,
            (Running | Scheduled | Draft, Paused) => true,
            (Paused, Running) => true,
            (Running, Completed) => true,
            (Running | Scheduled, Failed) => true,
            // A provider-batched campaign can finish before a poll ever
            // observed it running.
            (Scheduled, Completed) => true,
            _ => false,
        }
    }
}

/// Status of a single dial attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Pending,
    Calling,
    Completed,
    Failed,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Map a provider recipient sub-status onto a local call status.
    ///
    /// Unknown values map to `Calling`: they never close a call row.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" | "cancelled" => Self::Failed,
            _ => Self::Calling,
        }
    }
}
