// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign store trait for persistence backends.

use async_trait::async_trait;

use crate::error::OutreachError;
use crate::types::{
    CallPatch, Campaign, CampaignCall, CampaignPatch, LeadContact, NewCampaign, UpdateOutcome,
    WriteGuard,
};

/// Persistence for campaigns and their per-lead call rows.
///
/// The orchestrator, the direct-dial loop and the reconciliation poller all
/// write through this trait. Every write is a targeted column merge, never a
/// full-row replace, and implementations must uphold these rules regardless
/// of caller:
///
/// - a row in a terminal status accepts no further campaign writes;
/// - `batch_id` is set at most once;
/// - counters written by reconciliation never decrease and never exceed
///   `total_leads`;
/// - a write carrying `observed_at` older than the last applied observation
///   is rejected.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Insert a campaign row without call rows.
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, OutreachError>;

    /// Bulk-insert one `pending` call row per lead.
    async fn create_call_rows(
        &self,
        campaign_id: &str,
        leads: &[LeadContact],
    ) -> Result<Vec<CampaignCall>, OutreachError>;

    /// Insert a campaign and all of its call rows in one transaction.
    async fn create_campaign_with_calls(
        &self,
        campaign: &NewCampaign,
        leads: &[LeadContact],
    ) -> Result<(Campaign, Vec<CampaignCall>), OutreachError>;

    /// Fetch a campaign scoped to its owning tenant.
    async fn get_campaign(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<Campaign>, OutreachError>;

    /// Fetch a campaign without tenant scoping (background loops only).
    async fn get_campaign_by_id(&self, campaign_id: &str)
    -> Result<Option<Campaign>, OutreachError>;

    /// All campaigns of a tenant, newest first.
    async fn list_campaigns(&self, tenant_id: &str) -> Result<Vec<Campaign>, OutreachError>;

    /// Call rows of a campaign in creation order.
    async fn get_campaign_calls(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<CampaignCall>, OutreachError>;

    /// Campaigns in `running`/`scheduled` with a batch, stalest first.
    async fn find_active_campaigns_with_batch(&self) -> Result<Vec<Campaign>, OutreachError>;

    /// Apply a targeted update if `guard` still holds.
    async fn update_campaign_fields(
        &self,
        campaign_id: &str,
        patch: &CampaignPatch,
        guard: &WriteGuard,
    ) -> Result<UpdateOutcome, OutreachError>;

    /// Atomically bump `called` and one of `successful`/`failed`.
    async fn increment_counters(
        &self,
        campaign_id: &str,
        successful: bool,
    ) -> Result<UpdateOutcome, OutreachError>;

    /// The oldest call row of a campaign still in `pending`.
    async fn next_pending_call(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignCall>, OutreachError>;

    /// Targeted update of a single call row. Returns whether a row changed.
    ///
    /// Moving a row to `calling` claims it and succeeds only from `pending`.
    async fn update_call(&self, call_id: &str, patch: &CallPatch) -> Result<bool, OutreachError>;

    /// Targeted update of the non-terminal call rows of `campaign_id` dialing
    /// `phone_number`. Returns the number of rows changed.
    async fn update_call_by_campaign_and_phone(
        &self,
        campaign_id: &str,
        phone_number: &str,
        patch: &CallPatch,
    ) -> Result<usize, OutreachError>;

    /// Delete a campaign and its call rows. Refused while running.
    async fn delete_campaign(&self, tenant_id: &str, campaign_id: &str)
    -> Result<bool, OutreachError>;
}
