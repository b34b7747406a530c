// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `CampaignStore` and `LeadDirectory` traits.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use outreach_core::types::{
    CallPatch, Campaign, CampaignCall, CampaignPatch, LeadContact, NewCampaign, UpdateOutcome,
    WriteGuard,
};
use outreach_core::{CampaignStore, Clock, LeadDirectory, OutreachError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed campaign store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// Row timestamps come from the injected [`Clock`].
pub struct SqliteCampaignStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SqliteCampaignStore {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Seed a lead row. Bulk ingestion belongs to the lead subsystem.
    pub async fn insert_lead(
        &self,
        tenant_id: &str,
        name: &str,
        phone_number: Option<&str>,
        email: Option<&str>,
    ) -> Result<String, OutreachError> {
        let id = queries::leads::insert_lead(&self.db, tenant_id, name, phone_number, email).await?;
        debug!(lead_id = %id, tenant_id, "lead inserted");
        Ok(id)
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn checkpoint(&self) -> Result<(), OutreachError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl CampaignStore for SqliteCampaignStore {
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, OutreachError> {
        queries::campaigns::create_campaign(&self.db, campaign, self.clock.now()).await
    }

    async fn create_call_rows(
        &self,
        campaign_id: &str,
        leads: &[LeadContact],
    ) -> Result<Vec<CampaignCall>, OutreachError> {
        queries::calls::create_call_rows(&self.db, campaign_id, leads, self.clock.now()).await
    }

    async fn create_campaign_with_calls(
        &self,
        campaign: &NewCampaign,
        leads: &[LeadContact],
    ) -> Result<(Campaign, Vec<CampaignCall>), OutreachError> {
        queries::calls::create_campaign_with_calls(&self.db, campaign, leads, self.clock.now())
            .await
    }

    async fn get_campaign(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<Campaign>, OutreachError> {
        queries::campaigns::get_campaign(&self.db, Some(tenant_id), campaign_id).await
    }

    async fn get_campaign_by_id(
        &self,
        campaign_id: &str,
    ) -> Result<Option<Campaign>, OutreachError> {
        queries::campaigns::get_campaign(&self.db, None, campaign_id).await
    }

    async fn list_campaigns(&self, tenant_id: &str) -> Result<Vec<Campaign>, OutreachError> {
        queries::campaigns::list_campaigns(&self.db, tenant_id).await
    }

    async fn get_campaign_calls(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<CampaignCall>, OutreachError> {
        queries::calls::get_campaign_calls(&self.db, campaign_id).await
    }

    async fn find_active_campaigns_with_batch(&self) -> Result<Vec<Campaign>, OutreachError> {
        queries::campaigns::find_active_with_batch(&self.db).await
    }

    async fn update_campaign_fields(
        &self,
        campaign_id: &str,
        patch: &CampaignPatch,
        guard: &WriteGuard,
    ) -> Result<UpdateOutcome, OutreachError> {
        let outcome = queries::campaigns::update_campaign_fields(
            &self.db,
            campaign_id,
            patch,
            guard,
            self.clock.now(),
        )
        .await?;
        if outcome == UpdateOutcome::Conflict {
            debug!(campaign_id, ?guard, "campaign write skipped: guard no longer holds");
        }
        Ok(outcome)
    }

    async fn increment_counters(
        &self,
        campaign_id: &str,
        successful: bool,
    ) -> Result<UpdateOutcome, OutreachError> {
        queries::campaigns::increment_counters(&self.db, campaign_id, successful, self.clock.now())
            .await
    }

    async fn next_pending_call(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignCall>, OutreachError> {
        queries::calls::next_pending_call(&self.db, campaign_id).await
    }

    async fn update_call(&self, call_id: &str, patch: &CallPatch) -> Result<bool, OutreachError> {
        queries::calls::update_call(&self.db, call_id, patch, self.clock.now()).await
    }

    async fn update_call_by_campaign_and_phone(
        &self,
        campaign_id: &str,
        phone_number: &str,
        patch: &CallPatch,
    ) -> Result<usize, OutreachError> {
        queries::calls::update_call_by_campaign_and_phone(
            &self.db,
            campaign_id,
            phone_number,
            patch,
            self.clock.now(),
        )
        .await
    }

    async fn delete_campaign(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<bool, OutreachError> {
        queries::campaigns::delete_campaign(&self.db, tenant_id, campaign_id).await
    }
}

#[async_trait]
impl LeadDirectory for SqliteCampaignStore {
    async fn resolve_phone_numbers(
        &self,
        tenant_id: &str,
        lead_ids: &[String],
    ) -> Result<Vec<LeadContact>, OutreachError> {
        queries::leads::resolve_phone_numbers(&self.db, tenant_id, lead_ids).await
    }
}
