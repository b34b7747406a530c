// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign store wrapper with switchable failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use outreach_core::types::{
    CallPatch, Campaign, CampaignCall, CampaignPatch, LeadContact, NewCampaign, UpdateOutcome,
    WriteGuard,
};
use outreach_core::{CampaignStore, OutreachError};

/// Delegates to a real store unless a failure switch is on.
pub struct FaultyStore {
    inner: Arc<dyn CampaignStore>,
    fail_pending_lookups: AtomicBool,
    stale_pending: Mutex<Option<CampaignCall>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn CampaignStore>) -> Self {
        Self {
            inner,
            fail_pending_lookups: AtomicBool::new(false),
            stale_pending: Mutex::new(None),
        }
    }

    /// Make `next_pending_call` fail until switched off again.
    pub fn fail_pending_lookups(&self, fail: bool) {
        self.fail_pending_lookups.store(fail, Ordering::SeqCst);
    }

    /// Serve `call` from the next `next_pending_call`, whatever its status,
    /// as a reader that raced another dial loop would see it.
    pub fn serve_stale_call(&self, call: CampaignCall) {
        *self
            .stale_pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(call);
    }
}

#[async_trait]
impl CampaignStore for FaultyStore {
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, OutreachError> {
        self.inner.create_campaign(campaign).await
    }

    async fn create_call_rows(
        &self,
        campaign_id: &str,
        leads: &[LeadContact],
    ) -> Result<Vec<CampaignCall>, OutreachError> {
        self.inner.create_call_rows(campaign_id, leads).await
    }

    async fn create_campaign_with_calls(
        &self,
        campaign: &NewCampaign,
        leads: &[LeadContact],
    ) -> Result<(Campaign, Vec<CampaignCall>), OutreachError> {
        self.inner.create_campaign_with_calls(campaign, leads).await
    }

    async fn get_campaign(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<Campaign>, OutreachError> {
        self.inner.get_campaign(tenant_id, campaign_id).await
    }

    async fn get_campaign_by_id(
        &self,
        campaign_id: &str,
    ) -> Result<Option<Campaign>, OutreachError> {
        self.inner.get_campaign_by_id(campaign_id).await
    }

    async fn list_campaigns(&self, tenant_id: &str) -> Result<Vec<Campaign>, OutreachError> {
        self.inner.list_campaigns(tenant_id).await
    }

    async fn get_campaign_calls(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<CampaignCall>, OutreachError> {
        self.inner.get_campaign_calls(campaign_id).await
    }

    async fn find_active_campaigns_with_batch(&self) -> Result<Vec<Campaign>, OutreachError> {
        self.inner.find_active_campaigns_with_batch().await
    }

    async fn update_campaign_fields(
        &self,
        campaign_id: &str,
        patch: &CampaignPatch,
        guard: &WriteGuard,
    ) -> Result<UpdateOutcome, OutreachError> {
        self.inner
            .update_campaign_fields(campaign_id, patch, guard)
            .await
    }

    async fn increment_counters(
        &self,
        campaign_id: &str,
        successful: bool,
    ) -> Result<UpdateOutcome, OutreachError> {
        self.inner.increment_counters(campaign_id, successful).await
    }

    async fn next_pending_call(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignCall>, OutreachError> {
        if self.fail_pending_lookups.load(Ordering::SeqCst) {
            return Err(OutreachError::Storage {
                source: "call queue unavailable".into(),
            });
        }
        let stale = self
            .stale_pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(call) = stale {
            return Ok(Some(call));
        }
        self.inner.next_pending_call(campaign_id).await
    }

    async fn update_call(&self, call_id: &str, patch: &CallPatch) -> Result<bool, OutreachError> {
        self.inner.update_call(call_id, patch).await
    }

    async fn update_call_by_campaign_and_phone(
        &self,
        campaign_id: &str,
        phone_number: &str,
        patch: &CallPatch,
    ) -> Result<usize, OutreachError> {
        self.inner
            .update_call_by_campaign_and_phone(campaign_id, phone_number, patch)
            .await
    }

    async fn delete_campaign(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<bool, OutreachError> {
        self.inner.delete_campaign(tenant_id, campaign_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use outreach_storage::{Database, SqliteCampaignStore};

    #[tokio::test]
    async fn pending_lookup_failure_is_switchable() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("faults.db").to_string_lossy())
            .await
            .unwrap();
        let store = FaultyStore::new(Arc::new(SqliteCampaignStore::new(
            db,
            Arc::new(ManualClock::fixed()),
        )));

        assert!(store.next_pending_call("c1").await.unwrap().is_none());
        store.fail_pending_lookups(true);
        assert!(matches!(
            store.next_pending_call("c1").await,
            Err(OutreachError::Storage { .. })
        ));
        store.fail_pending_lookups(false);
        assert!(store.next_pending_call("c1").await.is_ok());
    }
}
