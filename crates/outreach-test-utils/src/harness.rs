// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end campaign tests.
//!
//! `TestHarness` assembles the full stack around a temp SQLite database:
//! store, mock provider, manual clock, orchestrator and poller, all sharing
//! the same collaborators the binary wires together.

use std::sync::Arc;
use std::time::Duration;

use outreach_campaign::{CampaignService, CreateCampaign};
use outreach_config::model::DialerConfig;
use outreach_core::OutreachError;
use outreach_core::types::{Campaign, CampaignType, DispatchMode};
use outreach_poller::BatchStatusPoller;
use outreach_storage::{Database, SqliteCampaignStore};

use crate::clock::ManualClock;
use crate::faulty_store::FaultyStore;
use crate::mock_provider::MockCallingProvider;

/// Tenant used by the convenience helpers.
pub const TENANT: &str = "tenant-1";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    inter_call_delay: Duration,
    inter_campaign_delay: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            inter_call_delay: Duration::from_millis(2000),
            inter_campaign_delay: Duration::from_millis(1000),
        }
    }

    pub fn with_inter_call_delay(mut self, delay: Duration) -> Self {
        self.inter_call_delay = delay;
        self
    }

    pub fn with_inter_campaign_delay(mut self, delay: Duration) -> Self {
        self.inter_campaign_delay = delay;
        self
    }

    pub async fn build(self) -> Result<TestHarness, OutreachError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| OutreachError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("outreach.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let clock = Arc::new(ManualClock::fixed());
        let provider = Arc::new(MockCallingProvider::new());
        let store = Arc::new(SqliteCampaignStore::new(db, clock.clone()));
        let faults = Arc::new(FaultyStore::new(store.clone()));

        let dialer_config = DialerConfig {
            inter_call_delay_ms: self.inter_call_delay.as_millis() as u64,
        };
        let service = Arc::new(CampaignService::new(
            faults.clone(),
            store.clone(),
            provider.clone(),
            clock.clone(),
            &dialer_config,
        ));
        let poller = Arc::new(BatchStatusPoller::new(
            faults.clone(),
            service.reconciler().clone(),
            clock.clone(),
            self.inter_campaign_delay,
        ));

        Ok(TestHarness {
            store,
            faults,
            provider,
            clock,
            service,
            poller,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and temp storage.
pub struct TestHarness {
    pub store: Arc<SqliteCampaignStore>,
    /// The store the service and poller write through.
    pub faults: Arc<FaultyStore>,
    pub provider: Arc<MockCallingProvider>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<CampaignService>,
    pub poller: Arc<BatchStatusPoller>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, OutreachError> {
        Self::builder().build().await
    }

    /// Insert `phones.len()` leads for [`TENANT`], returning their ids in order.
    pub async fn seed_leads(&self, phones: &[&str]) -> Result<Vec<String>, OutreachError> {
        let mut ids = Vec::with_capacity(phones.len());
        for (i, phone) in phones.iter().enumerate() {
            let name = format!("Lead {}", i + 1);
            ids.push(
                self.store
                    .insert_lead(TENANT, &name, Some(phone), None)
                    .await?,
            );
        }
        Ok(ids)
    }

    /// A create request for [`TENANT`] with sensible defaults.
    pub fn create_request(&self, lead_ids: Vec<String>, mode: DispatchMode) -> CreateCampaign {
        CreateCampaign {
            tenant_id: TENANT.to_string(),
            name: "Spring outreach".to_string(),
            agent_id: "agent-1".to_string(),
            lead_ids,
            campaign_type: CampaignType::VoiceCall,
            custom_message: Some("Hello from the clinic".to_string()),
            scheduled_at: None,
            mode,
        }
    }

    /// Seed leads and create a batch campaign dialing them.
    pub async fn batch_campaign(&self, phones: &[&str]) -> Result<Campaign, OutreachError> {
        let leads = self.seed_leads(phones).await?;
        self.service
            .create(self.create_request(leads, DispatchMode::Batch))
            .await
    }

    /// Seed leads and create a direct-dial campaign (still in `draft`).
    pub async fn direct_dial_campaign(&self, phones: &[&str]) -> Result<Campaign, OutreachError> {
        let leads = self.seed_leads(phones).await?;
        self.service
            .create(self.create_request(leads, DispatchMode::DirectDial))
            .await
    }

    /// Re-read a campaign of [`TENANT`].
    pub async fn campaign(&self, campaign_id: &str) -> Result<Campaign, OutreachError> {
        self.service.get(TENANT, campaign_id).await
    }
}
