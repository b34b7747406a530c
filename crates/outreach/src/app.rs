// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of store, provider client, orchestrator and poller from config.

use std::sync::Arc;

use outreach_campaign::CampaignService;
use outreach_config::OutreachConfig;
use outreach_core::{CallingProvider, Clock, OutreachError, SystemClock};
use outreach_poller::BatchStatusPoller;
use outreach_storage::{Database, SqliteCampaignStore};
use outreach_voice::VoiceCallingProvider;
use tracing::info;

/// The fully wired platform.
pub struct App {
    pub store: Arc<SqliteCampaignStore>,
    pub service: Arc<CampaignService>,
    pub poller: BatchStatusPoller,
}

impl App {
    pub async fn open(config: &OutreachConfig) -> Result<Self, OutreachError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = open_store(config, clock.clone()).await?;
        let provider: Arc<dyn CallingProvider> =
            Arc::new(VoiceCallingProvider::new(&config.voice)?);
        info!(
            provider = provider.name(),
            base_url = %config.voice.base_url,
            "calling provider ready"
        );

        let service = Arc::new(CampaignService::new(
            store.clone(),
            store.clone(),
            provider,
            clock.clone(),
            &config.dialer,
        ));
        let poller = BatchStatusPoller::from_config(
            store.clone(),
            service.reconciler().clone(),
            clock,
            &config.poller,
        );

        Ok(Self {
            store,
            service,
            poller,
        })
    }
}

/// Open only the store, for commands that never reach the provider.
pub async fn open_store(
    config: &OutreachConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<SqliteCampaignStore>, OutreachError> {
    let db = Database::from_config(&config.storage).await?;
    info!(path = %config.storage.database_path, "campaign store opened");
    Ok(Arc::new(SqliteCampaignStore::new(db, clock)))
}
