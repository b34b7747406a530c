// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The campaign orchestrator.
//!
//! Owns user-initiated transitions (create, start, pause, resume, cancel,
//! delete) and the on-demand batch sync. Every status write goes through a
//! [`WriteGuard`] naming the statuses the transition is valid from, so a
//! transition that lost a race against the poller or the dialer surfaces as
//! an error instead of clobbering the newer state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use outreach_config::model::DialerConfig;
use outreach_core::types::{
    BatchRecipient, BatchRequest, Campaign, CampaignCall, CampaignPatch, CampaignType, DispatchMode,
    LeadContact, NewCampaign, UpdateOutcome, WriteGuard,
};
use outreach_core::{
    CallingProvider, CampaignStatus, CampaignStore, Clock, LeadDirectory, OutreachError,
};
use tracing::{info, warn};

use crate::dialer::{DialOutcome, DirectDialer};
use crate::reconcile::{BatchReconciler, ReconcileOutcome};

/// Input for [`CampaignService::create`].
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub tenant_id: String,
    pub name: String,
    pub agent_id: String,
    pub lead_ids: Vec<String>,
    pub campaign_type: CampaignType,
    pub custom_message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub mode: DispatchMode,
}

/// Campaign orchestrator.
pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
    leads: Arc<dyn LeadDirectory>,
    provider: Arc<dyn CallingProvider>,
    clock: Arc<dyn Clock>,
    reconciler: BatchReconciler,
    dialer: DirectDialer,
}

impl CampaignService {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        leads: Arc<dyn LeadDirectory>,
        provider: Arc<dyn CallingProvider>,
        clock: Arc<dyn Clock>,
        dialer_config: &DialerConfig,
    ) -> Self {
        let reconciler = BatchReconciler::new(store.clone(), provider.clone(), clock.clone());
        let dialer = DirectDialer::new(
            store.clone(),
            provider.clone(),
            clock.clone(),
            dialer_config.inter_call_delay(),
        );
        Self {
            store,
            leads,
            provider,
            clock,
            reconciler,
            dialer,
        }
    }

    /// The reconciler shared with the poller.
    pub fn reconciler(&self) -> &BatchReconciler {
        &self.reconciler
    }

    /// Create a campaign and its call rows.
    ///
    /// In batch mode the provider batch is requested first; if the provider
    /// refuses, nothing is persisted. If persisting fails after the batch
    /// exists, the batch is cancelled again.
    pub async fn create(&self, request: CreateCampaign) -> Result<Campaign, OutreachError> {
        if request.name.trim().is_empty() {
            return Err(OutreachError::Validation("campaign name must not be empty".into()));
        }
        if request.agent_id.trim().is_empty() {
            return Err(OutreachError::Validation("agent_id must not be empty".into()));
        }
        if request.lead_ids.is_empty() {
            return Err(OutreachError::Validation("lead_ids must not be empty".into()));
        }

        let contacts = self
            .leads
            .resolve_phone_numbers(&request.tenant_id, &request.lead_ids)
            .await?;
        if contacts.is_empty() {
            return Err(OutreachError::NoValidLeads);
        }
        let requested: HashSet<&str> = request.lead_ids.iter().map(String::as_str).collect();
        if contacts.len() < requested.len() {
            warn!(
                tenant_id = %request.tenant_id,
                requested = requested.len(),
                resolved = contacts.len(),
                "dropping lead ids that did not resolve to a dialable lead"
            );
        }

        let now = self.clock.now();
        let scheduled_at = request.scheduled_at.filter(|at| *at > now);
        let mut campaign = NewCampaign {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id.clone(),
            name: request.name.trim().to_string(),
            agent_id: request.agent_id.clone(),
            campaign_type: request.campaign_type,
            custom_message: request.custom_message.clone(),
            scheduled_at,
            started_at: None,
            total_leads: contacts.len() as u32,
            lead_ids: contacts.iter().map(|c| c.id.clone()).collect(),
            batch_id: None,
            status: if scheduled_at.is_some() {
                CampaignStatus::Scheduled
            } else {
                CampaignStatus::Draft
            },
        };

        match request.mode {
            DispatchMode::DirectDial => {
                let (created, _) = self
                    .store
                    .create_campaign_with_calls(&campaign, &contacts)
                    .await?;
                info!(
                    campaign_id = %created.id,
                    total_leads = created.total_leads,
                    status = %created.status,
                    "direct-dial campaign created"
                );
                Ok(created)
            }
            DispatchMode::Batch => {
                let batch_id = self.submit_batch(&campaign, &contacts).await?;
                campaign.batch_id = Some(batch_id.clone());
                if scheduled_at.is_none() {
                    campaign.status = CampaignStatus::Running;
                    campaign.started_at = Some(now);
                }

                match self
                    .store
                    .create_campaign_with_calls(&campaign, &contacts)
                    .await
                {
                    Ok((created, _)) => {
                        info!(
                            campaign_id = %created.id,
                            %batch_id,
                            total_leads = created.total_leads,
                            status = %created.status,
                            "batch campaign created"
                        );
                        Ok(created)
                    }
                    Err(e) => {
                        warn!(
                            campaign_id = %campaign.id,
                            %batch_id,
                            error = %e,
                            "persisting campaign failed, cancelling provider batch"
                        );
                        if let Err(cancel_err) = self.provider.cancel_batch(&batch_id).await {
                            warn!(
                                %batch_id,
                                error = %cancel_err,
                                "compensating batch cancellation failed"
                            );
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    async fn submit_batch(
        &self,
        campaign: &NewCampaign,
        contacts: &[LeadContact],
    ) -> Result<String, OutreachError> {
        let request = BatchRequest {
            campaign_id: campaign.id.clone(),
            campaign_name: campaign.name.clone(),
            agent_id: campaign.agent_id.clone(),
            custom_message: campaign.custom_message.clone(),
            scheduled_at: campaign.scheduled_at,
            recipients: contacts
                .iter()
                .map(|c| BatchRecipient {
                    lead_id: c.id.clone(),
                    name: c.name.clone(),
                    phone_number: c.phone_number.clone(),
                    email: c.email.clone(),
                })
                .collect(),
        };
        self.provider
            .create_batch(&request)
            .await
            .map(|created| created.batch_id)
            .map_err(|e| {
                warn!(
                    campaign_id = %campaign.id,
                    provider = self.provider.name(),
                    error = %e,
                    "batch creation rejected"
                );
                OutreachError::ProviderBatchCreationFailed {
                    message: e.to_string(),
                }
            })
    }

    /// Start a campaign.
    ///
    /// A batch campaign is already executing on the provider, so starting it
    /// only syncs its status. A direct-dial campaign moves to `running` and
    /// its dial loop is spawned in the background.
    pub async fn start(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Campaign, OutreachError> {
        let campaign = self.get(tenant_id, campaign_id).await?;
        if campaign.batch_id.is_some() {
            return self.sync(campaign).await;
        }

        match campaign.status {
            CampaignStatus::Running => {
                return Err(OutreachError::AlreadyRunning {
                    campaign_id: campaign.id,
                });
            }
            CampaignStatus::Draft | CampaignStatus::Scheduled => {}
            from => return Err(invalid(&campaign.id, from, CampaignStatus::Running)),
        }

        let patch = CampaignPatch {
            status: Some(CampaignStatus::Running),
            started_at: Some(self.clock.now()),
            ..CampaignPatch::default()
        };
        let guard = WriteGuard {
            expected_version: Some(campaign.version),
            allowed_from: vec![CampaignStatus::Draft, CampaignStatus::Scheduled],
        };
        let started = self
            .transition(&campaign, &patch, &guard, CampaignStatus::Running)
            .await?;
        self.dialer.spawn(&started).await;
        Ok(started)
    }

    /// Pause a running campaign. The provider batch, if any, keeps running.
    pub async fn pause(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Campaign, OutreachError> {
        let campaign = self.get(tenant_id, campaign_id).await?;
        if campaign.status != CampaignStatus::Running {
            return Err(invalid(&campaign.id, campaign.status, CampaignStatus::Paused));
        }
        let paused = self
            .transition(
                &campaign,
                &CampaignPatch::status(CampaignStatus::Paused),
                &WriteGuard::from_statuses(&[CampaignStatus::Running]),
                CampaignStatus::Paused,
            )
            .await?;
        self.dialer.stop(&paused.id).await;
        info!(campaign_id = %paused.id, "campaign paused");
        Ok(paused)
    }

    /// Resume a paused campaign; direct-dial campaigns pick up their queue.
    pub async fn resume(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Campaign, OutreachError> {
        let campaign = self.get(tenant_id, campaign_id).await?;
        if campaign.status != CampaignStatus::Paused {
            return Err(invalid(&campaign.id, campaign.status, CampaignStatus::Running));
        }
        let resumed = self
            .transition(
                &campaign,
                &CampaignPatch::status(CampaignStatus::Running),
                &WriteGuard::from_statuses(&[CampaignStatus::Paused]),
                CampaignStatus::Running,
            )
            .await?;
        if resumed.is_direct_dial() {
            self.dialer.spawn(&resumed).await;
        }
        info!(campaign_id = %resumed.id, "campaign resumed");
        Ok(resumed)
    }

    /// Cancel a campaign: cancel the provider batch, then pause locally.
    ///
    /// If the provider refuses the cancellation the local row is untouched.
    pub async fn cancel(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Campaign, OutreachError> {
        let campaign = self.get(tenant_id, campaign_id).await?;
        if campaign.status.is_terminal() {
            return Err(invalid(&campaign.id, campaign.status, CampaignStatus::Paused));
        }

        if let Some(batch_id) = campaign.batch_id.as_deref() {
            self.provider.cancel_batch(batch_id).await.map_err(|e| {
                warn!(
                    campaign_id = %campaign.id,
                    batch_id,
                    error = %e,
                    "batch cancellation rejected"
                );
                OutreachError::ProviderBatchCancellationFailed {
                    message: e.to_string(),
                }
            })?;
        }

        let cancelled = self
            .transition(
                &campaign,
                &CampaignPatch::status(CampaignStatus::Paused),
                &WriteGuard::any(),
                CampaignStatus::Paused,
            )
            .await?;
        self.dialer.stop(&cancelled.id).await;
        info!(campaign_id = %cancelled.id, batch_id = ?cancelled.batch_id, "campaign cancelled");
        Ok(cancelled)
    }

    pub async fn get(&self, tenant_id: &str, campaign_id: &str) -> Result<Campaign, OutreachError> {
        self.store
            .get_campaign(tenant_id, campaign_id)
            .await?
            .ok_or_else(|| not_found(campaign_id))
    }

    /// Call rows of a tenant's campaign, in creation order.
    pub async fn get_calls(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Vec<CampaignCall>, OutreachError> {
        let campaign = self.get(tenant_id, campaign_id).await?;
        self.store.get_campaign_calls(&campaign.id).await
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<Campaign>, OutreachError> {
        self.store.list_campaigns(tenant_id).await
    }

    /// Delete a campaign and its call rows. Refused while running.
    pub async fn delete(&self, tenant_id: &str, campaign_id: &str) -> Result<(), OutreachError> {
        if self.store.delete_campaign(tenant_id, campaign_id).await? {
            self.dialer.stop(campaign_id).await;
            info!(campaign_id, "campaign deleted");
            Ok(())
        } else {
            Err(not_found(campaign_id))
        }
    }

    /// Reconcile one campaign with its provider batch right now.
    ///
    /// Unlike a poller tick, a provider failure is returned to the caller.
    pub async fn sync_batch_status(
        &self,
        campaign_id: &str,
        batch_id: &str,
    ) -> Result<Campaign, OutreachError> {
        let campaign = self
            .store
            .get_campaign_by_id(campaign_id)
            .await?
            .ok_or_else(|| not_found(campaign_id))?;
        if campaign.batch_id.as_deref() != Some(batch_id) {
            return Err(OutreachError::Validation(format!(
                "campaign {campaign_id} is not bound to batch {batch_id}"
            )));
        }
        self.sync(campaign).await
    }

    async fn sync(&self, campaign: Campaign) -> Result<Campaign, OutreachError> {
        let outcome = self.reconciler.reconcile_campaign(&campaign).await?;
        if outcome == ReconcileOutcome::Conflict {
            warn!(campaign_id = %campaign.id, "sync lost to a concurrent writer");
        }
        self.store
            .get_campaign_by_id(&campaign.id)
            .await?
            .ok_or_else(|| not_found(&campaign.id))
    }

    /// Whether the direct-dial loop of `campaign_id` is active in this process.
    pub async fn is_dialing(&self, campaign_id: &str) -> bool {
        self.dialer.is_active(campaign_id).await
    }

    /// Wait for the direct-dial loop of `campaign_id` to end.
    pub async fn wait_for_dialer(
        &self,
        campaign_id: &str,
    ) -> Result<Option<DialOutcome>, OutreachError> {
        self.dialer.wait(campaign_id).await
    }

    /// Stop every dial loop and wait for them to finish their current call.
    pub async fn shutdown(&self) {
        self.dialer.shutdown().await;
    }

    /// Apply a guarded status write and return the fresh row, mapping a lost
    /// race to the error the caller would have got had it arrived later.
    async fn transition(
        &self,
        campaign: &Campaign,
        patch: &CampaignPatch,
        guard: &WriteGuard,
        to: CampaignStatus,
    ) -> Result<Campaign, OutreachError> {
        let outcome = self
            .store
            .update_campaign_fields(&campaign.id, patch, guard)
            .await?;
        let fresh = self
            .store
            .get_campaign_by_id(&campaign.id)
            .await?
            .ok_or_else(|| not_found(&campaign.id))?;
        match outcome {
            UpdateOutcome::Applied => Ok(fresh),
            UpdateOutcome::Conflict
                if fresh.status == CampaignStatus::Running && to == CampaignStatus::Running =>
            {
                Err(OutreachError::AlreadyRunning {
                    campaign_id: fresh.id,
                })
            }
            UpdateOutcome::Conflict => Err(invalid(&fresh.id, fresh.status, to)),
        }
    }
}

fn not_found(campaign_id: &str) -> OutreachError {
    OutreachError::CampaignNotFound {
        campaign_id: campaign_id.to_string(),
    }
}

fn invalid(campaign_id: &str, from: CampaignStatus, to: CampaignStatus) -> OutreachError {
    OutreachError::InvalidTransition {
        campaign_id: campaign_id.to_string(),
        from,
        to,
    }
}
