// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential direct-dial loop for campaigns without a provider batch.
//!
//! Each running campaign gets one tokio task. The task dials pending call
//! rows one at a time with a fixed delay in between, and stops when the
//! campaign's cancellation token fires or its persisted status leaves
//! `running`. A call already handed to the provider always finishes and is
//! recorded before the loop checks either.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use outreach_core::types::{
    CallPatch, CallRequest, Campaign, CampaignCall, CampaignPatch, UpdateOutcome, WriteGuard,
};
use outreach_core::{
    CallStatus, CallingProvider, CampaignStatus, CampaignStore, Clock, OutreachError,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a dial loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOutcome {
    /// Every pending call was dialed; the campaign is now `completed`.
    Exhausted { dialed: u32 },
    /// Stopped by pause, cancel or shutdown before running out of calls.
    Stopped { dialed: u32 },
    /// A storage or state error ended the loop; the campaign was marked `failed`.
    Failed { dialed: u32, reason: String },
}

/// A finished task stays registered until it is replaced, waited on or
/// drained, so its outcome can still be collected.
struct DialTask {
    cancel: CancellationToken,
    handle: JoinHandle<DialOutcome>,
}

impl DialTask {
    /// Still dialing and not asked to stop. A stopping loop finishes its
    /// in-flight call on its own; a fresh loop may replace it meanwhile.
    fn is_live(&self) -> bool {
        !self.handle.is_finished() && !self.cancel.is_cancelled()
    }
}

/// Registry of running direct-dial tasks, keyed by campaign id.
pub struct DirectDialer {
    store: Arc<dyn CampaignStore>,
    provider: Arc<dyn CallingProvider>,
    clock: Arc<dyn Clock>,
    inter_call_delay: Duration,
    tasks: Mutex<HashMap<String, DialTask>>,
}

impl DirectDialer {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        provider: Arc<dyn CallingProvider>,
        clock: Arc<dyn Clock>,
        inter_call_delay: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            inter_call_delay,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start dialing `campaign` in the background.
    ///
    /// Returns `false` if a loop for this campaign is already active.
    pub async fn spawn(&self, campaign: &Campaign) -> bool {
        let mut tasks = self.tasks.lock().await;
        if tasks.get(&campaign.id).is_some_and(DialTask::is_live) {
            debug!(campaign_id = %campaign.id, "dial loop already active");
            return false;
        }

        let cancel = CancellationToken::new();
        let dial = DialLoop {
            store: self.store.clone(),
            provider: self.provider.clone(),
            clock: self.clock.clone(),
            inter_call_delay: self.inter_call_delay,
            campaign: campaign.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(dial.run());

        info!(campaign_id = %campaign.id, "dial loop started");
        tasks.insert(campaign.id.clone(), DialTask { cancel, handle });
        true
    }

    /// Ask the loop for `campaign_id` to stop after its current call.
    pub async fn stop(&self, campaign_id: &str) -> bool {
        match self.tasks.lock().await.get(campaign_id) {
            Some(task) => {
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_active(&self, campaign_id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(campaign_id)
            .is_some_and(DialTask::is_live)
    }

    /// Wait for the loop of `campaign_id` to end. `None` if none is registered.
    pub async fn wait(&self, campaign_id: &str) -> Result<Option<DialOutcome>, OutreachError> {
        let Some(task) = self.tasks.lock().await.remove(campaign_id) else {
            return Ok(None);
        };
        task.handle
            .await
            .map(Some)
            .map_err(|e| {
                OutreachError::Internal(format!("dial task for {campaign_id} panicked: {e}"))
            })
    }

    /// Stop every loop and wait for all of them.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, DialTask)> = self.tasks.lock().await.drain().collect();
        for (_, task) in &drained {
            task.cancel.cancel();
        }
        for (campaign_id, task) in drained {
            match task.handle.await {
                Ok(outcome) => debug!(%campaign_id, ?outcome, "dial loop drained"),
                Err(e) => warn!(%campaign_id, error = %e, "dial loop ended abnormally"),
            }
        }
    }
}

struct DialLoop {
    store: Arc<dyn CampaignStore>,
    provider: Arc<dyn CallingProvider>,
    clock: Arc<dyn Clock>,
    inter_call_delay: Duration,
    campaign: Campaign,
    cancel: CancellationToken,
}

impl DialLoop {
    async fn run(self) -> DialOutcome {
        let mut dialed = 0;
        match self.dial_all(&mut dialed).await {
            Ok(true) => self.finish(dialed).await,
            Ok(false) => {
                info!(campaign_id = %self.campaign.id, dialed, "dial loop stopped");
                DialOutcome::Stopped { dialed }
            }
            Err(e) => {
                error!(campaign_id = %self.campaign.id, error = %e, "dial loop failed");
                self.mark_failed().await;
                DialOutcome::Failed {
                    dialed,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Dial until the queue is empty (`Ok(true)`) or the loop is told to
    /// stop (`Ok(false)`).
    async fn dial_all(&self, dialed: &mut u32) -> Result<bool, OutreachError> {
        loop {
            if *dialed > 0 {
                tokio::select! {
                    _ = self.clock.sleep(self.inter_call_delay) => {}
                    _ = self.cancel.cancelled() => return Ok(false),
                }
            }
            if self.cancel.is_cancelled() || !self.still_running().await? {
                return Ok(false);
            }
            let Some(call) = self.store.next_pending_call(&self.campaign.id).await? else {
                return Ok(true);
            };

            if self.dial_one(&call).await? {
                *dialed += 1;
            }
        }
    }

    async fn still_running(&self) -> Result<bool, OutreachError> {
        let status = self
            .store
            .get_campaign_by_id(&self.campaign.id)
            .await?
            .map(|c| c.status);
        Ok(status == Some(CampaignStatus::Running))
    }

    /// Claim and dial one call. Returns `false` when another loop already
    /// owns the row.
    async fn dial_one(&self, call: &CampaignCall) -> Result<bool, OutreachError> {
        let claimed = self
            .store
            .update_call(
                &call.id,
                &CallPatch {
                    status: Some(CallStatus::Calling),
                    started_at: Some(self.clock.now()),
                    ..CallPatch::default()
                },
            )
            .await?;
        if !claimed {
            debug!(call_id = %call.id, "call already claimed, skipping");
            return Ok(false);
        }

        let request = CallRequest {
            campaign_id: self.campaign.id.clone(),
            campaign_name: self.campaign.name.clone(),
            agent_id: self.campaign.agent_id.clone(),
            lead_id: call.lead_id.clone(),
            lead_name: call.lead_name.clone(),
            phone_number: call.phone_number.clone(),
            custom_message: self.campaign.custom_message.clone(),
        };

        let (patch, successful) = match self.provider.place_call(&request).await {
            Ok(placed) => {
                debug!(
                    call_id = %call.id,
                    conversation_id = ?placed.conversation_id,
                    "call placed"
                );
                (
                    CallPatch {
                        status: Some(CallStatus::Completed),
                        conversation_id: placed.conversation_id,
                        completed_at: Some(self.clock.now()),
                        ..CallPatch::default()
                    },
                    true,
                )
            }
            Err(e) => {
                warn!(
                    call_id = %call.id,
                    lead_id = %call.lead_id,
                    error = %e,
                    "call placement failed"
                );
                (
                    CallPatch {
                        status: Some(CallStatus::Failed),
                        completed_at: Some(self.clock.now()),
                        error: Some(e.to_string()),
                        ..CallPatch::default()
                    },
                    false,
                )
            }
        };

        self.store.update_call(&call.id, &patch).await?;
        if self
            .store
            .increment_counters(&self.campaign.id, successful)
            .await?
            == UpdateOutcome::Conflict
        {
            debug!(campaign_id = %self.campaign.id, "counter increment refused");
        }
        Ok(true)
    }

    async fn finish(&self, dialed: u32) -> DialOutcome {
        let patch = CampaignPatch {
            status: Some(CampaignStatus::Completed),
            completed_at: Some(self.clock.now()),
            ..CampaignPatch::default()
        };
        let guard = WriteGuard::from_statuses(&[CampaignStatus::Running]);
        match self
            .store
            .update_campaign_fields(&self.campaign.id, &patch, &guard)
            .await
        {
            Ok(UpdateOutcome::Applied) => {
                info!(campaign_id = %self.campaign.id, dialed, "campaign completed");
                DialOutcome::Exhausted { dialed }
            }
            Ok(UpdateOutcome::Conflict) => {
                info!(
                    campaign_id = %self.campaign.id,
                    dialed,
                    "queue drained after campaign left running"
                );
                DialOutcome::Stopped { dialed }
            }
            Err(e) => {
                error!(
                    campaign_id = %self.campaign.id,
                    error = %e,
                    "failed to mark campaign completed"
                );
                DialOutcome::Failed {
                    dialed,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn mark_failed(&self) {
        let patch = CampaignPatch {
            status: Some(CampaignStatus::Failed),
            completed_at: Some(self.clock.now()),
            ..CampaignPatch::default()
        };
        let guard = WriteGuard::from_statuses(&[CampaignStatus::Running]);
        if let Err(e) = self
            .store
            .update_campaign_fields(&self.campaign.id, &patch, &guard)
            .await
        {
            error!(campaign_id = %self.campaign.id, error = %e, "failed to mark campaign failed");
        }
    }
}
