// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folding a provider batch snapshot into local campaign and call rows.
//!
//! One reconciliation:
//! 1. fetches the batch status (errors go back to the caller untouched);
//! 2. maps the provider status onto the local state machine;
//! 3. merges status and counters into the campaign row with a version
//!    compare-and-swap, re-reading once on conflict;
//! 4. on a terminal status, walks the per-recipient list and updates the
//!    matching call rows by phone number.
//!
//! Nothing is written when the snapshot changes nothing, so repeated passes
//! over an unchanged provider response are no-ops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use outreach_core::types::{
    BatchStatusReport, CallCounters, CallPatch, Campaign, CampaignPatch, UpdateOutcome, WriteGuard,
};
use outreach_core::{
    CallStatus, CallingProvider, CampaignStatus, CampaignStore, Clock, OutreachError,
};
use tracing::{debug, info, warn};

/// Attempts at the campaign write before giving up on a conflicting row.
const MAX_WRITE_ATTEMPTS: usize = 2;

/// Result of reconciling one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The campaign row changed.
    Updated {
        status: CampaignStatus,
        calls_updated: usize,
    },
    /// The snapshot matched local state; nothing was written to the campaign.
    Unchanged { calls_updated: usize },
    /// Another writer kept winning; this pass left the row alone.
    Conflict,
    /// The campaign has no batch or disappeared mid-pass.
    Skipped,
}

impl ReconcileOutcome {
    pub fn calls_updated(&self) -> usize {
        match self {
            Self::Updated { calls_updated, .. } | Self::Unchanged { calls_updated } => {
                *calls_updated
            }
            Self::Conflict | Self::Skipped => 0,
        }
    }
}

/// Reconciles batch campaigns against the calling provider.
#[derive(Clone)]
pub struct BatchReconciler {
    store: Arc<dyn CampaignStore>,
    provider: Arc<dyn CallingProvider>,
    clock: Arc<dyn Clock>,
}

impl BatchReconciler {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        provider: Arc<dyn CallingProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
        }
    }

    /// Reconcile one campaign against its provider batch.
    pub async fn reconcile_campaign(
        &self,
        campaign: &Campaign,
    ) -> Result<ReconcileOutcome, OutreachError> {
        let Some(batch_id) = campaign.batch_id.as_deref() else {
            return Ok(ReconcileOutcome::Skipped);
        };

        let report = self.provider.get_batch_status(batch_id).await?;
        let observed_at = self.clock.now();
        let mapped = report.status.to_campaign_status();
        debug!(
            campaign_id = %campaign.id,
            batch_id,
            provider_status = ?report.status,
            mapped = %mapped,
            dispatched = report.total_calls_dispatched,
            "batch status fetched"
        );

        let mut current = campaign.clone();
        let mut wrote = false;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let patch = plan_patch(&current, &report, mapped, observed_at);
            if patch.is_empty() {
                break;
            }

            let guard = WriteGuard::at_version(current.version);
            match self
                .store
                .update_campaign_fields(&current.id, &patch, &guard)
                .await?
            {
                UpdateOutcome::Applied => {
                    wrote = true;
                    if let Some(status) = patch.status {
                        info!(
                            campaign_id = %current.id,
                            batch_id,
                            from = %current.status,
                            to = %status,
                            "campaign status reconciled"
                        );
                        current.status = status;
                    }
                    break;
                }
                UpdateOutcome::Conflict => {
                    let Some(fresh) = self.store.get_campaign_by_id(&current.id).await? else {
                        return Ok(ReconcileOutcome::Skipped);
                    };
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        warn!(
                            campaign_id = %current.id,
                            batch_id,
                            "campaign kept changing during reconciliation, retrying next tick"
                        );
                        return Ok(ReconcileOutcome::Conflict);
                    }
                    debug!(campaign_id = %current.id, "version conflict, re-reading campaign");
                    current = fresh;
                }
            }
        }

        let calls_updated = if mapped.is_terminal() && current.status == mapped {
            self.apply_recipients(&current.id, &report, observed_at)
                .await
        } else {
            0
        };

        Ok(if wrote {
            ReconcileOutcome::Updated {
                status: current.status,
                calls_updated,
            }
        } else {
            ReconcileOutcome::Unchanged { calls_updated }
        })
    }

    /// Update call rows from the recipient list. Per-row failures are logged
    /// and skipped; the next sync retries them.
    async fn apply_recipients(
        &self,
        campaign_id: &str,
        report: &BatchStatusReport,
        observed_at: DateTime<Utc>,
    ) -> usize {
        let mut updated = 0;
        for recipient in &report.recipients {
            let (Some(phone), Some(raw_status)) =
                (recipient.phone_number.as_deref(), recipient.status.as_deref())
            else {
                continue;
            };
            let status = CallStatus::from_provider(raw_status);
            let patch = CallPatch {
                status: Some(status),
                conversation_id: recipient.conversation_id.clone(),
                completed_at: status.is_terminal().then_some(observed_at),
                ..CallPatch::default()
            };
            match self
                .store
                .update_call_by_campaign_and_phone(campaign_id, phone, &patch)
                .await
            {
                Ok(n) => updated += n,
                Err(e) => warn!(
                    campaign_id,
                    error = %e,
                    "failed to update call row from recipient"
                ),
            }
        }
        updated
    }
}

/// Work out the smallest campaign patch that brings `current` in line with
/// the snapshot. An empty patch means nothing to write.
fn plan_patch(
    current: &Campaign,
    report: &BatchStatusReport,
    mapped: CampaignStatus,
    observed_at: DateTime<Utc>,
) -> CampaignPatch {
    let mut patch = CampaignPatch::default();
    if current.status.is_terminal() {
        return patch;
    }

    if mapped != current.status && current.status.can_transition_to(mapped) {
        patch.status = Some(mapped);
        if mapped == CampaignStatus::Running && current.started_at.is_none() {
            patch.started_at = Some(observed_at);
        }
        if mapped.is_terminal() {
            patch.completed_at = Some(observed_at);
        }
    }

    let reported = clamp(report.counters(), current.total_leads);
    let local = current.counters();
    let merged = CallCounters {
        called: local.called.max(reported.called),
        successful: local.successful.max(reported.successful),
        failed: local.failed.max(reported.failed),
    };
    if merged != local {
        patch.counters = Some(reported);
    }

    if !patch.is_empty() {
        patch.observed_at = Some(observed_at);
    }
    patch
}

fn clamp(counters: CallCounters, total: u32) -> CallCounters {
    CallCounters {
        called: counters.called.min(total),
        successful: counters.successful.min(total),
        failed: counters.failed.min(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::types::{CampaignType, ProviderBatchStatus, RecipientStatus};

    fn campaign(status: CampaignStatus) -> Campaign {
        let ts = DateTime::from_timestamp(1_780_000_000, 0).unwrap();
        Campaign {
            id: "c1".into(),
            tenant_id: "t1".into(),
            name: "n".into(),
            agent_id: "a".into(),
            campaign_type: CampaignType::VoiceCall,
            custom_message: None,
            scheduled_at: None,
            started_at: Some(ts),
            completed_at: None,
            total_leads: 2,
            called: 0,
            successful: 0,
            failed: 0,
            lead_ids: vec!["l1".into(), "l2".into()],
            batch_id: Some("b1".into()),
            status,
            version: 1,
            last_synced_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn report(status: &str, dispatched: u32, subs: &[&str]) -> BatchStatusReport {
        BatchStatusReport {
            status: ProviderBatchStatus::parse(status),
            total_calls_dispatched: dispatched,
            total_calls_scheduled: 2,
            recipients: subs
                .iter()
                .enumerate()
                .map(|(i, s)| RecipientStatus {
                    phone_number: Some(format!("+{i}")),
                    status: Some(s.to_string()),
                    conversation_id: None,
                })
                .collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_780_000_100, 0).unwrap()
    }

    #[test]
    fn unchanged_snapshot_plans_nothing() {
        let c = campaign(CampaignStatus::Running);
        let r = report("in_progress", 0, &["pending", "pending"]);
        assert!(plan_patch(&c, &r, CampaignStatus::Running, now()).is_empty());
    }

    #[test]
    fn completion_plans_status_counters_and_timestamp() {
        let c = campaign(CampaignStatus::Running);
        let r = report("completed", 2, &["completed", "failed"]);
        let patch = plan_patch(&c, &r, CampaignStatus::Completed, now());
        assert_eq!(patch.status, Some(CampaignStatus::Completed));
        assert_eq!(patch.completed_at, Some(now()));
        assert_eq!(
            patch.counters,
            Some(CallCounters {
                called: 2,
                successful: 1,
                failed: 1
            })
        );
        assert_eq!(patch.observed_at, Some(now()));
    }

    #[test]
    fn terminal_campaign_is_never_replanned() {
        let c = campaign(CampaignStatus::Completed);
        let r = report("in_progress", 2, &["completed", "completed"]);
        assert!(plan_patch(&c, &r, CampaignStatus::Running, now()).is_empty());
    }

    #[test]
    fn lower_counts_do_not_plan_a_write() {
        let mut c = campaign(CampaignStatus::Running);
        c.called = 2;
        c.successful = 1;
        let r = report("in_progress", 1, &["completed"]);
        assert!(plan_patch(&c, &r, CampaignStatus::Running, now()).is_empty());
    }

    #[test]
    fn paused_campaign_keeps_status_but_takes_counters() {
        let c = campaign(CampaignStatus::Paused);
        let r = report("completed", 2, &["completed", "completed"]);
        let patch = plan_patch(&c, &r, CampaignStatus::Completed, now());
        assert_eq!(patch.status, None);
        assert_eq!(patch.counters.map(|c| c.successful), Some(2));
    }

    #[test]
    fn scheduled_campaign_gets_start_time_when_running() {
        let mut c = campaign(CampaignStatus::Scheduled);
        c.started_at = None;
        let r = report("in_progress", 0, &[]);
        let patch = plan_patch(&c, &r, CampaignStatus::Running, now());
        assert_eq!(patch.status, Some(CampaignStatus::Running));
        assert_eq!(patch.started_at, Some(now()));
    }
}
