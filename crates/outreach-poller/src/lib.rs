// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation poller for provider-batched campaigns.
//!
//! [`BatchStatusPoller`] is an explicit scheduler object. A timer loop started
//! with [`start`](BatchStatusPoller::start) runs one pass per interval until
//! [`stop`](BatchStatusPoller::stop); [`trigger_once`](BatchStatusPoller::trigger_once)
//! runs the same pass on demand.
//!
//! Timer and manual passes may overlap. Neither takes a lock: every write a
//! pass makes is a guarded store write, so overlapping passes merge.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use outreach_campaign::{BatchReconciler, ReconcileOutcome};
use outreach_config::model::PollerConfig;
use outreach_core::{CampaignStore, Clock, OutreachError};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// In-flight batch campaigns found.
    pub discovered: usize,
    /// Campaigns whose row changed.
    pub reconciled: usize,
    /// Campaigns already in agreement with the provider.
    pub unchanged: usize,
    /// Campaigns left for the next pass (fetch failure or lost race).
    pub skipped: usize,
    /// Call rows updated from recipient lists.
    pub calls_updated: usize,
}

/// Snapshot of the scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerStatus {
    pub running: bool,
    pub interval: Option<Duration>,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub ticks_completed: u64,
}

#[derive(Default)]
struct TickStats {
    interval: Option<Duration>,
    last_tick_at: Option<DateTime<Utc>>,
    ticks_completed: u64,
}

struct PollerInner {
    store: Arc<dyn CampaignStore>,
    reconciler: BatchReconciler,
    clock: Arc<dyn Clock>,
    inter_campaign_delay: Duration,
    stats: Mutex<TickStats>,
}

struct TimerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic reconciliation of in-flight batch campaigns.
pub struct BatchStatusPoller {
    inner: Arc<PollerInner>,
    task: Mutex<Option<TimerTask>>,
}

impl BatchStatusPoller {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        reconciler: BatchReconciler,
        clock: Arc<dyn Clock>,
        inter_campaign_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                store,
                reconciler,
                clock,
                inter_campaign_delay,
                stats: Mutex::new(TickStats::default()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn from_config(
        store: Arc<dyn CampaignStore>,
        reconciler: BatchReconciler,
        clock: Arc<dyn Clock>,
        config: &PollerConfig,
    ) -> Self {
        Self::new(store, reconciler, clock, config.inter_campaign_delay())
    }

    /// Spawn the timer loop. The first pass runs one `interval` from now.
    ///
    /// Returns `false` without doing anything if the loop is already running.
    pub async fn start(&self, interval: Duration) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("poller already running");
            return false;
        }

        self.inner.stats.lock().await.interval = Some(interval);
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let inner = self.inner.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.clock.sleep(interval) => {
                        tokio::select! {
                            result = inner.run_pass() => {
                                if let Err(e) = result {
                                    warn!(error = %e, "reconciliation pass failed (non-fatal)");
                                }
                            }
                            _ = loop_cancel.cancelled() => {
                                info!("poller shutting down mid-pass");
                                break;
                            }
                        }
                    }
                    _ = loop_cancel.cancelled() => {
                        info!("poller shutting down");
                        break;
                    }
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "batch status poller started");
        *task = Some(TimerTask { cancel, handle });
        true
    }

    /// Cancel the timer loop and wait for it to exit. Returns whether a loop
    /// was running.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.task.lock().await.take() else {
            return false;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "poller task ended abnormally");
        }
        true
    }

    /// Run one discovery and reconciliation pass now.
    pub async fn trigger_once(&self) -> Result<PollReport, OutreachError> {
        self.inner.run_pass().await
    }

    /// Operator-facing name for [`trigger_once`](Self::trigger_once).
    pub async fn poll_now(&self) -> Result<PollReport, OutreachError> {
        self.trigger_once().await
    }

    pub async fn status(&self) -> PollerStatus {
        let running = self
            .task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished());
        let stats = self.inner.stats.lock().await;
        PollerStatus {
            running,
            interval: stats.interval,
            last_tick_at: stats.last_tick_at,
            ticks_completed: stats.ticks_completed,
        }
    }
}

impl PollerInner {
    async fn run_pass(&self) -> Result<PollReport, OutreachError> {
        let campaigns = self.store.find_active_campaigns_with_batch().await?;
        let mut report = PollReport {
            discovered: campaigns.len(),
            ..PollReport::default()
        };

        for (i, campaign) in campaigns.iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.inter_campaign_delay).await;
            }
            match self.reconciler.reconcile_campaign(campaign).await {
                Ok(outcome) => {
                    report.calls_updated += outcome.calls_updated();
                    match outcome {
                        ReconcileOutcome::Updated { .. } => report.reconciled += 1,
                        ReconcileOutcome::Unchanged { .. } => report.unchanged += 1,
                        ReconcileOutcome::Conflict | ReconcileOutcome::Skipped => {
                            report.skipped += 1
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        campaign_id = %campaign.id,
                        batch_id = ?campaign.batch_id,
                        error = %e,
                        "batch reconciliation failed, retrying next tick"
                    );
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(
                        campaign_id = %campaign.id,
                        batch_id = ?campaign.batch_id,
                        error = %e,
                        "batch reconciliation failed"
                    );
                    report.skipped += 1;
                }
            }
        }

        let mut stats = self.stats.lock().await;
        stats.last_tick_at = Some(self.clock.now());
        stats.ticks_completed += 1;
        drop(stats);

        info!(
            discovered = report.discovered,
            reconciled = report.reconciled,
            unchanged = report.unchanged,
            skipped = report.skipped,
            calls_updated = report.calls_updated,
            "reconciliation pass complete"
        );
        Ok(report)
    }
}
