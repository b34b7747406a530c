// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end campaign scenarios.
//!
//! Each test builds an isolated TestHarness with a temp SQLite store and a
//! scripted provider. Tests are independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use outreach_campaign::{DialOutcome, ReconcileOutcome};
use outreach_core::types::{CallStatus, CampaignPatch, DispatchMode, WriteGuard};
use outreach_core::{CampaignStatus, CampaignStore, OutreachError, SystemClock};
use outreach_poller::BatchStatusPoller;
use outreach_test_utils::harness::TENANT;
use outreach_test_utils::{TestHarness, batch_report};

// ---- Scenario A: unresolvable leads are dropped at creation ----

#[tokio::test]
async fn scenario_a_two_of_three_leads_resolve() {
    let h = TestHarness::new().await.unwrap();
    let mut leads = h.seed_leads(&["+15550001"]).await.unwrap();
    leads.push(
        h.store
            .insert_lead(TENANT, "Second", Some("+15550002"), None)
            .await
            .unwrap(),
    );
    leads.push(
        h.store
            .insert_lead(TENANT, "No Phone", None, Some("np@example.com"))
            .await
            .unwrap(),
    );

    let campaign = h
        .service
        .create(h.create_request(leads, DispatchMode::Batch))
        .await
        .unwrap();
    assert_eq!(campaign.total_leads, 2);

    let calls = h.store.get_campaign_calls(&campaign.id).await.unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.status == CallStatus::Pending));
    assert_eq!(h.provider.created_batches().await[0].recipients.len(), 2);
}

// ---- Scenario B: a completed batch completes campaign and calls ----

#[tokio::test]
async fn scenario_b_completed_batch() {
    let h = TestHarness::new().await.unwrap();
    let campaign = h.batch_campaign(&["+15550001", "+15550002"]).await.unwrap();
    h.provider
        .set_status(
            "batch-1",
            batch_report(
                "completed",
                2,
                &[("+15550001", "completed"), ("+15550002", "completed")],
            ),
        )
        .await;

    h.poller.trigger_once().await.unwrap();

    let done = h.campaign(&campaign.id).await.unwrap();
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.successful, 2);
    assert_eq!(done.failed, 0);
    let calls = h.store.get_campaign_calls(&campaign.id).await.unwrap();
    assert!(calls.iter().all(|c| c.status == CallStatus::Completed));
    assert!(calls.iter().all(|c| c.completed_at.is_some()));
}

// ---- Scenario C: unknown provider status fails open ----

#[tokio::test]
async fn scenario_c_unknown_status_stays_running() {
    let h = TestHarness::new().await.unwrap();
    let campaign = h.batch_campaign(&["+15550001"]).await.unwrap();
    h.provider
        .set_status(
            "batch-1",
            batch_report("queued_external", 0, &[("+15550001", "queued_external")]),
        )
        .await;

    h.poller.trigger_once().await.unwrap();

    let after = h.campaign(&campaign.id).await.unwrap();
    assert_eq!(after.status, CampaignStatus::Running);
    assert!(after.completed_at.is_none());
    let calls = h.store.get_campaign_calls(&campaign.id).await.unwrap();
    assert_eq!(calls[0].status, CallStatus::Pending);
}

// ---- Scenario D: one failed call does not fail the campaign ----

#[tokio::test]
async fn scenario_d_direct_dial_survives_a_failed_call() {
    let h = TestHarness::new().await.unwrap();
    h.provider.fail_calls_to("+15550002").await;
    let campaign = h
        .direct_dial_campaign(&["+15550001", "+15550002", "+15550003"])
        .await
        .unwrap();

    h.service.start(TENANT, &campaign.id).await.unwrap();
    let outcome = h.service.wait_for_dialer(&campaign.id).await.unwrap();
    assert_eq!(outcome, Some(DialOutcome::Exhausted { dialed: 3 }));

    let calls = h.store.get_campaign_calls(&campaign.id).await.unwrap();
    assert_eq!(calls[0].status, CallStatus::Completed);
    assert_eq!(calls[1].status, CallStatus::Failed);
    assert!(calls[1].error.is_some());
    assert_eq!(calls[2].status, CallStatus::Completed);
    assert_eq!(h.provider.placed_calls().await.len(), 3);

    let done = h.campaign(&campaign.id).await.unwrap();
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!((done.called, done.successful, done.failed), (3, 2, 1));
}

// ---- Scenario E: concurrent passes never lose an update ----

#[tokio::test]
async fn scenario_e_concurrent_manual_and_timer_passes() {
    let h = TestHarness::builder()
        .with_inter_campaign_delay(Duration::ZERO)
        .build()
        .await
        .unwrap();
    let phones = ["+15550001", "+15550002", "+15550003", "+15550004"];
    let campaign = h.batch_campaign(&phones).await.unwrap();
    h.provider
        .set_status(
            "batch-1",
            batch_report(
                "in_progress",
                3,
                &[
                    ("+15550001", "completed"),
                    ("+15550002", "completed"),
                    ("+15550003", "failed"),
                    ("+15550004", "pending"),
                ],
            ),
        )
        .await;

    let timer = BatchStatusPoller::new(
        h.store.clone(),
        h.service.reconciler().clone(),
        Arc::new(SystemClock),
        Duration::ZERO,
    );
    assert!(timer.start(Duration::from_millis(5)).await);
    let (a, b, c) = tokio::join!(
        h.poller.trigger_once(),
        h.poller.trigger_once(),
        h.poller.poll_now()
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    timer.stop().await;

    let after = h.campaign(&campaign.id).await.unwrap();
    assert_eq!(after.status, CampaignStatus::Running);
    assert_eq!((after.called, after.successful, after.failed), (3, 2, 1));
}

#[tokio::test]
async fn scenario_e_out_of_order_snapshots_keep_the_higher_counts() {
    let h = TestHarness::new().await.unwrap();
    let campaign = h.batch_campaign(&["+15550001", "+15550002"]).await.unwrap();
    h.provider
        .script_status(
            "batch-1",
            batch_report("in_progress", 1, &[("+15550001", "completed")]),
        )
        .await;
    h.provider
        .script_status(
            "batch-1",
            batch_report(
                "in_progress",
                2,
                &[("+15550001", "completed"), ("+15550002", "completed")],
            ),
        )
        .await;

    let (first, second) = tokio::join!(h.poller.trigger_once(), h.poller.trigger_once());
    first.unwrap();
    second.unwrap();

    let after = h.campaign(&campaign.id).await.unwrap();
    assert_eq!(after.called, 2);
    assert_eq!(after.successful, 2);

    // A stale lower snapshot arriving afterwards changes nothing.
    h.provider
        .set_status(
            "batch-1",
            batch_report("in_progress", 1, &[("+15550001", "completed")]),
        )
        .await;
    let report = h.poller.trigger_once().await.unwrap();
    assert_eq!(report.unchanged, 1);
    assert_eq!(h.campaign(&campaign.id).await.unwrap(), after);
}

#[tokio::test]
async fn stale_snapshot_is_re_read_after_a_version_conflict() {
    let h = TestHarness::new().await.unwrap();
    let stale = h.batch_campaign(&["+15550001", "+15550002"]).await.unwrap();

    // Another writer bumps the version after the snapshot was taken.
    h.store
        .update_campaign_fields(
            &stale.id,
            &CampaignPatch {
                batch_id: Some("batch-1".into()),
                ..CampaignPatch::default()
            },
            &WriteGuard::any(),
        )
        .await
        .unwrap();

    h.provider
        .set_status(
            "batch-1",
            batch_report(
                "completed",
                2,
                &[("+15550001", "completed"), ("+15550002", "failed")],
            ),
        )
        .await;
    let outcome = h
        .service
        .reconciler()
        .reconcile_campaign(&stale)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Updated {
            status: CampaignStatus::Completed,
            calls_updated: 2
        }
    );
    let after = h.campaign(&stale.id).await.unwrap();
    assert_eq!(after.version, stale.version + 2);
}

// ---- State-machine safety ----

#[tokio::test]
async fn terminal_campaign_is_never_revived() {
    let h = TestHarness::new().await.unwrap();
    let campaign = h.batch_campaign(&["+15550001"]).await.unwrap();
    h.provider
        .set_status("batch-1", batch_report("failed", 1, &[("+15550001", "failed")]))
        .await;
    h.poller.trigger_once().await.unwrap();
    let failed = h.campaign(&campaign.id).await.unwrap();
    assert_eq!(failed.status, CampaignStatus::Failed);

    // A stale in-progress observation, then every user transition.
    h.provider
        .set_status("batch-1", batch_report("in_progress", 0, &[]))
        .await;
    let outcome = h
        .service
        .reconciler()
        .reconcile_campaign(&campaign)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Unchanged { .. }));
    h.service
        .sync_batch_status(&campaign.id, "batch-1")
        .await
        .unwrap();
    for result in [
        h.service.start(TENANT, &campaign.id).await.map(|c| c.status),
        h.service.resume(TENANT, &campaign.id).await.map(|c| c.status),
    ] {
        assert!(matches!(
            result,
            Ok(CampaignStatus::Failed) | Err(OutreachError::InvalidTransition { .. })
        ));
    }
    assert_eq!(
        h.campaign(&campaign.id).await.unwrap().status,
        CampaignStatus::Failed
    );
}

// ---- Atomicity of creation ----

#[tokio::test]
async fn rejected_batch_leaves_no_rows() {
    let h = TestHarness::new().await.unwrap();
    let leads = h.seed_leads(&["+15550001", "+15550002"]).await.unwrap();
    h.provider.fail_batch_creation("invalid agent").await;

    let err = h
        .service
        .create(h.create_request(leads, DispatchMode::Batch))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OutreachError::ProviderBatchCreationFailed { .. }
    ));
    assert!(h.service.list(TENANT).await.unwrap().is_empty());
}
