// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `outreach serve` command implementation.
//!
//! Opens the store, builds the provider client, starts the reconciliation
//! poller and waits for SIGINT/SIGTERM. On shutdown the poller and any dial
//! loops are stopped and the WAL is checkpointed.

use outreach_config::OutreachConfig;
use outreach_core::OutreachError;
use tracing::{info, warn};

use crate::app::App;
use crate::shutdown;

pub async fn run_serve(config: OutreachConfig) -> Result<(), OutreachError> {
    let app = App::open(&config).await?;
    let cancel = shutdown::install_signal_handler();

    if config.poller.enabled {
        app.poller.start(config.poller.interval()).await;
        info!(
            interval_secs = config.poller.interval_secs,
            inter_campaign_delay_ms = config.poller.inter_campaign_delay_ms,
            "reconciliation poller enabled"
        );
    } else {
        info!("reconciliation poller disabled");
    }

    info!(service = %config.service.name, "outreach serve ready");
    cancel.cancelled().await;

    app.poller.stop().await;
    app.service.shutdown().await;
    if let Err(e) = app.store.checkpoint().await {
        warn!(error = %e, "WAL checkpoint failed during shutdown");
    }

    info!("outreach serve shutdown complete");
    Ok(())
}
