// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `outreach campaign …`, `outreach lead …` and `outreach poll-now`.

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use outreach_campaign::{CampaignService, CreateCampaign, DialOutcome};
use outreach_config::OutreachConfig;
use outreach_core::types::{CampaignCall, CampaignType, DispatchMode};
use outreach_core::{Campaign, CampaignStatus, CampaignStore, OutreachError, SystemClock};
use serde::Serialize;
use tracing::info;

use crate::app::{App, open_store};
use crate::shutdown;

/// Campaign management subcommands.
#[derive(Subcommand, Debug)]
pub enum CampaignCommand {
    /// Create a campaign from existing lead ids.
    Create(CreateArgs),
    /// Start a campaign (batch campaigns only sync).
    Start {
        #[command(flatten)]
        target: Target,
        /// Return immediately instead of waiting for a direct-dial loop.
        #[arg(long)]
        detach: bool,
    },
    /// Pause a running campaign.
    Pause(Target),
    /// Resume a paused campaign.
    Resume {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        detach: bool,
    },
    /// Cancel the provider batch and pause the campaign.
    Cancel(Target),
    /// Show one campaign.
    Show(Target),
    /// List the call rows of a campaign.
    Calls {
        campaign_id: String,
    },
    /// Reconcile one campaign with its provider batch now.
    Sync {
        campaign_id: String,
    },
    /// List a tenant's campaigns.
    List {
        #[arg(long)]
        tenant: String,
    },
    /// Delete a campaign that is not running.
    Delete(Target),
}

/// A tenant-scoped campaign reference.
#[derive(Args, Debug)]
pub struct Target {
    #[arg(long)]
    pub tenant: String,
    pub campaign_id: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub tenant: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub agent_id: String,
    /// Lead id to include; repeat for several leads.
    #[arg(long = "lead", required = true)]
    pub leads: Vec<String>,
    #[arg(long = "type", default_value = "voice_call")]
    pub campaign_type: CampaignType,
    #[arg(long)]
    pub message: Option<String>,
    /// RFC 3339 start time, e.g. 2026-11-02T09:00:00Z.
    #[arg(long)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Dial leads one by one instead of submitting a provider batch.
    #[arg(long)]
    pub direct_dial: bool,
}

/// Lead seeding subcommands.
#[derive(Subcommand, Debug)]
pub enum LeadCommand {
    /// Insert one lead.
    Add {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },
}

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub plain: bool,
}

impl Output {
    fn use_color(self) -> bool {
        !self.plain && std::io::stdout().is_terminal()
    }

    fn emit<T: Serialize>(self, value: &T, human: impl FnOnce(bool)) {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
            );
        } else {
            human(self.use_color());
        }
    }
}

pub async fn run_campaign(
    config: &OutreachConfig,
    command: CampaignCommand,
    out: Output,
) -> Result<(), OutreachError> {
    match command {
        CampaignCommand::Show(t) => {
            let store = open_store(config, Arc::new(SystemClock)).await?;
            let campaign = store
                .get_campaign(&t.tenant, &t.campaign_id)
                .await?
                .ok_or(OutreachError::CampaignNotFound {
                    campaign_id: t.campaign_id,
                })?;
            out.emit(&campaign, |color| print_campaign(&campaign, color));
        }
        CampaignCommand::List { tenant } => {
            let store = open_store(config, Arc::new(SystemClock)).await?;
            let campaigns = store.list_campaigns(&tenant).await?;
            out.emit(&campaigns, |color| print_campaign_list(&campaigns, color));
        }
        CampaignCommand::Calls { campaign_id } => {
            let store = open_store(config, Arc::new(SystemClock)).await?;
            if store.get_campaign_by_id(&campaign_id).await?.is_none() {
                return Err(OutreachError::CampaignNotFound { campaign_id });
            }
            let calls = store.get_campaign_calls(&campaign_id).await?;
            out.emit(&calls, |_| print_calls(&calls));
        }
        other => run_with_provider(config, other, out).await?,
    }
    Ok(())
}

async fn run_with_provider(
    config: &OutreachConfig,
    command: CampaignCommand,
    out: Output,
) -> Result<(), OutreachError> {
    let app = App::open(config).await?;
    let service = app.service.clone();

    let campaign = match command {
        CampaignCommand::Create(args) => service.create(args.into_request()).await?,
        CampaignCommand::Start { target, detach } => {
            let started = service.start(&target.tenant, &target.campaign_id).await?;
            if !detach {
                follow_dialer(&service, &started).await?;
            }
            service.get(&target.tenant, &target.campaign_id).await?
        }
        CampaignCommand::Resume { target, detach } => {
            let resumed = service.resume(&target.tenant, &target.campaign_id).await?;
            if !detach {
                follow_dialer(&service, &resumed).await?;
            }
            service.get(&target.tenant, &target.campaign_id).await?
        }
        CampaignCommand::Pause(t) => service.pause(&t.tenant, &t.campaign_id).await?,
        CampaignCommand::Cancel(t) => service.cancel(&t.tenant, &t.campaign_id).await?,
        CampaignCommand::Sync { campaign_id } => {
            let campaign = app
                .store
                .get_campaign_by_id(&campaign_id)
                .await?
                .ok_or_else(|| OutreachError::CampaignNotFound {
                    campaign_id: campaign_id.clone(),
                })?;
            let batch_id = campaign.batch_id.ok_or_else(|| {
                OutreachError::Validation(format!(
                    "campaign {campaign_id} is direct-dial and has no batch to sync"
                ))
            })?;
            service.sync_batch_status(&campaign_id, &batch_id).await?
        }
        CampaignCommand::Delete(t) => {
            service.delete(&t.tenant, &t.campaign_id).await?;
            if !out.json {
                println!("deleted {}", t.campaign_id);
            }
            return Ok(());
        }
        CampaignCommand::Show(_) | CampaignCommand::List { .. } | CampaignCommand::Calls { .. } => {
            return Err(OutreachError::Internal(
                "read-only command routed to provider path".into(),
            ));
        }
    };

    out.emit(&campaign, |color| print_campaign(&campaign, color));
    Ok(())
}

/// Keep the process alive while a direct-dial loop runs; Ctrl+C stops it
/// after the in-flight call.
async fn follow_dialer(
    service: &CampaignService,
    campaign: &Campaign,
) -> Result<(), OutreachError> {
    if !campaign.is_direct_dial() || !service.is_dialing(&campaign.id).await {
        return Ok(());
    }
    info!(
        campaign_id = %campaign.id,
        total_leads = campaign.total_leads,
        "dialing, Ctrl+C to stop"
    );
    let cancel = shutdown::install_signal_handler();
    tokio::select! {
        outcome = service.wait_for_dialer(&campaign.id) => {
            match outcome? {
                Some(DialOutcome::Failed { reason, .. }) => {
                    return Err(OutreachError::Internal(format!("dial loop failed: {reason}")));
                }
                Some(outcome) => info!(campaign_id = %campaign.id, ?outcome, "dial loop finished"),
                None => {}
            }
        }
        _ = cancel.cancelled() => {
            service.shutdown().await;
        }
    }
    Ok(())
}

impl CreateArgs {
    fn into_request(self) -> CreateCampaign {
        CreateCampaign {
            tenant_id: self.tenant,
            name: self.name,
            agent_id: self.agent_id,
            lead_ids: self.leads,
            campaign_type: self.campaign_type,
            custom_message: self.message,
            scheduled_at: self.scheduled_at,
            mode: if self.direct_dial {
                DispatchMode::DirectDial
            } else {
                DispatchMode::Batch
            },
        }
    }
}

pub async fn run_lead(
    config: &OutreachConfig,
    command: LeadCommand,
    out: Output,
) -> Result<(), OutreachError> {
    match command {
        LeadCommand::Add {
            tenant,
            name,
            phone,
            email,
        } => {
            let store = open_store(config, Arc::new(SystemClock)).await?;
            let id = store
                .insert_lead(&tenant, &name, Some(&phone), email.as_deref())
                .await?;
            #[derive(Serialize)]
            struct Added<'a> {
                id: &'a str,
                tenant_id: &'a str,
            }
            out.emit(
                &Added {
                    id: &id,
                    tenant_id: &tenant,
                },
                |_| println!("{id}"),
            );
        }
    }
    Ok(())
}

pub async fn run_poll_now(config: &OutreachConfig, out: Output) -> Result<(), OutreachError> {
    let app = App::open(config).await?;
    let report = app.poller.poll_now().await?;
    out.emit(&report, |_| {
        println!(
            "discovered {}  reconciled {}  unchanged {}  skipped {}  calls updated {}",
            report.discovered,
            report.reconciled,
            report.unchanged,
            report.skipped,
            report.calls_updated
        );
    });
    Ok(())
}

fn status_label(status: CampaignStatus, use_color: bool) -> String {
    if !use_color {
        return status.to_string();
    }
    use colored::Colorize;
    let label = status.to_string();
    match status {
        CampaignStatus::Running => label.green().to_string(),
        CampaignStatus::Scheduled | CampaignStatus::Paused => label.yellow().to_string(),
        CampaignStatus::Failed => label.red().to_string(),
        CampaignStatus::Completed => label.blue().to_string(),
        CampaignStatus::Draft => label,
    }
}

fn print_campaign(campaign: &Campaign, use_color: bool) {
    println!();
    println!("  {} ({})", campaign.name, campaign.id);
    println!("  {}", "-".repeat(35));
    println!("    Status:   {}", status_label(campaign.status, use_color));
    println!("    Tenant:   {}", campaign.tenant_id);
    println!(
        "    Mode:     {}",
        campaign
            .batch_id
            .as_deref()
            .map(|b| format!("batch {b}"))
            .unwrap_or_else(|| "direct dial".to_string())
    );
    println!("    Progress: {}", progress(campaign));
    if let Some(at) = campaign.scheduled_at {
        println!("    Scheduled: {}", at.to_rfc3339());
    }
    if let Some(at) = campaign.started_at {
        println!("    Started:  {}", at.to_rfc3339());
    }
    if let Some(at) = campaign.completed_at {
        println!("    Finished: {}", at.to_rfc3339());
    }
    println!();
}

fn progress(campaign: &Campaign) -> String {
    format!(
        "{}/{} called, {} ok, {} failed",
        campaign.called, campaign.total_leads, campaign.successful, campaign.failed
    )
}

fn print_campaign_list(campaigns: &[Campaign], use_color: bool) {
    if campaigns.is_empty() {
        println!("no campaigns");
        return;
    }
    for c in campaigns {
        println!(
            "{}  {:<10}  {}  {}",
            c.id,
            status_label(c.status, use_color),
            progress(c),
            c.name
        );
    }
}

fn print_calls(calls: &[CampaignCall]) {
    for call in calls {
        println!(
            "{}  {:<16}  {:<9}  {}",
            call.lead_id,
            call.phone_number,
            call.status,
            call.conversation_id
                .as_deref()
                .or(call.error.as_deref())
                .unwrap_or("")
        );
    }
}
