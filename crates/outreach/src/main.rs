// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! outreach - multi-tenant outreach campaigns over a voice-AI batch calling
//! provider.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod commands;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use outreach_config::OutreachConfig;

use crate::commands::{CampaignCommand, LeadCommand, Output};

/// outreach - outreach campaigns over a voice-AI calling provider.
#[derive(Parser, Debug)]
#[command(name = "outreach", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reconciliation poller until SIGINT/SIGTERM.
    Serve,
    /// Run one reconciliation pass and print the report.
    PollNow,
    /// Manage campaigns.
    #[command(subcommand)]
    Campaign(CampaignCommand),
    /// Seed leads.
    #[command(subcommand)]
    Lead(LeadCommand),
    /// Print the effective configuration.
    Status,
}

fn load_config(path: Option<&PathBuf>) -> OutreachConfig {
    let loaded = match path {
        Some(path) => outreach_config::load_and_validate_path(path),
        None => outreach_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            outreach_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.service.log_level);

    let out = Output {
        json: cli.json,
        plain: cli.plain,
    };
    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::PollNow) => commands::run_poll_now(&config, out).await,
        Some(Commands::Campaign(command)) => commands::run_campaign(&config, command, out).await,
        Some(Commands::Lead(command)) => commands::run_lead(&config, command, out).await,
        Some(Commands::Status) => {
            status::run_status(&config, out.json, out.plain);
            Ok(())
        }
        None => {
            println!("outreach: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("outreach={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_campaign_create() {
        let cli = Cli::try_parse_from([
            "outreach",
            "campaign",
            "create",
            "--tenant",
            "t1",
            "--name",
            "Spring",
            "--agent-id",
            "agent-7",
            "--lead",
            "l1",
            "--lead",
            "l2",
            "--scheduled-at",
            "2026-11-02T09:00:00Z",
            "--direct-dial",
        ])
        .unwrap();
        let Some(Commands::Campaign(CampaignCommand::Create(args))) = cli.command else {
            panic!("expected campaign create");
        };
        assert_eq!(args.leads, vec!["l1", "l2"]);
        assert!(args.direct_dial);
        assert!(args.scheduled_at.is_some());
        assert_eq!(args.campaign_type, outreach_core::CampaignType::VoiceCall);
    }

    #[test]
    fn create_requires_a_lead() {
        let err = Cli::try_parse_from([
            "outreach", "campaign", "create", "--tenant", "t1", "--name", "n", "--agent-id", "a",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["outreach", "campaign", "list", "--tenant", "t1", "--json"])
                .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Some(Commands::Campaign(CampaignCommand::List { .. }))
        ));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = outreach_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.service.name, "outreach");
        assert_eq!(config.poller.interval_secs, 45);
    }
}
