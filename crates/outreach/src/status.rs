// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `outreach status` command implementation.
//!
//! Prints the effective configuration: store location, provider endpoint,
//! and poller and dialer pacing.

use std::io::IsTerminal;
use std::path::Path;

use outreach_config::OutreachConfig;
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub log_level: String,
    pub database_path: String,
    pub database_exists: bool,
    pub provider_base_url: String,
    pub api_key_configured: bool,
    pub poller_enabled: bool,
    pub poller_interval_secs: u64,
    pub inter_campaign_delay_ms: u64,
    pub inter_call_delay_ms: u64,
}

impl StatusResponse {
    pub fn from_config(config: &OutreachConfig) -> Self {
        Self {
            service: config.service.name.clone(),
            log_level: config.service.log_level.clone(),
            database_path: config.storage.database_path.clone(),
            database_exists: Path::new(&config.storage.database_path).exists(),
            provider_base_url: config.voice.base_url.clone(),
            api_key_configured: config.voice.api_key.is_some()
                || std::env::var_os("ELEVENLABS_API_KEY").is_some(),
            poller_enabled: config.poller.enabled,
            poller_interval_secs: config.poller.interval_secs,
            inter_campaign_delay_ms: config.poller.inter_campaign_delay_ms,
            inter_call_delay_ms: config.dialer.inter_call_delay_ms,
        }
    }
}

/// Run the `outreach status` command.
pub fn run_status(config: &OutreachConfig, json: bool, plain: bool) {
    let status = StatusResponse::from_config(config);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    println!();
    println!("  {} status", status.service);
    println!("  {}", "-".repeat(35));
    println!(
        "    Store:     {} ({})",
        status.database_path,
        mark(status.database_exists, "present", "not created yet", use_color)
    );
    println!(
        "    Provider:  {} ({})",
        status.provider_base_url,
        mark(status.api_key_configured, "api key set", "no api key", use_color)
    );
    println!(
        "    Poller:    {} every {}s, {}ms between campaigns",
        mark(status.poller_enabled, "enabled", "disabled", use_color),
        status.poller_interval_secs,
        status.inter_campaign_delay_ms
    );
    println!("    Dialer:    {}ms between calls", status.inter_call_delay_ms);
    println!("    Log level: {}", status.log_level);
    println!();
}

fn mark(ok: bool, yes: &str, no: &str, use_color: bool) -> String {
    match (ok, use_color) {
        (true, true) => {
            use colored::Colorize;
            yes.green().to_string()
        }
        (false, true) => {
            use colored::Colorize;
            no.yellow().to_string()
        }
        (true, false) => format!("[OK] {yes}"),
        (false, false) => format!("[--] {no}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_config() {
        let mut config = OutreachConfig::default();
        config.storage.database_path = "/nonexistent/outreach.db".into();
        config.poller.interval_secs = 30;

        let status = StatusResponse::from_config(&config);
        assert!(!status.database_exists);
        assert_eq!(status.poller_interval_secs, 30);
        assert_eq!(status.inter_call_delay_ms, 2000);
        assert_eq!(status.provider_base_url, "https://api.elevenlabs.io");
    }

    #[test]
    fn status_serializes() {
        let status = StatusResponse::from_config(&OutreachConfig::default());
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"poller_enabled\":true"));
        assert!(json.contains("\"service\":\"outreach\""));
    }

    #[test]
    fn plain_marks() {
        assert_eq!(mark(true, "on", "off", false), "[OK] on");
        assert_eq!(mark(false, "on", "off", false), "[--] off");
    }
}
