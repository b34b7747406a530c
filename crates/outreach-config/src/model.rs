// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the outreach platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level outreach configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutreachConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Campaign store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Voice-AI calling provider settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Batch reconciliation poller settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Legacy direct-dial loop settings.
    #[serde(default)]
    pub dialer: DialerConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in log output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "outreach".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("outreach").join("outreach.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("outreach.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Calling provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    /// Provider API key. `None` requires `OUTREACH_VOICE_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the provider API.
    #[serde(default = "default_voice_base_url")]
    pub base_url: String,

    /// Provider-side phone number used as caller id.
    #[serde(default)]
    pub agent_phone_number_id: Option<String>,

    /// Per-request timeout. Unset leaves the HTTP client default in place.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Retries for transient HTTP statuses (429, 5xx).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_voice_base_url(),
            agent_phone_number_id: None,
            request_timeout_secs: None,
            max_retries: default_max_retries(),
        }
    }
}

fn default_voice_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_max_retries() -> u32 {
    1
}

/// Reconciliation poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Whether `serve` starts the timer loop.
    #[serde(default = "default_poller_enabled")]
    pub enabled: bool,

    /// Seconds between reconciliation ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Pause between campaigns within one tick, in milliseconds.
    #[serde(default = "default_inter_campaign_delay_ms")]
    pub inter_campaign_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: default_poller_enabled(),
            interval_secs: default_interval_secs(),
            inter_campaign_delay_ms: default_inter_campaign_delay_ms(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn inter_campaign_delay(&self) -> Duration {
        Duration::from_millis(self.inter_campaign_delay_ms)
    }
}

fn default_poller_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    45
}

fn default_inter_campaign_delay_ms() -> u64 {
    1000
}

/// Legacy direct-dial loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DialerConfig {
    /// Pause between consecutive calls, in milliseconds.
    #[serde(default = "default_inter_call_delay_ms")]
    pub inter_call_delay_ms: u64,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            inter_call_delay_ms: default_inter_call_delay_ms(),
        }
    }
}

impl DialerConfig {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }
}

fn default_inter_call_delay_ms() -> u64 {
    2000
}
