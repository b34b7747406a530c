// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./outreach.toml` > `~/.config/outreach/outreach.toml` >
//! `/etc/outreach/outreach.toml` with environment variable overrides via `OUTREACH_` prefix.

// figment::Error is an external type.
#![allow(clippy::result_large_err)]

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::OutreachConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/outreach/outreach.toml";
pub(crate) const LOCAL_CONFIG: &str = "outreach.toml";

/// Top-level sections an `OUTREACH_<SECTION>_<KEY>` variable may target.
const SECTIONS: [&str; 5] = ["service", "storage", "voice", "poller", "dialer"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("outreach").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/outreach/outreach.toml` (system-wide)
/// 3. `~/.config/outreach/outreach.toml` (user XDG config)
/// 4. `./outreach.toml` (local directory)
/// 5. `OUTREACH_*` environment variables
pub fn load_config() -> Result<OutreachConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<OutreachConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OutreachConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<OutreachConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OutreachConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(OutreachConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys themselves contain
/// underscores, so `OUTREACH_VOICE_AGENT_PHONE_NUMBER_ID` must become
/// `voice.agent_phone_number_id`, not `voice.agent.phone.number.id`.
fn env_provider() -> Env {
    Env::prefixed("OUTREACH_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
