// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express. All failures
//! are collected; validation does not stop at the first one.

use crate::diagnostic::ConfigError;
use crate::model::OutreachConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &OutreachConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let level = config.service.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` is not one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.poller.interval_secs == 0 {
        errors.push(ConfigError::validation(
            "poller.interval_secs must be at least 1",
        ));
    }

    if let Err(reason) = check_base_url(&config.voice.base_url) {
        errors.push(ConfigError::validation(format!(
            "voice.base_url `{}` {reason}",
            config.voice.base_url
        )));
    }

    if config.voice.request_timeout_secs == Some(0) {
        errors.push(ConfigError::validation(
            "voice.request_timeout_secs must be at least 1 when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_base_url(url: &str) -> Result<(), &'static str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or("must start with http:// or https://")?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err("has no valid host");
    }
    Ok(())
}
