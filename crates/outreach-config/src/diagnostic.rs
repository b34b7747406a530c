// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment extraction errors into miette diagnostics for `outreach.toml`.
//!
//! Deserialization failures become [`ConfigError`] diagnostics carrying the
//! offending TOML span (when the key can be located in a loaded file), the
//! list of valid keys, and a Jaro-Winkler "did you mean" hint.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key needs before it is offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, located in its source file when possible.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key no section of `outreach.toml` accepts.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(outreach::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the field's type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(outreach::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key with no default that was not provided.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(outreach::config::missing_key),
        help("add `{key} = <value>` to your outreach.toml")
    )]
    MissingKey { key: String },

    /// A semantic check failed after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(outreach::config::validation))]
    Validation { message: String },

    /// Anything figment reports that has no better home.
    #[error("configuration error: {0}")]
    #[diagnostic(code(outreach::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let valid_keys: Vec<&str> = expected.to_vec();
                    let (span, src) = locate(&error, &section, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, &valid_keys),
                        valid_keys: valid_keys.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.clone().into_owned(),
                },
                Kind::InvalidType(actual, expected) => {
                    // The failing key is the last path segment; its section is the rest.
                    let (span, src) = match section.split_last() {
                        Some((field, parent)) => locate(&error, parent, field, toml_sources),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: section.join("."),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Resolve the file an error came from and the byte span of `field` in it.
fn locate(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let found = match origin {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        // Inline strings carry no file metadata.
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    let Some((path, content)) = found else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the `[section]` named by `path`, if present.
///
/// For `path = ["poller"]` and `field = "intervl_secs"`, finds the `[poller]`
/// header then searches for the key after it. Top-level fields search from start.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut byte_offset = search_start;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if search_start > 0 && trimmed.starts_with('[') {
            // Next section reached.
            return None;
        }
        if let Some(after) = trimmed.strip_prefix(field)
            && after.starts_with([' ', '\t', '='])
        {
            return Some(byte_offset + (line.len() - trimmed.len()));
        }
        byte_offset += line.len();
    }

    None
}

/// Closest valid key to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Print every error to stderr with miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_interval_for_typo() {
        let valid = &["enabled", "interval_secs", "inter_campaign_delay_ms"];
        assert_eq!(
            suggest_key("intervl_secs", valid),
            Some("interval_secs".to_string())
        );
    }

    #[test]
    fn suggests_api_key_for_typo() {
        let valid = &["api_key", "base_url", "agent_phone_number_id", "max_retries"];
        assert_eq!(suggest_key("apikey", valid), Some("api_key".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["name", "log_level"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_within_section() {
        let content = "[service]\nname = \"x\"\n[poller]\nintervl_secs = 5\n";
        let path = vec!["poller".to_string()];
        let o = find_key_offset(content, &path, "intervl_secs").unwrap();
        assert_eq!(&content[o..o + 12], "intervl_secs");
    }

    #[test]
    fn find_key_offset_stops_at_next_section() {
        let content = "[poller]\nenabled = true\n[dialer]\nname = 1\n";
        let path = vec!["poller".to_string()];
        assert_eq!(find_key_offset(content, &path, "name"), None);
    }

    #[test]
    fn find_key_offset_missing_section() {
        let path = vec!["dialer".to_string()];
        assert_eq!(find_key_offset("[poller]\nx = 1\n", &path, "x"), None);
    }
}
