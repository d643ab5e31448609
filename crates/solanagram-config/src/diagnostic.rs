// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures into miette diagnostics pointing into the TOML
//! file that caused them, with "did you mean" hints for misspelled keys.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A TOML document that took part in loading, kept for span lookup.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(solanagram::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a solanagram setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(solanagram::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(solanagram::config::missing_key),
        help("set `{key}` in solanagram.toml or through a SOLANAGRAM_* variable")
    )]
    MissingKey { key: String },

    #[error("invalid setting: {message}")]
    #[diagnostic(code(solanagram::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(solanagram::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Known keys here: {valid_keys}"),
        None => format!("known keys here: {valid_keys}"),
    }
}

/// One diagnostic per error figment collected.
pub fn diagnose(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locate(&error, field, sources)
                    .map_or((None, None), |(span, src)| (Some(span), Some(src)));
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, *expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: dotted(&error.path, Some(field.as_ref())),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: dotted(&error.path, None),
                detail: format!("found {actual}"),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn dotted(path: &[String], leaf: Option<&str>) -> String {
    path.iter()
        .map(String::as_str)
        .chain(leaf)
        .collect::<Vec<_>>()
        .join(".")
}

/// Finds `field` in the TOML source the error came from.
fn locate(
    error: &figment::Error,
    field: &str,
    sources: &[ConfigSource],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    let source = match origin {
        Some(name) => sources.iter().find(|s| s.name == name)?,
        // Inline strings have no file name; only unambiguous with one source.
        None if sources.len() == 1 => &sources[0],
        None => return None,
    };
    let offset = find_key_offset(&source.content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(&source.name, source.content.clone()),
    ))
}

/// Byte offset of `field` inside the table `section` (`[]` is the root).
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = if section.is_empty() {
        0
    } else {
        let header = format!("[{}]", section.join("."));
        content.find(&header)? + header.len()
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let is_key = line[indent..]
            .strip_prefix(field)
            .and_then(|rest| rest.trim_start_matches([' ', '\t']).chars().next())
            == Some('=');
        if is_key {
            return Some(offset + indent);
        }
        if section.is_empty() && line.trim_start().starts_with('[') {
            return None;
        }
        offset += line.len();
    }
    None
}

/// Closest known key to `unknown`, if any is close enough.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, known: &[S]) -> Option<String> {
    known
        .iter()
        .map(|k| (strsim::jaro_winkler(unknown, k.as_ref()), k.as_ref()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints every error to stderr with miette's graphical renderer.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misspelled_reaper_key_gets_a_suggestion() {
        let known = ["interval_secs", "age_threshold_hours"];
        assert_eq!(
            suggest_key("age_treshold_hours", &known),
            Some("age_threshold_hours".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", &known), None);
    }

    #[test]
    fn key_is_found_inside_its_own_table() {
        let content = "[reaper]\nmax_memroy = 1\n[kinds.logger]\nmax_memroy = \"1g\"\n";
        let section = vec!["kinds".to_string(), "logger".to_string()];
        let o = find_key_offset(content, &section, "max_memroy").unwrap();
        assert_eq!(&content[o..o + 10], "max_memroy");
        assert!(o > content.find("[kinds.logger]").unwrap());
    }

    #[test]
    fn root_keys_stop_at_the_first_table() {
        let content = "log = 1\n[control]\nnetwork = \"x\"\n";
        assert_eq!(find_key_offset(content, &[], "log"), Some(0));
        assert_eq!(find_key_offset(content, &[], "network"), None);
    }

    #[test]
    fn prefix_of_a_longer_key_is_not_a_match() {
        let content = "[worker]\nconfig_path_x = 1\nconfig_path = \"/a\"\n";
        let o = find_key_offset(content, &["worker".to_string()], "config_path").unwrap();
        assert_eq!(&content[o..o + 13], "config_path =");
    }
}
