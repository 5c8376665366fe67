//! Privacy & enum validators (component 2): stateless predicates
//! shared by ingestion and the baseline description path. Every string that
//! ends up in a stored row passes through here first.

use crate::domain::run::{Metadata, MetadataValue};
use obstrace_types::error::{ObsError, Result};

/// Metadata keys blocked case-insensitively, exact match.
pub const BLOCKED_KEYS: &[&str] = &[
    "prompt",
    "response",
    "reasoning",
    "thought",
    "message",
    "content",
    "text",
    "output",
    "input",
    "chain_of_thought",
    "explanation",
    "rationale",
];

/// Substrings that make a free-text field (failure message, baseline
/// description) read as containing sensitive content. A hit here is a hard
/// rejection, never a redaction (recommended default).
pub const SENSITIVE_SUBSTRINGS: &[&str] = BLOCKED_KEYS;

pub const MAX_METADATA_STRING_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 200;
pub const MAX_AGENT_ID_LEN: usize = 255;
pub const MAX_AGENT_VERSION_LEN: usize = 100;

fn is_blocked_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    BLOCKED_KEYS.contains(&lower.as_str())
}

fn contains_sensitive_substring(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    SENSITIVE_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Validate a metadata map: no blocked keys, string values bounded to
/// [`MAX_METADATA_STRING_LEN`] chars. `path` is the field path used in the
/// resulting [`ObsError::Validation`] (e.g. `steps[1].metadata`).
pub fn check_metadata_map(metadata: &Metadata, path: &str) -> Result<()> {
    for (key, value) in metadata {
        if is_blocked_key(key) {
            return Err(ObsError::validation(
                format!("{path}.{key}"),
                format!("metadata key '{key}' is blocked"),
            ));
        }
        if let MetadataValue::String(s) = value {
            if s.chars().count() > MAX_METADATA_STRING_LEN {
                return Err(ObsError::validation(
                    format!("{path}.{key}"),
                    format!(
                        "metadata string value exceeds {MAX_METADATA_STRING_LEN} characters"
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Validate a bounded free-text field (failure message). Rejects on either
/// a sensitive substring or exceeding `max_len`.
pub fn check_text_field(value: &str, max_len: usize, path: &str) -> Result<()> {
    if value.chars().count() > max_len {
        return Err(ObsError::validation(
            path,
            format!("text field exceeds {max_len} characters"),
        ));
    }
    if contains_sensitive_substring(value) {
        return Err(ObsError::validation(
            path,
            "text field contains a blocked keyword",
        ));
    }
    Ok(())
}

/// Baseline description: same policy as [`check_text_field`], given its own
/// entry point so callers don't have to thread a length constant through.
pub fn check_description(description: &str, path: &str) -> Result<()> {
    check_text_field(description, MAX_DESCRIPTION_LEN, path)
}

pub fn check_short_identifier(value: &str, max_len: usize, path: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ObsError::validation(path, "must not be empty"));
    }
    if value.chars().count() > max_len {
        return Err(ObsError::validation(
            path,
            format!("exceeds {max_len} characters"),
        ));
    }
    Ok(())
}

pub fn check_unit_interval(value: f64, path: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ObsError::validation(path, "must be between 0.0 and 1.0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn blocks_case_insensitive_key() {
        let mut map: Metadata = HashMap::new();
        map.insert("Prompt".to_string(), MetadataValue::String("hi".into()));
        let err = check_metadata_map(&map, "steps[0].metadata").unwrap_err();
        assert!(matches!(err, ObsError::Validation { .. }));
    }

    #[test]
    fn allows_benign_key() {
        let mut map: Metadata = HashMap::new();
        map.insert("tool_name".to_string(), MetadataValue::String("api".into()));
        assert!(check_metadata_map(&map, "steps[0].metadata").is_ok());
    }

    #[test]
    fn metadata_string_length_boundary() {
        let mut map: Metadata = HashMap::new();
        map.insert("k".to_string(), MetadataValue::String("a".repeat(100)));
        assert!(check_metadata_map(&map, "m").is_ok());

        map.insert("k".to_string(), MetadataValue::String("a".repeat(101)));
        assert!(check_metadata_map(&map, "m").is_err());
    }

    #[test]
    fn failure_message_with_blocked_word_is_rejected() {
        assert!(check_text_field("the prompt leaked", 500, "failure.message").is_err());
    }

    #[test]
    fn description_over_bound_is_rejected() {
        let desc = "a".repeat(201);
        assert!(check_description(&desc, "baseline.description").is_err());
    }

    proptest! {
        #[test]
        fn unit_interval_accepts_only_the_closed_range(value in -2.0f64..3.0) {
            let result = check_unit_interval(value, "field");
            if (0.0..=1.0).contains(&value) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn short_identifier_boundary_matches_char_count(len in 1usize..300) {
            let value = "x".repeat(len);
            let result = check_short_identifier(&value, MAX_AGENT_ID_LEN, "field");
            if len <= MAX_AGENT_ID_LEN {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }
    }
}
