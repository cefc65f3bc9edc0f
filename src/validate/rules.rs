//! Field validation against declared rules.
//!
//! A rule is a whole-string regex plus optional declared length bounds and
//! message. Undeclared bounds fall back to bounds inferred from the
//! pattern; a pattern ending in `{1}` marks the field required. Failures
//! collect into a field-to-message map, they are never thrown.

use crate::repo::record::{value_to_text, Record};
use crate::validate::limits;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ValidationRule {
    /// Regex the whole value must match (implicitly anchored).
    pub rule: String,
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
    /// Message for a pattern mismatch; length and required failures use
    /// stock messages.
    #[serde(default)]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn new(rule: impl Into<String>) -> Self {
        ValidationRule {
            rule: rule.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Outcome of validating one record: empty means pass.
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    pub errors: BTreeMap<String, String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate `record` against the declared rules.
pub fn validate_record(
    rules: &HashMap<String, ValidationRule>,
    record: &Record,
) -> ValidationReport {
    let mut errors = BTreeMap::new();

    for (field, rule) in rules {
        let bounds = limits::infer(&rule.rule);
        let min = rule.min.or(bounds.min);
        let max = rule.max.or(bounds.max);
        let required = rule.rule.ends_with("{1}");

        let text = record
            .get(field)
            .filter(|v| !v.is_null())
            .map(value_to_text);
        let empty = text.as_deref().map(str::is_empty).unwrap_or(true);

        if required && empty {
            errors.insert(
                field.clone(),
                format!("The {} field must be filled in.", field),
            );
            continue;
        }
        let Some(text) = text else { continue };
        let len = text.chars().count() as u64;

        if min.map(|m| len < m).unwrap_or(false) {
            errors.insert(
                field.clone(),
                format!(
                    "The {} field must contain at least {} characters.",
                    field,
                    min.unwrap_or(0)
                ),
            );
        } else if max.map(|m| len > m).unwrap_or(false) {
            errors.insert(
                field.clone(),
                format!(
                    "The {} field must contain a maximum of {} characters.",
                    field,
                    max.unwrap_or(0)
                ),
            );
        } else if let Ok(re) = Regex::new(&format!("^{}$", rule.rule)) {
            if !re.is_match(&text) {
                errors.insert(
                    field.clone(),
                    rule.message
                        .clone()
                        .unwrap_or_else(|| format!("The {} field is invalid.", field)),
                );
            }
        }
        // an uncompilable pattern skips the match check rather than failing
        // the whole validation
    }

    ValidationReport { errors }
}
