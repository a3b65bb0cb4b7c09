//! Form validation
//!
//! Errors are collected per field so a form can be re-rendered with every
//! problem shown next to its input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

/// Longest accepted e-mail address
pub const EMAIL_MAX_LEN: usize = 254;

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ok when no errors were recorded
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// One line per message, field name first
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// JSON object for API error details
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.fields).unwrap_or_default()
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Trim `value` and record an error when it is blank or longer than `max_len` characters.
/// Returns the trimmed value.
pub fn required_text(errors: &mut FormErrors, field: &str, value: &str, max_len: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field is required.");
    } else if trimmed.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters.", max_len),
        );
    }
    trimmed.to_string()
}

/// Trim and validate a required e-mail address
pub fn required_email(errors: &mut FormErrors, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field is required.");
    } else if !is_valid_email(trimmed) {
        errors.add(field, "Enter a valid email address.");
    }
    trimmed.to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= EMAIL_MAX_LEN && EMAIL_REGEX.is_match(email)
}
