//! Input validation shared by the store and the HTTP layer.
//!
//! Failures accumulate per field in [`FieldErrors`], which serializes as
//! `{"field": ["message", ...]}`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

pub const MAX_PATIENT_ID_LEN: usize = 255;
pub const MAX_PATIENT_DATA_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_DEBATE_MESSAGES: usize = 1000;
pub const MAX_TEXT_LEN: usize = 10_000;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TOPIC_LEN: usize = 500;
pub const MIN_PASSWORD_LEN: usize = 8;

static PATIENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,20}$").expect("static regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record the outcome of a single-field check.
    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

pub fn validate_patient_id(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Patient ID must be a non-empty string.".into());
    }
    if value.chars().count() > MAX_PATIENT_ID_LEN {
        return Err(format!(
            "Patient ID must be {MAX_PATIENT_ID_LEN} characters or less."
        ));
    }
    if !PATIENT_ID_RE.is_match(value) {
        return Err(
            "Patient ID can only contain alphanumeric characters, hyphens, and underscores."
                .into(),
        );
    }
    Ok(())
}

pub fn validate_patient_data(value: &Value) -> Result<(), String> {
    if !value.is_object() {
        return Err("Data must be a dictionary.".into());
    }
    let size = serde_json::to_vec(value).map(|b| b.len()).unwrap_or(0);
    if size > MAX_PATIENT_DATA_BYTES {
        let size_mb = size as f64 / (1024.0 * 1024.0);
        return Err(format!(
            "Data size ({size_mb:.2} MB) exceeds maximum allowed size (5 MB)."
        ));
    }
    Ok(())
}

pub fn validate_debate_history(value: &Value) -> Result<(), String> {
    match value.as_array() {
        None => Err("Debate history must be a list.".into()),
        Some(items) if items.len() > MAX_DEBATE_MESSAGES => {
            Err("Debate history is too large.".into())
        }
        Some(_) => Ok(()),
    }
}

pub fn validate_json_list(value: &Value) -> Result<(), String> {
    if value.is_array() {
        Ok(())
    } else {
        Err("Expected a list of items.".into())
    }
}

pub fn validate_phone(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("This field may not be blank.".into());
    }
    if !PHONE_RE.is_match(value) {
        return Err("Enter a valid phone number.".into());
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), String> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err("Enter a valid email address.".into())
    }
}

pub fn validate_password(value: &str) -> Result<(), String> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.".into());
    }
    Ok(())
}

/// Required free text: sanitized, non-blank, at most `max_len` characters.
pub fn validate_required_text(value: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("This field may not be blank.".into());
    }
    validate_text_len(value, max_len)
}

/// Optional free text: at most `max_len` characters.
pub fn validate_text_len(value: &str, max_len: usize) -> Result<(), String> {
    if value.chars().count() > max_len {
        return Err(format!(
            "Ensure this field has no more than {max_len} characters."
        ));
    }
    Ok(())
}

/// Strip NUL bytes and surrounding whitespace. Length limits are left to the
/// validators so overlong input is rejected, not silently cut.
pub fn sanitize_text(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| *c != '\0').collect();
    cleaned.trim().to_string()
}
