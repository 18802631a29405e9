//! Field-level validation primitives shared by every record service.
//!
//! Services collect every problem they find into [`ValidationErrors`] and only
//! then fail, so a client sees all violations of a payload at once.

use std::fmt::Display;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field name used for cross-field and record-level problems.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex compiles")
});

static MOBILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9]{10,15}$").expect("mobile regex compiles")
});

/// A single `{field, error}` entry of a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// Every problem found while validating one payload.
#[derive(Debug, Default, Clone, PartialEq, Eq, Error)]
#[error("validation failed with {} error(s)", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a failure with exactly one entry.
    pub fn single(field: impl Into<String>, error: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, error);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, error: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            error: error.into(),
        });
    }

    pub fn add_non_field(&mut self, error: impl Into<String>) {
        self.add(NON_FIELD_ERRORS, error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when at least one entry names `field`.
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    /// Folds the collected entries into a `Result`.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Requires `value` to be between `min` and `max` characters.
    pub fn check_len(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if min > 0 && value.trim().is_empty() {
            self.add(field, "This field may not be blank.");
        } else if len < min {
            self.add(
                field,
                format!("Ensure this field has at least {min} characters."),
            );
        } else if len > max {
            self.add(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    /// Like [`check_len`](Self::check_len) for optional fields; `None` passes.
    pub fn check_opt_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value
            && value.chars().count() > max
        {
            self.add(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    /// Requires `min <= value <= max`.
    pub fn check_range<T>(&mut self, field: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + Display,
    {
        if value < min {
            self.add(
                field,
                format!("Ensure this value is greater than or equal to {min}."),
            );
        } else if value > max {
            self.add(
                field,
                format!("Ensure this value is less than or equal to {max}."),
            );
        }
    }

    /// Requires `value >= min`.
    pub fn check_min<T>(&mut self, field: &str, value: T, min: T)
    where
        T: PartialOrd + Display,
    {
        if value < min {
            self.add(
                field,
                format!("Ensure this value is greater than or equal to {min}."),
            );
        }
    }

    pub fn check_email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value) {
            self.add(field, "Enter a valid email address.");
        }
    }

    /// Appends every entry of `other`.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }
}

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL_RE.is_match(value)
}

pub fn is_valid_mobile(value: &str) -> bool {
    MOBILE_RE.is_match(value)
}

pub fn is_valid_ip(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

pub fn is_alphanumeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Checks a phone-style number made of 10 to 15 digits.
///
/// `label` is the human name used in the messages, e.g. "Contact number".
pub fn check_phone_digits(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) {
    if !is_numeric(value) {
        errors.add(field, format!("{label} must be numeric."));
    } else if !(10..=15).contains(&value.len()) {
        errors.add(field, format!("{label} must be between 10 and 15 digits."));
    }
}

/// Trims a free-text optional value, mapping blank strings to `None`.
pub fn normalize_opt(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_every_error() {
        let mut errors = ValidationErrors::new();
        errors.check_len("name", "", 1, 50);
        errors.check_range("port", 70000, 1, 65535);
        errors.add_non_field("End time must be after start time.");

        assert_eq!(errors.errors().len(), 3);
        assert!(errors.has("name"));
        assert!(errors.has("port"));
        assert!(errors.has(NON_FIELD_ERRORS));
        assert!(errors.finish().is_err());
    }

    #[test]
    fn test_empty_errors_finish_ok() {
        let mut errors = ValidationErrors::new();
        errors.check_len("name", "Morning", 1, 50);
        errors.check_opt_len("description", None, 255);
        assert!(errors.finish().is_ok());
    }

    #[test]
    fn test_length_messages() {
        let mut errors = ValidationErrors::new();
        errors.check_len("name", "ab", 3, 255);
        errors.check_len("code", &"x".repeat(21), 1, 20);
        assert_eq!(
            errors.errors()[0].error,
            "Ensure this field has at least 3 characters."
        );
        assert_eq!(
            errors.errors()[1].error,
            "Ensure this field has no more than 20 characters."
        );
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("hr@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("no-at-symbol.example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@@example.com"));
    }

    #[test]
    fn test_mobile_format() {
        assert!(is_valid_mobile("+8801712345678"));
        assert!(is_valid_mobile("0123456789"));
        assert!(!is_valid_mobile("12345"));
        assert!(!is_valid_mobile("01234abc89"));
    }

    #[test]
    fn test_ip_addresses() {
        assert!(is_valid_ip("192.168.1.10"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("300.1.1.1"));
        assert!(!is_valid_ip("device.local"));
    }

    #[test]
    fn test_phone_digits_messages() {
        let mut errors = ValidationErrors::new();
        check_phone_digits(&mut errors, "contact_number", "Contact number", "12a45");
        check_phone_digits(&mut errors, "contact_number", "Contact number", "12345");
        assert_eq!(errors.errors()[0].error, "Contact number must be numeric.");
        assert_eq!(
            errors.errors()[1].error,
            "Contact number must be between 10 and 15 digits."
        );
    }

    #[test]
    fn test_normalize_opt() {
        assert_eq!(normalize_opt(Some("  ".into())), None);
        assert_eq!(normalize_opt(Some(" Dhaka ".into())), Some("Dhaka".into()));
        assert_eq!(normalize_opt(None), None);
    }
}
