//! Entity shapes as stored under `owners/{ownerId}`, their closed status enums
//! and the form validators the mutation pipeline runs.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::mutation::FieldErrors;

pub mod checklist;
pub mod contractor;
pub mod inspection;
pub mod maintenance;
pub mod profile;
pub mod property;
pub mod tenant;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email validation pattern to compile")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

pub(crate) fn parse_variant<T: Copy>(
    all: &[T],
    raw: &str,
    label: fn(T) -> &'static str,
    kind: &'static str,
) -> Result<T, UnknownVariant> {
    let wanted = raw.trim();
    all.iter()
        .copied()
        .find(|v| label(*v).eq_ignore_ascii_case(wanted))
        .ok_or_else(|| UnknownVariant {
            kind,
            value: raw.to_string(),
        })
}

pub(crate) fn require_text(errors: &mut FieldErrors, field: &str, label: &str, value: &mut String) {
    *value = value.trim().to_string();
    if value.is_empty() {
        errors.add(field, format!("{label} is required"));
    }
}

pub(crate) fn trim_optional(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

pub(crate) fn check_amount(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    if let Some(amount) = value {
        if !amount.is_finite() || amount < 0.0 {
            errors.add(field, "Must be zero or more");
        }
    }
}

pub(crate) fn check_email(errors: &mut FieldErrors, field: &str, value: &mut Option<String>) {
    trim_optional(value);
    if let Some(email) = value {
        if !EMAIL_PATTERN.is_match(email) {
            errors.add(field, "Enter a valid email address");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_text_is_trimmed_to_none() {
        let mut value = Some("   ".to_string());
        trim_optional(&mut value);
        assert_eq!(value, None);
    }

    #[test]
    fn email_check() {
        let mut errors = FieldErrors::new();
        let mut ok = Some(" a@b.co ".to_string());
        check_email(&mut errors, "email", &mut ok);
        assert!(errors.is_empty());
        assert_eq!(ok.as_deref(), Some("a@b.co"));

        let mut bad = Some("nope".to_string());
        check_email(&mut errors, "email", &mut bad);
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let mut errors = FieldErrors::new();
        check_amount(&mut errors, "rent", Some(-1.0));
        check_amount(&mut errors, "deposit", Some(0.0));
        assert_eq!(errors.len(), 1);
    }
}
