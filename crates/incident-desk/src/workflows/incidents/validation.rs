//! Field checks shared by the incident, student, and attendance flows.
//!
//! Failures are reported as [`ValidationError`] values whose `Display` text is
//! meant to be shown to the user as-is.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use super::domain::{parse_calendar_date, Student};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} cannot be in the future ({date})")]
    FutureDate { field: &'static str, date: NaiveDate },
    #[error("{field} is not a valid date: '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("'{0}' is not a valid phone number")]
    InvalidPhone(String),
    #[error("description must be at least {min} characters (found {found})")]
    DescriptionTooShort { min: usize, found: usize },
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9\s\-().]+$").expect("phone pattern compiles"))
}

pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required { field })
    } else {
        Ok(())
    }
}

pub fn ensure_not_future(
    field: &'static str,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if date > today {
        Err(ValidationError::FutureDate { field, date })
    } else {
        Ok(())
    }
}

/// Parse a raw date string and reject dates after `today`.
pub fn parse_past_date(
    field: &'static str,
    raw: &str,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    require(field, raw)?;
    let date = parse_calendar_date(raw).ok_or_else(|| ValidationError::InvalidDate {
        field,
        value: raw.trim().to_string(),
    })?;
    ensure_not_future(field, date, today)?;
    Ok(date)
}

pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if email_pattern().is_match(trimmed) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(trimmed.to_string()))
    }
}

/// Accepts common punctuation and requires between 7 and 15 digits.
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    if phone_pattern().is_match(trimmed) && (7..=15).contains(&digits) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(trimmed.to_string()))
    }
}

pub fn validate_description(value: &str, min: usize) -> Result<(), ValidationError> {
    require("description", value)?;
    let found = value.trim().chars().count();
    if found < min {
        Err(ValidationError::DescriptionTooShort { min, found })
    } else {
        Ok(())
    }
}

fn check_optional(
    value: Option<&str>,
    check: fn(&str) -> Result<(), ValidationError>,
) -> Result<(), ValidationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => check(value),
        _ => Ok(()),
    }
}

/// Checks applied before a student record is persisted.
pub fn validate_student(student: &Student, today: NaiveDate) -> Result<(), ValidationError> {
    require("first name", &student.first_name)?;
    require("last name", &student.last_name)?;

    if let Some(birth_date) = student.birth_date {
        ensure_not_future("birth date", birth_date, today)?;
    }

    check_optional(student.contact.email.as_deref(), validate_email)?;
    check_optional(student.contact.phone.as_deref(), validate_phone)?;
    check_optional(student.guardian.email.as_deref(), validate_email)?;
    check_optional(student.guardian.phone.as_deref(), validate_phone)?;
    check_optional(student.guardian.alt_phone.as_deref(), validate_phone)?;
    check_optional(student.tutor.email.as_deref(), validate_email)?;
    check_optional(student.tutor.phone.as_deref(), validate_phone)?;

    Ok(())
}
