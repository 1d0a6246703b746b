use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::{macros::format_description, Date};

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 50;

/// Every rule a payload broke, in the order the checks ran.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn check_email(email: &str, errors: &mut ValidationErrors) {
    if !is_valid_email(email) {
        errors.push("Please provide a valid email address");
    }
}

pub fn check_password(password: &str, errors: &mut ValidationErrors) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.push("Password must be at least 8 characters long");
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !(has_lower && has_upper && has_digit && has_special) {
        errors.push(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        );
    }
}

pub fn check_name(value: &str, label: &str, errors: &mut ValidationErrors) {
    let len = value.chars().count();
    if len < NAME_MIN_LENGTH {
        errors.push(format!("{label} must be at least {NAME_MIN_LENGTH} characters long"));
    } else if len > NAME_MAX_LENGTH {
        errors.push(format!("{label} cannot exceed {NAME_MAX_LENGTH} characters"));
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).ok()
}
