//! Custom field validators used by the request models

use crate::services::password::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use validator::ValidationError;

/// Digits with optional leading `+` and common separators
static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]*[0-9]$").expect("valid phone regex"));

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Absolute http(s) URL with a host
pub fn http_url(value: &str) -> Result<(), ValidationError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| invalid("url", "must be an http or https URL"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(invalid("url", "must be an http or https URL"));
    }
    Ok(())
}

/// http(s) URL or a path rooted at `/`, as returned by the upload endpoint
pub fn image_ref(value: &str) -> Result<(), ValidationError> {
    if value.starts_with('/') && !value.starts_with("//") && !value.chars().any(char::is_whitespace) {
        return Ok(());
    }
    http_url(value).map_err(|_| invalid("image", "must be a URL or an absolute path"))
}

/// Rejects strings made only of whitespace
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "must not be blank"));
    }
    Ok(())
}

pub fn phone_number(value: &str) -> Result<(), ValidationError> {
    if !PHONE_NUMBER.is_match(value.trim()) {
        return Err(invalid("phone", "must be a phone number"));
    }
    Ok(())
}

/// Password length, counted in characters
pub fn password_length(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(invalid("password", "must be between 8 and 128 characters"));
    }
    Ok(())
}
