//! Input checks shared by the trip service operations.

use chrono::{DateTime, Utc};
use lettre::Address;
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("invalid {what} id")))
}

pub fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims the address and lowercases its domain. The local part is kept
/// as typed.
pub fn email(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    let address = trimmed
        .parse::<Address>()
        .map_err(|_| AppError::Validation(format!("{field} is not a valid email: {trimmed}")))?;
    Ok(format!(
        "{}@{}",
        address.user(),
        address.domain().to_ascii_lowercase()
    ))
}

pub fn emails(values: &[String], field: &str) -> Result<Vec<String>, AppError> {
    values.iter().map(|value| email(value, field)).collect()
}

pub fn url(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    let parsed =
        Url::parse(trimmed).map_err(|err| AppError::Validation(format!("invalid url: {err}")))?;
    Ok(parsed.to_string())
}

pub fn date_range(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), AppError> {
    if starts_at > ends_at {
        return Err(AppError::Validation(
            "starts_at must not be after ends_at".into(),
        ));
    }
    Ok(())
}
