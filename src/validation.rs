//! Input validation shared by the services and the HTTP handlers.
//!
//! Each function returns `Err(message)` describing the first problem found.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::Role;

lazy_static! {
    /// Pragmatic email check: one @, a dot in the domain, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$"
    ).unwrap();

    /// Digits, spaces and the usual phone punctuation
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ().-]{7,20}$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate an optional phone number
pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    match phone.as_deref().map(str::trim) {
        None | Some("") => Ok(()),
        Some(p) if PHONE_REGEX.is_match(p) => Ok(()),
        Some(_) => Err("Invalid phone number".to_string()),
    }
}

/// Validate a required display name (client, team member, project title)
pub fn validate_name(name: &str, field_name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if trimmed.chars().count() > 200 {
        return Err(format!("{} is too long (max 200 characters)", field_name));
    }

    Ok(())
}

/// Validate a role that can be handed out through an invitation.
/// Ownership is never granted by invite.
pub fn validate_invite_role(role: &str) -> Result<Role, String> {
    let parsed: Role = role
        .parse()
        .map_err(|_| "Invalid role. Must be one of: manager, estimator, painter".to_string())?;

    if parsed == Role::Owner {
        return Err("The owner role cannot be granted by invitation".to_string());
    }

    Ok(parsed)
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}
