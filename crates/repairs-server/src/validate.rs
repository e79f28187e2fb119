//! Field checks for incoming repair payloads and identifiers.
//!
//! Runs before anything reaches `repairs_core`; the core assumes its input
//! already passed these.

use repairs_core::model::ticket::NewRepair;
use std::fmt;

pub const MAX_ITEM_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4000;
pub const MAX_STATUS_LEN: usize = 64;
pub const MAX_ASSIGNEE_LEN: usize = 128;
pub const MAX_REPAIR_ID_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
    pub suggestion: String,
}

impl ValidationError {
    pub fn new(
        field: &'static str,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            field,
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

fn check_text(
    field: &'static str,
    value: &str,
    max_len: usize,
    allow_newlines: bool,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(
            field,
            "must not be empty",
            format!("provide a non-empty {field}"),
        ));
    }
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be <= {max_len} characters"),
            format!("shorten the {field}"),
        ));
    }
    let allowed = |c: char| allow_newlines && matches!(c, '\n' | '\r' | '\t');
    let bad_control = |c: char| c.is_control() && !allowed(c);
    if value.chars().any(bad_control) {
        return Err(ValidationError::new(
            field,
            "must not contain control characters",
            format!("remove control characters from the {field}"),
        ));
    }
    Ok(())
}

pub fn validate_item(s: &str) -> Result<(), ValidationError> {
    check_text("item", s, MAX_ITEM_LEN, false)
}

/// Descriptions may span lines; other control characters are rejected.
pub fn validate_description(s: &str) -> Result<(), ValidationError> {
    check_text("description", s, MAX_DESCRIPTION_LEN, true)
}

pub fn validate_status(s: &str) -> Result<(), ValidationError> {
    check_text("status", s, MAX_STATUS_LEN, false)
}

pub fn validate_assignee(s: &str) -> Result<(), ValidationError> {
    check_text("assigned_to", s, MAX_ASSIGNEE_LEN, false)
}

pub fn validate_repair_id(s: &str) -> Result<(), ValidationError> {
    check_text("repair_id", s, MAX_REPAIR_ID_LEN, false)
}

/// Check every field of a create payload, reporting the first failure.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, in field order.
pub fn validate_new_repair(new: &NewRepair) -> Result<(), ValidationError> {
    validate_item(&new.item)?;
    validate_description(&new.description)?;
    validate_status(&new.status)?;
    if let Some(assignee) = new.assigned_to.as_deref() {
        validate_assignee(assignee)?;
    }
    Ok(())
}
