//! Request validation utilities

use crate::api::error::{ApiError, ApiResult};

/// Validate that a required string field is not blank
pub fn validate_not_empty(value: &str, field_name: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{} cannot be empty", field_name)));
    }
    Ok(())
}

/// Task ids are `task_` followed by ASCII alphanumerics.
///
/// Anything else cannot exist, so it is reported as not found.
pub fn validate_task_id(value: &str) -> ApiResult<()> {
    let well_formed = value
        .strip_prefix("task_")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()));
    if !well_formed {
        return Err(ApiError::NotFound(format!("Task not found: {}", value)));
    }
    Ok(())
}
