//! Validation utilities for request DTOs.

use std::collections::HashSet;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::web::error::ApiError;

/// Maximum number of tags on one row.
pub const MAX_TAGS: usize = 40;

/// Maximum length of one tag.
pub const MAX_TAG_LENGTH: usize = 255;

/// A JSON extractor that validates the request body.
///
/// A body that does not decode is a 400; a decoded body that breaks a field
/// rule is a 422 with per-field details.
///
/// ```ignore
/// async fn create_topic(
///     ValidatedJson(body): ValidatedJson<CreateTopicRequest>,
/// ) -> Result<Json<Topic>, ApiError> {
///     // body is already validated
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Decode and validate a JSON document carried in a multipart text part.
pub fn parse_validated<T>(text: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_str(text)
        .map_err(|e| ApiError::bad_request(format!("Invalid metadata: {}", e)))?;
    value.validate().map_err(ApiError::from_validation_errors)?;
    Ok(value)
}

// ============================================================================
// Custom Validators
// ============================================================================

/// Validate a tag list: at most [`MAX_TAGS`] entries, each non-empty, no
/// longer than [`MAX_TAG_LENGTH`] and unique ignoring case.
pub fn valid_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::new("too_many_tags")
            .with_message(format!("At most {MAX_TAGS} tags are allowed").into()));
    }
    let mut seen = HashSet::new();
    for tag in tags {
        if tag.trim().is_empty() || tag.chars().count() > MAX_TAG_LENGTH {
            return Err(ValidationError::new("tag_length").with_message(
                format!("Tags must be 1 to {MAX_TAG_LENGTH} characters long").into(),
            ));
        }
        if !seen.insert(tag.to_lowercase()) {
            return Err(ValidationError::new("duplicate_tag")
                .with_message(format!("Duplicate tag: {tag}").into()));
        }
    }
    Ok(())
}

/// Validate that a string does not contain control characters or NULL bytes.
pub fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Validate that a string is not empty after trimming whitespace.
pub fn not_empty_trimmed(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}
