//! Push event payload extraction
//!
//! Only two fields of the delivery are interpreted: `ref` and
//! `repository.full_name`. The body is decoded as a loose JSON value so that
//! unrelated schema changes on the provider side never break a hook.

use serde_json::Value;
use thiserror::Error;

/// Fields of a push delivery needed to locate a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// `repository.full_name`, e.g. `org/repo`
    pub repository: String,
    /// `ref`, e.g. `refs/heads/main`
    pub git_ref: String,
}

/// Reasons a body is not a usable push event, in the order they are checked
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("top-level JSON value is not an object")]
    NotAnObject,

    #[error("`repository` is missing or not an object")]
    MissingRepository,

    #[error("`repository.full_name` is missing or not a string")]
    MissingFullName,

    #[error("`ref` is missing or not a string")]
    MissingRef,
}

/// Decode `body` and pull out the repository name and ref.
pub fn extract_push_event(body: &[u8]) -> Result<PushEvent, PayloadError> {
    let value: Value = serde_json::from_slice(body)?;

    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;

    let repository = object
        .get("repository")
        .and_then(Value::as_object)
        .ok_or(PayloadError::MissingRepository)?;

    let full_name = repository
        .get("full_name")
        .and_then(Value::as_str)
        .ok_or(PayloadError::MissingFullName)?;

    let git_ref = object
        .get("ref")
        .and_then(Value::as_str)
        .ok_or(PayloadError::MissingRef)?;

    Ok(PushEvent {
        repository: full_name.to_string(),
        git_ref: git_ref.to_string(),
    })
}
