//! Controller error types.

use cronscale_schedule::ScheduleParseError;
use cronscale_state::{ObjectKey, StateError};
use thiserror::Error;

/// Failure taxonomy of the external object API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Network failures and timeouts.
    #[error("transient: {0}")]
    Transient(String),
}

/// Errors raised while evaluating a policy or one of its jobs.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("schedule parse error: {0}")]
    ScheduleParse(#[from] ScheduleParseError),

    #[error("unsupported target kind: {0}")]
    UnsupportedTargetKind(String),

    #[error("object {key} is not a {expected}")]
    UnexpectedObject { key: ObjectKey, expected: &'static str },

    #[error("object api error: {0}")]
    Api(#[from] ApiError),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("invalid controller config: {0}")]
    Config(String),
}

impl ControllerError {
    /// Whether the next tick should try again.
    ///
    /// Parse errors and unsupported kinds stay broken until the policy is
    /// edited; everything else may clear up on its own.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ControllerError::ScheduleParse(_)
                | ControllerError::UnsupportedTargetKind(_)
                | ControllerError::Config(_)
        )
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
