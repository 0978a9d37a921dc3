//! Schedule parse errors.

use thiserror::Error;

/// A malformed schedule, exclusion, or time zone.
///
/// Fatal to the job (or policy) that carries it until the policy is edited.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleParseError {
    #[error("empty schedule expression")]
    Empty,

    #[error("invalid cron expression {expr:?}: {reason}")]
    Cron { expr: String, reason: String },

    #[error("invalid @date literal {expr:?}: {reason}")]
    Date { expr: String, reason: String },

    #[error("invalid exclusion {expr:?}: {reason}")]
    Exclusion { expr: String, reason: String },

    #[error("unknown time zone: {0}")]
    Timezone(String),
}
