//! Store error taxonomy.
//!
//! Every variant carries the backend's message as text so callers can log
//! it without depending on redb or serde_json types.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state database: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("state table unavailable: {0}")]
    Table(String),

    /// A read or write against an open table failed.
    #[error("state storage error: {0}")]
    Storage(String),

    #[error("failed to encode record: {0}")]
    Encode(String),

    /// A stored record no longer matches its type, e.g. after a schema change.
    #[error("failed to decode stored record: {0}")]
    Decode(String),
}
