//! redb table definitions for the cronscale state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Shape shared by every table: string keys, JSON values.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Scaling policies keyed by `{namespace}/{name}`.
pub const POLICIES: JsonTable = TableDefinition::new("policies");

/// Job run records keyed by `{policy_id}:{job_name}`.
pub const JOB_RUNS: JsonTable = TableDefinition::new("job_runs");

/// Policy status keyed by `{namespace}/{name}`.
pub const POLICY_STATUS: JsonTable = TableDefinition::new("policy_status");

/// Scalable objects keyed by `{kind}/{namespace}/{name}`.
pub const OBJECTS: JsonTable = TableDefinition::new("objects");
