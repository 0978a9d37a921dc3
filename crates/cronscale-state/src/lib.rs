//! Durable state for cronscale.
//!
//! One redb database holds four tables:
//!
//! - `policies`: `ScalingPolicy` keyed by `{namespace}/{name}`
//! - `job_runs`: the last fired instant per job, keyed by `{policy_id}:{job}`
//! - `policy_status`: the status sub-resource written by the controller
//! - `objects`: scalable workloads and autoscalers for standalone mode,
//!   keyed by `{kind}/{namespace}/{name}`
//!
//! Values are JSON. Run records and status are keyed under their policy id,
//! so deleting a policy can sweep them with one prefix scan.
//! `StateStore` clones share a single database handle.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{FireOutcome, PatchOutcome, StateStore};
pub use types::*;
