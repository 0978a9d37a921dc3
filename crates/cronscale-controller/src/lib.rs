//! cronscale-controller: time-driven scaling of workloads and autoscalers.
//!
//! Every tick the `CronScaler` walks all stored `ScalingPolicy`s, picks the
//! jobs whose schedule came due since the last tick, and applies their
//! target size to the policy's target.
//!
//! # Scaling Algorithm
//!
//! ```text
//! direct-replica target (Deployment, StatefulSet):
//!     replicas = target_size
//!
//! bound-adjustable target (HorizontalPodAutoscaler):
//!     new_max = max(old_max, target)
//!     new_min = target   if target < old_min or target > current
//!             = old_min  otherwise
//!     new_min = min(new_min, new_max)
//! ```
//!
//! The autoscaler is never told a replica count; it settles on
//! `clamp(current, new_min, new_max)` by itself.
//!
//! # Firing
//!
//! A job is due at `now` when its latest scheduled instant in
//! `(now - misfire_grace, now]` has not been recorded yet. Successful
//! firings are recorded in the state store, so a restart neither replays nor
//! loses them, and run-once jobs (including every `@date` job) stay
//! completed for the life of the policy.

pub mod config;
pub mod controller;
pub mod error;
pub mod object_api;
pub mod policy;
pub mod reconciler;
pub mod selector;
pub mod target;
pub mod tracker;

pub use config::ControllerConfig;
pub use controller::{CronScaler, PolicyOutcome, TickReport};
pub use error::{ApiError, ControllerError, ControllerResult};
pub use object_api::ObjectApi;
pub use policy::{CompiledJob, CompiledPolicy, PolicyCache};
pub use reconciler::{ScaleDecision, ScaleReconciler, adjust_bounds, decide, settled_replicas};
pub use selector::{DueJob, DueJobSelector, Selection};
pub use target::{ScaleTarget, TargetClass, TargetResolver, TargetSnapshot, TargetState};
pub use tracker::JobTracker;
