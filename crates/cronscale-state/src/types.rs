//! Domain types for the cronscale state store.
//!
//! These types represent the persisted scaling policies, job run records,
//! policy status, and the scalable objects served in standalone mode. All
//! types are serializable to/from JSON for storage in redb tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a policy (`{namespace}/{name}`).
pub type PolicyId = String;

// ── Policy ─────────────────────────────────────────────────────────

/// Operator-declared set of time-based scaling jobs bound to one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    pub namespace: String,
    pub name: String,
    /// The object to scale; it lives in the policy's namespace.
    pub target_ref: TargetRef,
    /// Evaluated in declaration order.
    pub jobs: Vec<JobSpec>,
    /// Whole-day exclusion patterns (six-field cron, only day-of-month and
    /// month are significant).
    #[serde(default)]
    pub exclude_dates: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reference to the scaled object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetRef {
    /// "Deployment", "StatefulSet", "HorizontalPodAutoscaler", ...
    pub kind: String,
    pub api_version: String,
    pub name: String,
}

/// One schedule + desired-size rule within a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSpec {
    /// Unique within the policy.
    pub name: String,
    /// Six-field cron expression or `@date YYYY-MM-DD HH:MM:SS`.
    pub schedule: String,
    pub target_size: u32,
    #[serde(default)]
    pub run_once: bool,
}

impl ScalingPolicy {
    /// Policy identity, also the key in the policies table.
    pub fn id(&self) -> PolicyId {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn table_key(&self) -> String {
        self.id()
    }

    /// Key of the scaled object in the objects table.
    pub fn target_key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.target_ref.kind.clone(),
            namespace: self.namespace.clone(),
            name: self.target_ref.name.clone(),
        }
    }
}

// ── Job run records ────────────────────────────────────────────────

/// Durable memory of a job's firings, keyed by (policy, job name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRunRecord {
    pub policy_id: PolicyId,
    pub job_name: String,
    /// Scheduled instant of the last recorded firing.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Wall-clock time at which that firing was applied.
    pub last_fired_at: Option<DateTime<Utc>>,
    /// Set once a run-once (or one-shot) job has fired.
    pub completed: bool,
}

impl JobRunRecord {
    pub fn new(policy_id: &str, job_name: &str) -> Self {
        Self {
            policy_id: policy_id.to_string(),
            job_name: job_name.to_string(),
            scheduled_at: None,
            last_fired_at: None,
            completed: false,
        }
    }

    /// Build the composite key for the job runs table.
    pub fn table_key(&self) -> String {
        job_run_key(&self.policy_id, &self.job_name)
    }

    /// Whether a firing at or after `scheduled` has already been recorded.
    pub fn covers(&self, scheduled: DateTime<Utc>) -> bool {
        self.scheduled_at.is_some_and(|s| s >= scheduled)
    }
}

pub fn job_run_key(policy_id: &str, job_name: &str) -> String {
    format!("{policy_id}:{job_name}")
}

// ── Status ─────────────────────────────────────────────────────────

/// Status sub-resource of a policy, rewritten after every evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyStatus {
    pub policy_id: PolicyId,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    pub name: String,
    pub schedule: String,
    pub target_size: u32,
    pub run_once: bool,
    pub state: JobState,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub last_error: Option<String>,
}

/// Outcome of the most recent evaluation of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Not due yet (or nothing fired so far).
    Pending,
    /// Fired and applied successfully.
    Succeeded,
    /// Fired but the mutation failed; retried next tick.
    Failed,
    /// Schedule or target is unusable until the policy is edited.
    Invalid,
    /// The current day is excluded.
    Excluded,
    /// Run-once job that has already fired.
    Completed,
}

impl PolicyStatus {
    pub fn new(policy_id: &str) -> Self {
        Self {
            policy_id: policy_id.to_string(),
            last_evaluated_at: None,
            jobs: Vec::new(),
        }
    }

    pub fn job(&self, name: &str) -> Option<&JobStatus> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

// ── Scalable objects ───────────────────────────────────────────────

/// Identity of a scalable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn table_key(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.table_key())
    }
}

/// A workload or autoscaler as served by the object store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalableObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    /// Bumped on every write; used for optimistic concurrency.
    #[serde(default)]
    pub resource_version: u64,
    pub spec: ObjectSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectSpec {
    /// A replica-counted workload (deployment, stateful set).
    Replicas { replicas: u32 },
    /// A metric-driven autoscaler and the replica count it currently holds.
    Autoscaler {
        min_replicas: u32,
        max_replicas: u32,
        current_replicas: u32,
    },
}

impl ScalableObject {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.kind, &self.namespace, &self.name)
    }

    pub fn table_key(&self) -> String {
        self.key().table_key()
    }
}

/// A full-overwrite mutation of a scalable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectPatch {
    /// Set the desired replica count of a workload.
    Replicas { replicas: u32 },
    /// Set the allowed range of an autoscaler.
    Bounds { min_replicas: u32, max_replicas: u32 },
}
