//! Per-job firing memory.
//!
//! Answers "has this scheduled instant already been applied?" from the
//! durable run records, so a restart neither replays nor skips a firing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use cronscale_state::{FireOutcome, JobRunRecord, StateStore};
use tracing::debug;

use crate::error::ControllerResult;
use crate::policy::CompiledJob;

#[derive(Clone)]
pub struct JobTracker {
    store: StateStore,
}

impl JobTracker {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn record(&self, policy_id: &str, job_name: &str) -> ControllerResult<Option<JobRunRecord>> {
        Ok(self.store.get_job_run(policy_id, job_name)?)
    }

    /// The scheduled instant `job` should fire for at `now`, if any.
    ///
    /// `None` when the schedule is invalid, nothing is scheduled in
    /// `(now - grace, now]`, the instant was already recorded, or a
    /// run-once job has completed.
    pub fn should_fire(
        &self,
        policy_id: &str,
        job: &CompiledJob,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> ControllerResult<Option<DateTime<Utc>>> {
        let Ok(schedule) = &job.schedule else {
            return Ok(None);
        };
        let Some(due) = schedule.latest_due(now, grace) else {
            return Ok(None);
        };
        self.unrecorded(policy_id, job.name(), due)
    }

    /// `Some(due)` unless the run record already covers `due`.
    pub fn unrecorded(
        &self,
        policy_id: &str,
        job_name: &str,
        due: DateTime<Utc>,
    ) -> ControllerResult<Option<DateTime<Utc>>> {
        match self.record(policy_id, job_name)? {
            Some(record) if record.completed || record.covers(due) => Ok(None),
            _ => Ok(Some(due)),
        }
    }

    /// Record a successful application of `job` for `scheduled_at`.
    ///
    /// Returns `false` when another evaluation recorded it first or the
    /// policy no longer exists.
    pub fn record_fired(
        &self,
        policy_id: &str,
        job: &CompiledJob,
        scheduled_at: DateTime<Utc>,
        fired_at: DateTime<Utc>,
    ) -> ControllerResult<bool> {
        let outcome = self.store.record_job_fired(
            policy_id,
            job.name(),
            scheduled_at,
            fired_at,
            job.run_once(),
        )?;
        match outcome {
            FireOutcome::Recorded(_) => Ok(true),
            FireOutcome::AlreadyRecorded(record) => {
                debug!(
                    policy = policy_id,
                    job = job.name(),
                    recorded = ?record.scheduled_at,
                    "firing already recorded"
                );
                Ok(false)
            }
            FireOutcome::PolicyMissing => {
                debug!(policy = policy_id, job = job.name(), "policy deleted, firing not recorded");
                Ok(false)
            }
        }
    }
}
