//! Due-job selection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use cronscale_core::ExcludedOneShot;
use cronscale_schedule::ScheduleParseError;
use tracing::debug;

use crate::error::ControllerResult;
use crate::policy::CompiledPolicy;
use crate::tracker::JobTracker;

/// A job that should fire now, and the scheduled instant it fires for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueJob {
    /// Position in `CompiledPolicy::jobs`.
    pub index: usize,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Jobs to apply, in declaration order.
    Due(Vec<DueJob>),
    /// The current calendar day is excluded by `pattern`.
    Excluded { pattern: String },
    /// The exclusion list does not parse; nothing fires.
    Invalid(ScheduleParseError),
}

impl Selection {
    pub fn due(&self) -> &[DueJob] {
        match self {
            Selection::Due(jobs) => jobs,
            _ => &[],
        }
    }
}

#[derive(Clone)]
pub struct DueJobSelector {
    tracker: JobTracker,
    grace: Duration,
    on_excluded_day: ExcludedOneShot,
}

impl DueJobSelector {
    pub fn new(tracker: JobTracker, grace: Duration, on_excluded_day: ExcludedOneShot) -> Self {
        Self {
            tracker,
            grace,
            on_excluded_day,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Compute the jobs of `policy` due at `now`.
    pub fn select_due(&self, policy: &CompiledPolicy, now: DateTime<Utc>) -> ControllerResult<Selection> {
        let exclusions = match &policy.exclusions {
            Ok(set) => set,
            Err(e) => return Ok(Selection::Invalid(e.clone())),
        };

        let today = now.with_timezone(&policy.tz).date_naive();
        if let Some(pattern) = exclusions.matching(today) {
            debug!(policy = %policy.id(), %today, pattern = pattern.source(), "day excluded");
            return Ok(Selection::Excluded {
                pattern: pattern.source().to_string(),
            });
        }

        let id = policy.id();
        let mut due = Vec::new();
        for (index, job) in policy.jobs.iter().enumerate() {
            let Ok(schedule) = &job.schedule else {
                continue;
            };

            let excluded_instant = |at: DateTime<Utc>| exclusions.excludes(at, policy.tz);

            // An instant that fell on an excluded day stays suppressed even
            // when the grace window carries it past midnight.
            let next = self
                .tracker
                .should_fire(&id, job, now, self.grace)?
                .filter(|at| !excluded_instant(*at));

            let scheduled_at = match next {
                Some(at) => Some(at),
                None if self.on_excluded_day == ExcludedOneShot::Defer => {
                    // A one-shot whose own day was excluded fires at the
                    // first evaluation after the exclusion lifts.
                    match schedule.one_shot_at() {
                        Some(at) if at <= now && excluded_instant(at) => {
                            self.tracker.unrecorded(&id, job.name(), at)?
                        }
                        _ => None,
                    }
                }
                None => None,
            };

            if let Some(scheduled_at) = scheduled_at {
                debug!(policy = %id, job = job.name(), %scheduled_at, "job due");
                due.push(DueJob {
                    index,
                    scheduled_at,
                });
            }
        }
        Ok(Selection::Due(due))
    }
}
