//! Parsed form of a scaling policy.
//!
//! Schedules and exclusions are parsed once per policy revision and cached,
//! so a tick only re-parses what changed.

use chrono_tz::Tz;
use cronscale_schedule::{ExclusionSet, JobSchedule, ScheduleParseError};
use cronscale_state::{JobSpec, PolicyId, ScalingPolicy};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// A job together with the result of parsing its schedule.
#[derive(Debug, Clone)]
pub struct CompiledJob {
    pub spec: JobSpec,
    pub schedule: Result<JobSchedule, ScheduleParseError>,
}

impl CompiledJob {
    pub fn compile(spec: &JobSpec, tz: Tz) -> Self {
        Self {
            spec: spec.clone(),
            schedule: JobSchedule::parse(&spec.schedule, tz),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// One-shot schedules can only fire once, flagged or not.
    pub fn run_once(&self) -> bool {
        self.spec.run_once
            || self
                .schedule
                .as_ref()
                .is_ok_and(|schedule| schedule.is_one_shot())
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub policy: ScalingPolicy,
    pub jobs: Vec<CompiledJob>,
    /// A malformed exclusion list invalidates the whole policy.
    pub exclusions: Result<ExclusionSet, ScheduleParseError>,
    pub tz: Tz,
}

impl CompiledPolicy {
    pub fn compile(policy: &ScalingPolicy, tz: Tz) -> Self {
        Self {
            policy: policy.clone(),
            jobs: policy
                .jobs
                .iter()
                .map(|job| CompiledJob::compile(job, tz))
                .collect(),
            exclusions: ExclusionSet::parse(&policy.exclude_dates),
            tz,
        }
    }

    pub fn id(&self) -> PolicyId {
        self.policy.id()
    }

    /// Whether `policy` parses to the same schedules as this one.
    fn same_revision(&self, policy: &ScalingPolicy) -> bool {
        self.policy.jobs == policy.jobs && self.policy.exclude_dates == policy.exclude_dates
    }
}

/// Compiled policies keyed by policy id.
#[derive(Debug, Default)]
pub struct PolicyCache {
    entries: DashMap<PolicyId, Arc<CompiledPolicy>>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled form of `policy`, parsing it only when its jobs or
    /// exclusions changed since the last call.
    pub fn get_or_compile(&self, policy: &ScalingPolicy, tz: Tz) -> Arc<CompiledPolicy> {
        let id = policy.id();
        let cached = self
            .entries
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|entry| entry.tz == tz && entry.same_revision(policy));
        if let Some(entry) = cached {
            if entry.policy.target_ref == policy.target_ref {
                return entry;
            }
            // Only the target moved; the schedules are still good.
            let mut updated = CompiledPolicy::clone(&entry);
            updated.policy = policy.clone();
            let updated = Arc::new(updated);
            self.entries.insert(id, Arc::clone(&updated));
            return updated;
        }

        let compiled = Arc::new(CompiledPolicy::compile(policy, tz));
        debug!(
            policy = %id,
            jobs = compiled.jobs.len(),
            exclusions = compiled.exclusions.as_ref().map_or(0, |set| set.len()),
            "policy compiled"
        );
        self.entries.insert(id, Arc::clone(&compiled));
        compiled
    }

    /// Drop entries whose policy no longer exists.
    pub fn retain_ids<'a>(&self, live: impl IntoIterator<Item = &'a PolicyId>) {
        let live: std::collections::HashSet<&PolicyId> = live.into_iter().collect();
        self.entries.retain(|id, _| live.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
