//! CronScaler: the reconcile tick loop.
//!
//! Each tick lists every policy from the state store and evaluates them
//! concurrently: select the due jobs, resolve the target once, apply each due
//! job in declaration order, record successful firings and write the policy
//! status. Failures stay local to their job or policy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cronscale_state::{JobState, JobStatus, PolicyId, PolicyStatus, ScalingPolicy, StateStore};
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::error::ControllerResult;
use crate::object_api::ObjectApi;
use crate::policy::{CompiledJob, CompiledPolicy, PolicyCache};
use crate::reconciler::ScaleReconciler;
use crate::selector::{DueJobSelector, Selection};
use crate::target::TargetResolver;
use crate::tracker::JobTracker;

/// Result of evaluating one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Evaluated { fired: usize, failed: usize },
    /// Another evaluation of the same policy was still running.
    Busy,
}

/// Totals for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub busy: usize,
    pub fired: usize,
    pub failed_jobs: usize,
    pub failed_policies: usize,
}

pub struct CronScaler {
    store: StateStore,
    resolver: TargetResolver,
    selector: DueJobSelector,
    reconciler: ScaleReconciler,
    config: ControllerConfig,
    policies: PolicyCache,
    /// Serializes evaluations of the same policy.
    locks: DashMap<PolicyId, Arc<Mutex<()>>>,
}

impl CronScaler {
    pub fn new(store: StateStore, api: Arc<dyn ObjectApi>, config: ControllerConfig) -> Self {
        let tracker = JobTracker::new(store.clone());
        Self {
            selector: DueJobSelector::new(
                tracker,
                config.misfire_grace,
                config.one_shot_on_excluded_day,
            ),
            resolver: TargetResolver::new(api),
            reconciler: ScaleReconciler::new(config.apply_timeout),
            store,
            config,
            policies: PolicyCache::new(),
            locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Evaluate every policy at `now`.
    pub async fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> ControllerResult<TickReport> {
        let policies = self.store.list_policies()?;
        let live: Vec<PolicyId> = policies.iter().map(|p| p.id()).collect();
        self.policies.retain_ids(&live);
        self.locks.retain(|id, _| live.contains(id));

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_policies));
        let mut tasks = JoinSet::new();
        for policy in policies {
            let this = Arc::clone(self);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let id = policy.id();
                (id, this.evaluate_policy(&policy, now).await)
            });
        }

        let mut report = TickReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(PolicyOutcome::Evaluated { fired, failed }))) => {
                    report.evaluated += 1;
                    report.fired += fired;
                    report.failed_jobs += failed;
                }
                Ok((_, Ok(PolicyOutcome::Busy))) => report.busy += 1,
                Ok((id, Err(e))) => {
                    report.failed_policies += 1;
                    error!(policy = %id, error = %e, "policy evaluation failed");
                }
                Err(e) => {
                    report.failed_policies += 1;
                    error!(error = %e, "policy evaluation task panicked");
                }
            }
        }

        debug!(
            evaluated = report.evaluated,
            busy = report.busy,
            fired = report.fired,
            failed_jobs = report.failed_jobs,
            failed_policies = report.failed_policies,
            "tick complete"
        );
        Ok(report)
    }

    /// Evaluate one policy at `now` and write its status.
    ///
    /// Returns `Busy` without doing anything if the policy is already being
    /// evaluated.
    pub async fn evaluate_policy(
        &self,
        policy: &ScalingPolicy,
        now: DateTime<Utc>,
    ) -> ControllerResult<PolicyOutcome> {
        let id = policy.id();
        let lock = Arc::clone(self.locks.entry(id.clone()).or_default().value());
        let Ok(_guard) = lock.try_lock() else {
            debug!(policy = %id, "policy busy, skipping");
            return Ok(PolicyOutcome::Busy);
        };

        let compiled = self.policies.get_or_compile(policy, self.config.timezone);
        let selection = self.selector.select_due(&compiled, now)?;
        let previous = self.store.get_policy_status(&id)?;
        let mut status = self.base_status(&compiled, previous.as_ref())?;

        let mut fired = 0;
        let mut failed = 0;
        match &selection {
            Selection::Invalid(e) => {
                warn!(policy = %id, error = %e, "exclusion list invalid, policy suspended");
                for job in &mut status.jobs {
                    job.state = JobState::Invalid;
                    job.last_error = Some(e.to_string());
                }
            }
            Selection::Excluded { .. } => {
                for job in &mut status.jobs {
                    if !matches!(job.state, JobState::Invalid | JobState::Completed) {
                        job.state = JobState::Excluded;
                    }
                }
            }
            Selection::Due(due) if !due.is_empty() => {
                match self.resolver.resolve(&policy.namespace, &policy.target_ref) {
                    Err(e) => {
                        warn!(policy = %id, error = %e, "target unresolvable");
                        for d in due {
                            failed += 1;
                            status.jobs[d.index].state = JobState::Failed;
                            status.jobs[d.index].last_error = Some(e.to_string());
                        }
                    }
                    Ok(target) => {
                        for d in due {
                            let job = &compiled.jobs[d.index];
                            let job_status = &mut status.jobs[d.index];
                            // An unrecorded firing is a job failure: the
                            // instant stays due and is retried next tick.
                            let applied = self
                                .reconciler
                                .reconcile(target.as_ref(), job.spec.target_size)
                                .await
                                .and_then(|_| {
                                    self.selector
                                        .tracker()
                                        .record_fired(&id, job, d.scheduled_at, now)
                                });
                            match applied {
                                Ok(_) => {
                                    fired += 1;
                                    info!(
                                        policy = %id,
                                        job = job.name(),
                                        target_size = job.spec.target_size,
                                        scheduled_at = %d.scheduled_at,
                                        "job fired"
                                    );
                                    job_status.state = if job.run_once() {
                                        JobState::Completed
                                    } else {
                                        JobState::Succeeded
                                    };
                                    job_status.last_fired_at = Some(now);
                                    job_status.completed = job.run_once();
                                    job_status.last_error = None;
                                }
                                Err(e) => {
                                    failed += 1;
                                    warn!(
                                        policy = %id,
                                        job = job.name(),
                                        retryable = e.is_retryable(),
                                        error = %e,
                                        "job failed"
                                    );
                                    job_status.state = JobState::Failed;
                                    job_status.last_error = Some(e.to_string());
                                }
                            }
                        }
                    }
                }
            }
            Selection::Due(_) => {}
        }

        status.last_evaluated_at = Some(now);
        // A policy deleted mid-evaluation must not get its status back.
        if self.store.get_policy(&id)?.is_some() {
            self.store.put_policy_status(&status)?;
        }
        Ok(PolicyOutcome::Evaluated { fired, failed })
    }

    /// Status of every job before this evaluation's firings: static fields
    /// from the policy definition, firing history from the run records, and the last
    /// state for jobs that are neither invalid nor completed.
    fn base_status(
        &self,
        compiled: &CompiledPolicy,
        previous: Option<&PolicyStatus>,
    ) -> ControllerResult<PolicyStatus> {
        let id = compiled.id();
        let mut status = PolicyStatus::new(&id);
        for job in &compiled.jobs {
            let record = self.selector.tracker().record(&id, job.name())?;
            let last = previous.and_then(|p| p.job(job.name()));
            status.jobs.push(job_status(job, record.as_ref(), last));
        }
        Ok(status)
    }

    /// Run the tick loop until `shutdown` flips. A tick in progress always
    /// completes.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            grace_secs = self.config.misfire_grace.as_secs(),
            timezone = %self.config.timezone.name(),
            "cron scaler started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("cron scaler shutting down");
                    break;
                }
            }
        }
    }
}

fn job_status(
    job: &CompiledJob,
    record: Option<&cronscale_state::JobRunRecord>,
    last: Option<&JobStatus>,
) -> JobStatus {
    let completed = record.is_some_and(|r| r.completed);
    let (state, last_error) = match (&job.schedule, last) {
        (Err(e), _) => (JobState::Invalid, Some(e.to_string())),
        (Ok(_), _) if completed => (JobState::Completed, None),
        (Ok(_), Some(prev))
            if prev.schedule == job.spec.schedule
                && matches!(prev.state, JobState::Succeeded | JobState::Failed) =>
        {
            (prev.state, prev.last_error.clone())
        }
        (Ok(_), _) => (JobState::Pending, None),
    };
    JobStatus {
        name: job.spec.name.clone(),
        schedule: job.spec.schedule.clone(),
        target_size: job.spec.target_size,
        run_once: job.run_once(),
        state,
        last_fired_at: record.and_then(|r| r.last_fired_at),
        completed,
        last_error,
    }
}
