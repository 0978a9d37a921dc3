//! Scale reconciliation.
//!
//! Turns a due job's target size and the target's current state into one
//! full-overwrite mutation. Direct-replica targets get the size verbatim;
//! autoscalers get a new min/max range and converge on their own.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ApiError, ControllerResult};
use crate::target::{ScaleTarget, TargetSnapshot, TargetState};

/// The reconciler's pure output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    Replicas { new_replicas: u32 },
    Bounds { new_min: u32, new_max: u32 },
}

impl ScaleDecision {
    /// Whether applying this decision would leave `state` unchanged.
    pub fn is_noop(&self, state: &TargetState) -> bool {
        match (*self, *state) {
            (ScaleDecision::Replicas { new_replicas }, TargetState::Replicas { current }) => {
                new_replicas == current
            }
            (ScaleDecision::Bounds { new_min, new_max }, TargetState::Bounds { min, max, .. }) => {
                new_min == min && new_max == max
            }
            _ => false,
        }
    }
}

/// New autoscaler range for a declared `target`.
///
/// The ceiling only widens. The floor moves to `target` when the autoscaler
/// currently provides less than `target`, or when the old floor sits above
/// it; otherwise the range is left alone.
pub fn adjust_bounds(old_min: u32, old_max: u32, current: u32, target: u32) -> (u32, u32) {
    let new_max = old_max.max(target);
    let raise_floor = target < old_min || target > current;
    let new_min = if raise_floor { target } else { old_min };
    (new_min.min(new_max), new_max)
}

/// Replica count an autoscaler settles on once it honours `min..=max`.
pub fn settled_replicas(current: u32, min: u32, max: u32) -> u32 {
    current.max(min).min(max)
}

pub fn decide(target_size: u32, state: &TargetState) -> ScaleDecision {
    match *state {
        TargetState::Replicas { .. } => ScaleDecision::Replicas {
            new_replicas: target_size,
        },
        TargetState::Bounds { min, max, current } => {
            let (new_min, new_max) = adjust_bounds(min, max, current, target_size);
            ScaleDecision::Bounds { new_min, new_max }
        }
    }
}

/// What a reconcile did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub decision: ScaleDecision,
    pub before: TargetSnapshot,
    /// `None` when the decision was a no-op and nothing was written.
    pub after: Option<TargetSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ScaleReconciler {
    apply_timeout: Duration,
}

impl ScaleReconciler {
    pub fn new(apply_timeout: Duration) -> Self {
        Self { apply_timeout }
    }

    /// Read `target`, decide, and apply guarded by the read's version.
    pub async fn reconcile(&self, target: &dyn ScaleTarget, target_size: u32) -> ControllerResult<Reconciled> {
        let key = target.key().clone();
        let before = self.bounded("read", target.read()).await?;
        let decision = decide(target_size, &before.state);

        if decision.is_noop(&before.state) {
            debug!(target = %key, ?decision, "target already at desired state");
            return Ok(Reconciled {
                decision,
                before,
                after: None,
            });
        }

        let after = self
            .bounded("apply", target.apply(&decision, Some(before.resource_version)))
            .await?;
        info!(
            target = %key,
            class = ?target.class(),
            current = before.state.current_replicas(),
            ?decision,
            before = ?before.state,
            after = ?after.state,
            "scale decision applied"
        );
        Ok(Reconciled {
            decision,
            before,
            after: Some(after),
        })
    }

    async fn bounded<T>(
        &self,
        op: &str,
        fut: impl Future<Output = ControllerResult<T>>,
    ) -> ControllerResult<T> {
        match tokio::time::timeout(self.apply_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transient(format!(
                "{op} timed out after {:?}",
                self.apply_timeout
            ))
            .into()),
        }
    }
}
