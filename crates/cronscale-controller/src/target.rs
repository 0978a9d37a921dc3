//! Target resolution.
//!
//! Maps a policy's target reference to something that can be read and
//! mutated. Two shapes exist: workloads whose replica count is set directly,
//! and autoscalers whose allowed range is adjusted instead.

use std::sync::Arc;

use async_trait::async_trait;
use cronscale_state::{ObjectKey, ObjectPatch, ObjectSpec, ScalableObject, TargetRef};

use crate::error::{ControllerError, ControllerResult};
use crate::object_api::ObjectApi;
use crate::reconciler::ScaleDecision;

/// How a target kind is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    DirectReplicas,
    BoundAdjustable,
}

impl TargetClass {
    pub fn for_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" | "StatefulSet" => Some(TargetClass::DirectReplicas),
            "HorizontalPodAutoscaler" => Some(TargetClass::BoundAdjustable),
            _ => None,
        }
    }
}

/// Read-only view of a target at reconciliation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Replicas {
        current: u32,
    },
    Bounds {
        min: u32,
        max: u32,
        current: u32,
    },
}

impl TargetState {
    pub fn current_replicas(&self) -> u32 {
        match *self {
            TargetState::Replicas { current } | TargetState::Bounds { current, .. } => current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSnapshot {
    pub state: TargetState,
    pub resource_version: u64,
}

/// Read/apply capability shared by every target kind.
#[async_trait]
pub trait ScaleTarget: Send + Sync {
    fn key(&self) -> &ObjectKey;

    fn class(&self) -> TargetClass;

    async fn read(&self) -> ControllerResult<TargetSnapshot>;

    /// Issue `decision` as a full overwrite. With `expected_version` set the
    /// write fails with a conflict if the object moved since it was read.
    async fn apply(
        &self,
        decision: &ScaleDecision,
        expected_version: Option<u64>,
    ) -> ControllerResult<TargetSnapshot>;
}

/// A deployment or stateful set: replicas are set directly.
pub struct ReplicaTarget {
    key: ObjectKey,
    api: Arc<dyn ObjectApi>,
}

impl ReplicaTarget {
    fn snapshot(&self, object: &ScalableObject) -> ControllerResult<TargetSnapshot> {
        match object.spec {
            ObjectSpec::Replicas { replicas } => Ok(TargetSnapshot {
                state: TargetState::Replicas { current: replicas },
                resource_version: object.resource_version,
            }),
            ObjectSpec::Autoscaler { .. } => Err(ControllerError::UnexpectedObject {
                key: self.key.clone(),
                expected: "replica-counted workload",
            }),
        }
    }
}

#[async_trait]
impl ScaleTarget for ReplicaTarget {
    fn key(&self) -> &ObjectKey {
        &self.key
    }

    fn class(&self) -> TargetClass {
        TargetClass::DirectReplicas
    }

    async fn read(&self) -> ControllerResult<TargetSnapshot> {
        let object = self.api.get(&self.key).await?;
        self.snapshot(&object)
    }

    async fn apply(
        &self,
        decision: &ScaleDecision,
        expected_version: Option<u64>,
    ) -> ControllerResult<TargetSnapshot> {
        let ScaleDecision::Replicas { new_replicas } = *decision else {
            return Err(ControllerError::UnexpectedObject {
                key: self.key.clone(),
                expected: "autoscaler",
            });
        };
        let patch = ObjectPatch::Replicas {
            replicas: new_replicas,
        };
        let object = self.api.patch(&self.key, patch, expected_version).await?;
        self.snapshot(&object)
    }
}

/// An autoscaler: only its min/max range is written. Its own metric loop
/// moves the replica count into the new range.
pub struct AutoscalerTarget {
    key: ObjectKey,
    api: Arc<dyn ObjectApi>,
}

impl AutoscalerTarget {
    fn snapshot(&self, object: &ScalableObject) -> ControllerResult<TargetSnapshot> {
        match object.spec {
            ObjectSpec::Autoscaler {
                min_replicas,
                max_replicas,
                current_replicas,
            } => Ok(TargetSnapshot {
                state: TargetState::Bounds {
                    min: min_replicas,
                    max: max_replicas,
                    current: current_replicas,
                },
                resource_version: object.resource_version,
            }),
            ObjectSpec::Replicas { .. } => Err(ControllerError::UnexpectedObject {
                key: self.key.clone(),
                expected: "autoscaler",
            }),
        }
    }
}

#[async_trait]
impl ScaleTarget for AutoscalerTarget {
    fn key(&self) -> &ObjectKey {
        &self.key
    }

    fn class(&self) -> TargetClass {
        TargetClass::BoundAdjustable
    }

    async fn read(&self) -> ControllerResult<TargetSnapshot> {
        let object = self.api.get(&self.key).await?;
        self.snapshot(&object)
    }

    async fn apply(
        &self,
        decision: &ScaleDecision,
        expected_version: Option<u64>,
    ) -> ControllerResult<TargetSnapshot> {
        let ScaleDecision::Bounds { new_min, new_max } = *decision else {
            return Err(ControllerError::UnexpectedObject {
                key: self.key.clone(),
                expected: "replica-counted workload",
            });
        };
        let patch = ObjectPatch::Bounds {
            min_replicas: new_min,
            max_replicas: new_max,
        };
        let object = self.api.patch(&self.key, patch, expected_version).await?;
        self.snapshot(&object)
    }
}

/// Builds `ScaleTarget`s from target references.
#[derive(Clone)]
pub struct TargetResolver {
    api: Arc<dyn ObjectApi>,
}

impl TargetResolver {
    pub fn new(api: Arc<dyn ObjectApi>) -> Self {
        Self { api }
    }

    /// Resolve `target` in `namespace`. Unknown kinds fail with
    /// `UnsupportedTargetKind` without touching the API.
    pub fn resolve(&self, namespace: &str, target: &TargetRef) -> ControllerResult<Box<dyn ScaleTarget>> {
        let key = ObjectKey::new(&target.kind, namespace, &target.name);
        let api = Arc::clone(&self.api);
        match TargetClass::for_kind(&target.kind) {
            Some(TargetClass::DirectReplicas) => Ok(Box::new(ReplicaTarget { key, api })),
            Some(TargetClass::BoundAdjustable) => Ok(Box::new(AutoscalerTarget { key, api })),
            None => Err(ControllerError::UnsupportedTargetKind(target.kind.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use cronscale_state::StateStore;

    fn target_ref(kind: &str, name: &str) -> TargetRef {
        TargetRef {
            kind: kind.to_string(),
            api_version: "apps/v1".to_string(),
            name: name.to_string(),
        }
    }

    fn setup() -> (StateStore, TargetResolver) {
        let store = StateStore::open_in_memory().unwrap();
        let resolver = TargetResolver::new(Arc::new(store.clone()));
        (store, resolver)
    }

    fn object(kind: &str, name: &str, spec: ObjectSpec) -> ScalableObject {
        ScalableObject {
            kind: kind.to_string(),
            namespace: "default".to_string(),
            name: name.to_string(),
            resource_version: 0,
            spec,
        }
    }

    #[test]
    fn kind_classification() {
        assert_eq!(TargetClass::for_kind("Deployment"), Some(TargetClass::DirectReplicas));
        assert_eq!(TargetClass::for_kind("StatefulSet"), Some(TargetClass::DirectReplicas));
        assert_eq!(
            TargetClass::for_kind("HorizontalPodAutoscaler"),
            Some(TargetClass::BoundAdjustable)
        );
        assert_eq!(TargetClass::for_kind("CronJob"), None);
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let (_, resolver) = setup();
        let err = resolver
            .resolve("default", &target_ref("CronJob", "nightly"))
            .err()
            .unwrap();
        assert!(matches!(err, ControllerError::UnsupportedTargetKind(k) if k == "CronJob"));
    }

    #[tokio::test]
    async fn statefulset_reads_and_sets_replicas() {
        let (store, resolver) = setup();
        store
            .put_object(&object("StatefulSet", "db", ObjectSpec::Replicas { replicas: 1 }))
            .unwrap();

        let target = resolver.resolve("default", &target_ref("StatefulSet", "db")).unwrap();
        let snap = target.read().await.unwrap();
        assert_eq!(snap.state, TargetState::Replicas { current: 1 });

        let after = target
            .apply(&ScaleDecision::Replicas { new_replicas: 3 }, Some(snap.resource_version))
            .await
            .unwrap();
        assert_eq!(after.state, TargetState::Replicas { current: 3 });
    }

    #[tokio::test]
    async fn autoscaler_apply_writes_bounds_only() {
        let (store, resolver) = setup();
        store
            .put_object(&object(
                "HorizontalPodAutoscaler",
                "web",
                ObjectSpec::Autoscaler {
                    min_replicas: 1,
                    max_replicas: 10,
                    current_replicas: 5,
                },
            ))
            .unwrap();

        let target = resolver
            .resolve("default", &target_ref("HorizontalPodAutoscaler", "web"))
            .unwrap();
        let after = target
            .apply(&ScaleDecision::Bounds { new_min: 6, new_max: 10 }, None)
            .await
            .unwrap();
        assert_eq!(
            after.state,
            TargetState::Bounds {
                min: 6,
                max: 10,
                current: 5
            }
        );
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let (_, resolver) = setup();
        let target = resolver.resolve("default", &target_ref("Deployment", "gone")).unwrap();
        let err = target.read().await.unwrap_err();
        assert!(matches!(err, ControllerError::Api(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn kind_and_stored_shape_must_agree() {
        let (store, resolver) = setup();
        store
            .put_object(&object("Deployment", "web", ObjectSpec::Autoscaler {
                min_replicas: 1,
                max_replicas: 2,
                current_replicas: 1,
            }))
            .unwrap();
        let target = resolver.resolve("default", &target_ref("Deployment", "web")).unwrap();
        assert!(matches!(
            target.read().await,
            Err(ControllerError::UnexpectedObject { .. })
        ));
    }
}
