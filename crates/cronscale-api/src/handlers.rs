//! REST API handlers.
//!
//! Each handler reads/writes via `StateStore` and returns JSON responses.

use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use cronscale_state::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal(e: StateError) -> axum::response::Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

// ── Policies ───────────────────────────────────────────────────

/// Policy body accepted by `POST /api/v1/policies`. Timestamps are managed
/// by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRequest {
    pub namespace: String,
    pub name: String,
    pub target_ref: TargetRef,
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub exclude_dates: Vec<String>,
}

impl PolicyRequest {
    /// Structural checks only. Schedule syntax is reported through the
    /// policy status, not rejected here.
    fn validate(&self) -> Result<(), String> {
        if self.namespace.is_empty() || self.name.is_empty() {
            return Err("namespace and name are required".to_string());
        }
        if self.target_ref.kind.is_empty() || self.target_ref.name.is_empty() {
            return Err("target_ref.kind and target_ref.name are required".to_string());
        }
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.is_empty() {
                return Err("job names must not be empty".to_string());
            }
            if !seen.insert(job.name.as_str()) {
                return Err(format!("duplicate job name {:?}", job.name));
            }
        }
        Ok(())
    }
}

/// GET /api/v1/policies
pub async fn list_policies(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_policies() {
        Ok(policies) => ApiResponse::ok(policies).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/policies/{namespace}/{name}
pub async fn get_policy(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_policy(&format!("{namespace}/{name}")) {
        Ok(Some(policy)) => ApiResponse::ok(policy).into_response(),
        Ok(None) => error_response("policy not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/policies
///
/// Replacing an existing policy keeps its creation time and its run
/// records, so completed run-once jobs stay completed across edits.
pub async fn put_policy(
    State(state): State<ApiState>,
    Json(req): Json<PolicyRequest>,
) -> impl IntoResponse {
    if let Err(msg) = req.validate() {
        return error_response(&msg, StatusCode::BAD_REQUEST).into_response();
    }

    let id = format!("{}/{}", req.namespace, req.name);
    let existing = match state.store.get_policy(&id) {
        Ok(existing) => existing,
        Err(e) => return internal(e),
    };
    let now = Utc::now();
    let policy = ScalingPolicy {
        namespace: req.namespace,
        name: req.name,
        target_ref: req.target_ref,
        jobs: req.jobs,
        exclude_dates: req.exclude_dates,
        created_at: existing.as_ref().map_or(now, |p| p.created_at),
        updated_at: now,
    };

    match state.store.put_policy(&policy) {
        Ok(()) => {
            info!(policy = %id, jobs = policy.jobs.len(), replaced = existing.is_some(), "policy saved");
            let status = if existing.is_some() {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, ApiResponse::ok(policy)).into_response()
        }
        Err(e) => internal(e),
    }
}

/// DELETE /api/v1/policies/{namespace}/{name}
pub async fn delete_policy(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let id = format!("{namespace}/{name}");
    match state.store.delete_policy(&id) {
        Ok(true) => {
            info!(policy = %id, "policy deleted");
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("policy not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/policies/{namespace}/{name}/status
///
/// A policy that has not been evaluated yet reports an empty status.
pub async fn get_policy_status(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let id = format!("{namespace}/{name}");
    match state.store.get_policy(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response("policy not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => return internal(e),
    }
    match state.store.get_policy_status(&id) {
        Ok(status) => ApiResponse::ok(status.unwrap_or_else(|| PolicyStatus::new(&id))).into_response(),
        Err(e) => internal(e),
    }
}

// ── Objects ────────────────────────────────────────────────────

/// GET /api/v1/objects
pub async fn list_objects(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_objects() {
        Ok(objects) => ApiResponse::ok(objects).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/objects/{kind}/{namespace}/{name}
pub async fn get_object(
    State(state): State<ApiState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> impl IntoResponse {
    match state.store.get_object(&ObjectKey::new(&kind, &namespace, &name)) {
        Ok(Some(object)) => ApiResponse::ok(object).into_response(),
        Ok(None) => error_response("object not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/objects
pub async fn put_object(
    State(state): State<ApiState>,
    Json(object): Json<ScalableObject>,
) -> impl IntoResponse {
    if object.kind.is_empty() || object.namespace.is_empty() || object.name.is_empty() {
        return error_response("kind, namespace and name are required", StatusCode::BAD_REQUEST)
            .into_response();
    }
    if let ObjectSpec::Autoscaler {
        min_replicas,
        max_replicas,
        ..
    } = object.spec
        && min_replicas > max_replicas
    {
        return error_response("min_replicas exceeds max_replicas", StatusCode::BAD_REQUEST)
            .into_response();
    }

    match state.store.put_object(&object) {
        Ok(stored) => {
            let status = if stored.resource_version == 1 {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, ApiResponse::ok(stored)).into_response()
        }
        Err(e) => internal(e),
    }
}

/// DELETE /api/v1/objects/{kind}/{namespace}/{name}
pub async fn delete_object(
    State(state): State<ApiState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> impl IntoResponse {
    match state.store.delete_object(&ObjectKey::new(&kind, &namespace, &name)) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("object not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        ApiState { store }
    }

    fn test_request(ns: &str, name: &str) -> PolicyRequest {
        PolicyRequest {
            namespace: ns.to_string(),
            name: name.to_string(),
            target_ref: TargetRef {
                kind: "Deployment".to_string(),
                api_version: "apps/v1".to_string(),
                name: "web".to_string(),
            },
            jobs: vec![JobSpec {
                name: "scale-up".to_string(),
                schedule: "0 0 8 * * *".to_string(),
                target_size: 5,
                run_once: false,
            }],
            exclude_dates: Vec::new(),
        }
    }

    fn path(ns: &str, name: &str) -> Path<(String, String)> {
        Path((ns.to_string(), name.to_string()))
    }

    #[tokio::test]
    async fn list_policies_empty() {
        let state = test_state();
        let resp = list_policies(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_and_get_policy() {
        let state = test_state();
        let resp = put_policy(State(state.clone()), Json(test_request("default", "web-cron")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = get_policy(State(state.clone()), path("default", "web-cron"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.store.get_policy("default/web-cron").unwrap().is_some());
    }

    #[tokio::test]
    async fn replacing_policy_keeps_created_at() {
        let state = test_state();
        put_policy(State(state.clone()), Json(test_request("default", "web-cron"))).await;
        let first = state.store.get_policy("default/web-cron").unwrap().unwrap();

        let mut edited = test_request("default", "web-cron");
        edited.jobs[0].target_size = 8;
        let resp = put_policy(State(state.clone()), Json(edited)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let second = state.store.get_policy("default/web-cron").unwrap().unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.jobs[0].target_size, 8);
    }

    #[tokio::test]
    async fn duplicate_job_names_rejected() {
        let state = test_state();
        let mut req = test_request("default", "web-cron");
        req.jobs.push(req.jobs[0].clone());
        let resp = put_policy(State(state), Json(req)).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_schedule_is_accepted() {
        let state = test_state();
        let mut req = test_request("default", "web-cron");
        req.jobs[0].schedule = "not cron".to_string();
        let resp = put_policy(State(state), Json(req)).await.into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn get_nonexistent_policy() {
        let state = test_state();
        let resp = get_policy(State(state), path("default", "nope")).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_policy_cascades_runs() {
        let state = test_state();
        put_policy(State(state.clone()), Json(test_request("default", "web-cron"))).await;
        let now = Utc::now();
        state
            .store
            .record_job_fired("default/web-cron", "scale-up", now, now, false)
            .unwrap();

        let resp = delete_policy(State(state.clone()), path("default", "web-cron"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.store.list_job_runs("default/web-cron").unwrap().is_empty());

        let resp = delete_policy(State(state), path("default", "web-cron"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_of_unevaluated_policy_is_empty() {
        let state = test_state();
        put_policy(State(state.clone()), Json(test_request("default", "web-cron"))).await;
        let resp = get_policy_status(State(state.clone()), path("default", "web-cron"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_policy_status(State(state), path("default", "missing"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn object_crud() {
        let state = test_state();
        let object = ScalableObject {
            kind: "StatefulSet".to_string(),
            namespace: "default".to_string(),
            name: "db".to_string(),
            resource_version: 0,
            spec: ObjectSpec::Replicas { replicas: 1 },
        };
        let resp = put_object(State(state.clone()), Json(object.clone()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = put_object(State(state.clone()), Json(object)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let key = || Path(("StatefulSet".to_string(), "default".to_string(), "db".to_string()));
        let resp = get_object(State(state.clone()), key()).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = delete_object(State(state.clone()), key()).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = get_object(State(state), key()).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inverted_autoscaler_bounds_rejected() {
        let state = test_state();
        let object = ScalableObject {
            kind: "HorizontalPodAutoscaler".to_string(),
            namespace: "default".to_string(),
            name: "web".to_string(),
            resource_version: 0,
            spec: ObjectSpec::Autoscaler {
                min_replicas: 5,
                max_replicas: 2,
                current_replicas: 3,
            },
        };
        let resp = put_object(State(state), Json(object)).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
