//! cronscale-api: REST API for cronscale.
//!
//! Provides axum route handlers for managing scaling policies, reading their
//! status, and (in standalone mode) the workloads and autoscalers they scale.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/policies` | List all policies |
//! | POST | `/api/v1/policies` | Create or replace a policy |
//! | GET | `/api/v1/policies/{namespace}/{name}` | Get a policy |
//! | DELETE | `/api/v1/policies/{namespace}/{name}` | Delete a policy and its run history |
//! | GET | `/api/v1/policies/{namespace}/{name}/status` | Policy status |
//! | GET | `/api/v1/objects` | List objects |
//! | POST | `/api/v1/objects` | Create or replace an object |
//! | GET | `/api/v1/objects/{kind}/{namespace}/{name}` | Get an object |
//! | DELETE | `/api/v1/objects/{kind}/{namespace}/{name}` | Delete an object |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use cronscale_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
}

/// Build the complete API router.
pub fn build_router(store: StateStore) -> Router {
    let api_state = ApiState { store };

    let api_routes = Router::new()
        .route(
            "/policies",
            get(handlers::list_policies).post(handlers::put_policy),
        )
        .route(
            "/policies/{namespace}/{name}",
            get(handlers::get_policy).delete(handlers::delete_policy),
        )
        .route(
            "/policies/{namespace}/{name}/status",
            get(handlers::get_policy_status),
        )
        .route(
            "/objects",
            get(handlers::list_objects).post(handlers::put_object),
        )
        .route(
            "/objects/{kind}/{namespace}/{name}",
            get(handlers::get_object).delete(handlers::delete_object),
        )
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
