//! HTTP surface of the relay.
//!
//! - /api/user-session(s) — in-memory session CRUD
//! - /api/user-data       — process-wide current user
//! - /dataset/{id}        — dataset read/write through Domo
//! - /domo/...            — token passthrough and embed links
//! - /                    — liveness

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::relay_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
