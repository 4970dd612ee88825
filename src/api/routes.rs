//! Route handlers.
//!
//! All handlers receive `SharedState` via Axum state extraction. Errors are
//! `RelayError`, which renders the JSON error body.

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::RelayError;
use crate::SharedState;

pub fn relay_router(state: SharedState) -> Router {
    Router::new()
        // ── Liveness ─────────────────────────────────────────────────────
        .route("/", get(liveness))
        // ── Sessions ─────────────────────────────────────────────────────
        .route("/api/user-session", post(session_create))
        .route(
            "/api/user-session/{session_id}",
            get(session_get).put(session_update).delete(session_delete),
        )
        .route("/api/user-sessions", get(session_list))
        .route("/api/user-data", get(user_data_get).post(user_data_set))
        // ── Domo ─────────────────────────────────────────────────────────
        .route("/domo/token/{id}", get(domo_token))
        .route("/domo/embed-token/{card_id}", get(domo_embed_token))
        .route(
            "/dataset/{id}",
            get(dataset_get)
                .put(dataset_put)
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(state)
}

/// JSON request body whose parse failures render as `RelayError`.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(RelayError))]
struct JsonBody<T>(T);

async fn liveness() -> &'static str {
    "Domo relay is running"
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody {
    #[serde(default)]
    session_id: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
}

/// Identity fields accepted by session PUT and user-data POST.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityBody {
    user_id: Option<String>,
    user_name: Option<String>,
}

/// POST /api/user-session — Store or overwrite a session.
async fn session_create(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<CreateSessionBody>,
) -> Result<Json<Value>, RelayError> {
    let session = state
        .sessions
        .put(
            body.session_id.as_deref().unwrap_or_default(),
            body.user_id.as_deref(),
            body.user_name.as_deref(),
        )
        .await?;

    Ok(Json(json!({ "success": true, "data": session })))
}

async fn session_get(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let session = state.sessions.get(&session_id).await?;
    Ok(Json(json!({ "data": session })))
}

/// PUT /api/user-session/:sessionId — Same upsert as POST, id from the path.
async fn session_update(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    JsonBody(body): JsonBody<IdentityBody>,
) -> Result<Json<Value>, RelayError> {
    let session = state
        .sessions
        .put(&session_id, body.user_id.as_deref(), body.user_name.as_deref())
        .await?;

    Ok(Json(json!({ "success": true, "data": session })))
}

async fn session_delete(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    if !state.sessions.delete(&session_id).await {
        return Err(RelayError::NotFound("Session".into()));
    }
    Ok(Json(json!({ "success": true, "data": { "sessionId": session_id } })))
}

async fn session_list(State(state): State<SharedState>) -> impl IntoResponse {
    let sessions = state.sessions.list_all().await;
    Json(json!({ "count": sessions.len(), "data": sessions }))
}

async fn user_data_get(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({ "data": state.sessions.current_user().await }))
}

async fn user_data_set(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<IdentityBody>,
) -> impl IntoResponse {
    let data = state
        .sessions
        .set_current_user(body.user_id.as_deref(), body.user_name.as_deref())
        .await;
    Json(json!({ "success": true, "data": data }))
}

// =============================================================================
// Domo
// =============================================================================

/// GET /domo/token/:id — Fresh client-credentials token, passed through.
async fn domo_token(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    info!("Token passthrough requested for {id}");
    let tokens = state.tokens.acquire_token().await?;
    Ok(Json(json!({
        "access_token": tokens.access_token,
        "token_type": tokens.token_type,
        "expires_in": tokens.expires_in,
        "scope": tokens.scope,
    })))
}

/// GET /domo/embed-token/:cardId — Token plus the embed link for a card.
async fn domo_embed_token(
    State(state): State<SharedState>,
    Path(card_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let token = state.tokens.ensure_token().await?;
    Ok(Json(json!({
        "cardId": card_id,
        "accessToken": token,
        "embedUrl": state.config.embed_url(&card_id),
    })))
}

async fn dataset_get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let view = state.relay.fetch_dataset(&id).await?;
    Ok(Json(view))
}

/// PUT /dataset/:id — Body `{ "records": [...] }`.
async fn dataset_put(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<Value>, RelayError> {
    state.relay.update_dataset(&id, body.get("records")).await?;
    Ok(Json(json!({ "success": true })))
}
