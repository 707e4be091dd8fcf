use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    db::Envelope,
    errors::AppError,
    middleware::auth::CurrentProfile,
    models::{
        agent_memory::{
            AgentSession, MemoryItem, MemoryItemsQuery, NewMemoryItem, NewSession, SessionChanges,
            SessionsQuery,
        },
        app_state::AppState,
    },
};

#[utoipa::path(
    post,
    path = "/api/v1/agent-memory/items",
    request_body = NewMemoryItem,
    responses(
        (status = 201, description = "Memory item saved", body = Envelope<MemoryItem>),
        (status = 400, description = "Missing content"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Agent memory",
    security(("bearer" = []))
)]
pub async fn save_item(
    State(state): State<AppState>,
    Extension(CurrentProfile(user_id)): Extension<CurrentProfile>,
    Json(item): Json<NewMemoryItem>,
) -> Result<(StatusCode, Json<Envelope<MemoryItem>>), AppError> {
    let saved = state.memory.save_item(user_id, &item).await?;
    Ok((StatusCode::CREATED, Json(Envelope::single(saved))))
}

/// Unexpired items, newest first
#[utoipa::path(
    get,
    path = "/api/v1/agent-memory/items",
    params(MemoryItemsQuery),
    responses(
        (status = 200, description = "Memory items", body = Envelope<Vec<MemoryItem>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Agent memory",
    security(("bearer" = []))
)]
pub async fn list_items(
    State(state): State<AppState>,
    Extension(CurrentProfile(user_id)): Extension<CurrentProfile>,
    Query(query): Query<MemoryItemsQuery>,
) -> Result<Json<Envelope<Vec<MemoryItem>>>, AppError> {
    let rows = state.memory.list_items(user_id, &query).await?;
    Ok(Json(Envelope::rows(rows)))
}

/// Start a session, or touch it if the id already exists
#[utoipa::path(
    post,
    path = "/api/v1/agent-memory/sessions",
    request_body = NewSession,
    responses(
        (status = 200, description = "Session started or resumed", body = Envelope<AgentSession>),
        (status = 400, description = "Missing session_id"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Agent memory",
    security(("bearer" = []))
)]
pub async fn upsert_session(
    State(state): State<AppState>,
    Extension(CurrentProfile(user_id)): Extension<CurrentProfile>,
    Json(session): Json<NewSession>,
) -> Result<Json<Envelope<AgentSession>>, AppError> {
    let session = state.memory.upsert_session(user_id, &session).await?;
    Ok(Json(Envelope::single(session)))
}

#[utoipa::path(
    get,
    path = "/api/v1/agent-memory/sessions",
    params(SessionsQuery),
    responses(
        (status = 200, description = "Most recently active sessions", body = Envelope<Vec<AgentSession>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Agent memory",
    security(("bearer" = []))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(CurrentProfile(user_id)): Extension<CurrentProfile>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Envelope<Vec<AgentSession>>>, AppError> {
    let rows = state.memory.list_sessions(user_id, query.limit).await?;
    Ok(Json(Envelope::rows(rows)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/agent-memory/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = SessionChanges,
    responses(
        (status = 200, description = "Session updated", body = Envelope<AgentSession>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Session not found")
    ),
    tag = "Agent memory",
    security(("bearer" = []))
)]
pub async fn update_session(
    State(state): State<AppState>,
    Extension(CurrentProfile(user_id)): Extension<CurrentProfile>,
    Path(session_id): Path<String>,
    Json(changes): Json<SessionChanges>,
) -> Result<Json<Envelope<AgentSession>>, AppError> {
    let session = state
        .memory
        .update_session(user_id, &session_id, &changes)
        .await?;
    Ok(Json(Envelope::single(session)))
}
