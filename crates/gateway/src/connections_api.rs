//! Attendee connection requests.
//!
//! A connection is an undirected edge between two users; creating the
//! reverse of an existing edge is a conflict. Both endpoints require a
//! session token.

use crate::{ErrorBody, SharedState, json_error};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tentacool_core::error::StoreError;
use tentacool_core::profile::User;
use tracing::{info, warn};

const ERR_NOT_AUTHENTICATED: &str = "Not authenticated";
const ERR_USER_NOT_FOUND: &str = "User not found";
const ERR_TARGET_REQUIRED: &str = "Target user ID is required";
const ERR_SELF_CONNECT: &str = "Cannot connect to yourself";
const ERR_TARGET_NOT_FOUND: &str = "Target user not found";
const ERR_ALREADY_EXISTS: &str = "Connection already exists";
const ERR_INTERNAL: &str = "Internal server error";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub target_user_id: Option<String>,
}

async fn resolve_caller(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<User, (StatusCode, Json<ErrorBody>)> {
    let Some(email) = crate::auth::resolve_identity(headers, &state.session_key) else {
        return Err(json_error(StatusCode::UNAUTHORIZED, ERR_NOT_AUTHENTICATED));
    };
    state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|e| {
            warn!("user lookup failed: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, ERR_USER_NOT_FOUND))
}

/// `GET /api/connections` — the caller's connections, newest first, each
/// joined with the other user's public card.
pub async fn list_connections(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<ErrorBody>)> {
    let user = resolve_caller(&state, &headers).await?;

    let connections = state.store.list_connections(&user.id).await.map_err(|e| {
        warn!("connection listing failed: {e}");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
    })?;

    Ok(Json(json!({ "connections": connections })))
}

/// `POST /api/connections` — connect the caller to another user.
pub async fn create_connection(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<ErrorBody>)> {
    let user = resolve_caller(&state, &headers).await?;

    let Some(target_id) = body.target_user_id.as_deref().filter(|s| !s.is_empty()) else {
        return Err(json_error(StatusCode::BAD_REQUEST, ERR_TARGET_REQUIRED));
    };
    if target_id == user.id {
        return Err(json_error(StatusCode::BAD_REQUEST, ERR_SELF_CONNECT));
    }

    let connection = state
        .store
        .create_connection(&user.id, target_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => {
                json_error(StatusCode::NOT_FOUND, ERR_TARGET_NOT_FOUND)
            }
            StoreError::ConnectionExists { .. } => {
                json_error(StatusCode::CONFLICT, ERR_ALREADY_EXISTS)
            }
            other => {
                warn!("connection creation failed: {other}");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
            }
        })?;

    info!(requester = %user.id, target = %target_id, "connection created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "connection": connection,
            "message": "Connection created successfully",
        })),
    ))
}
