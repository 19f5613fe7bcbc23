//! Attendee profile CRUD.
//!
//! `GET /api/profiles` is the public directory listing (profile cards,
//! no emails). `POST /api/profiles` creates or replaces the caller's own
//! profile and requires a session token.

use crate::{ERR_INTERNAL, ERR_UNAUTHORIZED, ERR_USER_NOT_FOUND, ErrorBody, SharedState, json_error};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use tentacool_core::profile::{Profile, ProfileCard};
use tentacool_store::ProfileDraft;
use tracing::{info, warn};

/// `GET /api/profiles` — every registered profile joined with the public
/// user fields.
pub async fn list_profiles(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ProfileCard>>, (StatusCode, Json<ErrorBody>)> {
    let cards = state.store.list_profiles().await.map_err(|e| {
        warn!("profile listing failed: {e}");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
    })?;
    Ok(Json(cards))
}

/// `POST /api/profiles` — create or update the caller's profile.
pub async fn upsert_profile(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(draft): Json<ProfileDraft>,
) -> Result<Json<Profile>, (StatusCode, Json<ErrorBody>)> {
    let Some(email) = crate::auth::resolve_identity(&headers, &state.session_key) else {
        return Err(json_error(StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED));
    };

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|e| {
            warn!("user lookup failed: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, ERR_USER_NOT_FOUND))?;

    let profile = state
        .store
        .upsert_profile(&user.id, draft)
        .await
        .map_err(|e| {
            warn!("profile upsert failed: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
        })?;

    info!(user_id = %user.id, "profile saved");
    Ok(Json(profile))
}
