//! Avatar image proxy.
//!
//! Browsers can't always load Google-hosted avatars directly (referrer
//! and rate-limit rules), so the gateway fetches them server-side. Only
//! hosts on the configured allowlist are fetched.

use crate::{ErrorBody, SharedState, json_error};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::Json;
use serde::Deserialize;
use tracing::warn;

const ERR_URL_REQUIRED: &str = "URL parameter is required";
const ERR_INVALID_URL: &str = "Invalid URL";
const ERR_HOST_DENIED: &str = "Domain not allowed";
const ERR_FETCH_FAILED: &str = "Failed to fetch image";

#[derive(Deserialize)]
pub struct ImageQuery {
    pub url: Option<String>,
}

type ImageResponse = ([(HeaderName, String); 3], Bytes);

/// `GET /api/image-proxy?url=` — relay an allowlisted image with long-lived
/// caching headers.
pub async fn proxy_image(
    State(state): State<SharedState>,
    Query(query): Query<ImageQuery>,
) -> Result<ImageResponse, (StatusCode, Json<ErrorBody>)> {
    let Some(raw_url) = query.url.as_deref().filter(|s| !s.is_empty()) else {
        return Err(json_error(StatusCode::BAD_REQUEST, ERR_URL_REQUIRED));
    };

    let url: reqwest::Url = raw_url
        .parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, ERR_INVALID_URL))?;

    let allowed = url
        .host_str()
        .is_some_and(|host| {
            state
                .config
                .image_proxy
                .allowed_hosts
                .iter()
                .any(|h| h == host)
        });
    if !allowed {
        return Err(json_error(StatusCode::FORBIDDEN, ERR_HOST_DENIED));
    }

    let response = state
        .http
        .get(url)
        .header(
            header::USER_AGENT,
            "Mozilla/5.0 (compatible; ImageProxy/1.0)",
        )
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            warn!("image fetch failed: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_FETCH_FAILED)
        })?;

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();

    let bytes = response.bytes().await.map_err(|e| {
        warn!("image body unreadable: {e}");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_FETCH_FAILED)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        bytes,
    ))
}
