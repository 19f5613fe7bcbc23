//! Google OAuth sign-in and HMAC-signed session tokens.
//!
//! Sign-in flow: `/api/auth/login` redirects to Google's consent screen;
//! `/api/auth/callback?code=` exchanges the code, fetches userinfo, upserts
//! the user (first sign-in creates it, later ones refresh name and avatar)
//! and returns a signed bearer token. The token carries the email plus an
//! HMAC-SHA256 signature; subsequent requests present it as
//! `Authorization: Bearer <token>`.

use crate::{ERR_INTERNAL, ERR_UNAUTHORIZED, ErrorBody, SharedState, json_error};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Json, Redirect};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tentacool_core::profile::User;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// HMAC key for session tokens, fixed at startup.
#[derive(Clone)]
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    /// Issue a token for an email: `base64(email).base64(hmac(email))`.
    pub fn issue(&self, email: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(email.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(self.sign(email.as_bytes()));
        format!("{payload}.{signature}")
    }

    /// Verify a token and return the email it was issued for.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (payload, signature) = token.split_once('.')?;
        let email_bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(&email_bytes);
        mac.verify_slice(&signature).ok()?;

        String::from_utf8(email_bytes).ok()
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }
}

/// Resolve the caller's email from a `Authorization: Bearer <token>` header.
pub fn resolve_identity(headers: &HeaderMap, key: &SessionKey) -> Option<String> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    key.verify(token)
}

/// `GET /api/auth/login` — redirect to Google's consent screen.
pub async fn login(
    State(state): State<SharedState>,
) -> Result<Redirect, (StatusCode, Json<ErrorBody>)> {
    let auth = &state.config.auth;
    let (Some(client_id), Some(redirect_url)) =
        (auth.google_client_id.as_deref(), auth.redirect_url.as_deref())
    else {
        warn!("OAuth sign-in requested but credentials are not configured");
        return Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL));
    };

    let url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth\
         ?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile",
        urlencode(client_id),
        urlencode(redirect_url),
    );
    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    name: Option<String>,
    email: String,
    picture: Option<String>,
}

/// `GET /api/auth/callback?code=` — exchange the authorization code,
/// upsert the user, issue a session token.
pub async fn callback(
    State(state): State<SharedState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorBody>)> {
    let Some(code) = query.code.as_deref() else {
        return Err(json_error(StatusCode::BAD_REQUEST, ERR_UNAUTHORIZED));
    };

    let auth = &state.config.auth;
    let (Some(client_id), Some(client_secret), Some(redirect_url)) = (
        auth.google_client_id.as_deref(),
        auth.google_client_secret.as_deref(),
        auth.redirect_url.as_deref(),
    ) else {
        return Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL));
    };

    let token: TokenResponse = state
        .http
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_url),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            warn!("OAuth code exchange failed: {e}");
            json_error(StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED)
        })?
        .json()
        .await
        .map_err(|e| {
            warn!("OAuth token response unreadable: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
        })?;

    let info: GoogleUserInfo = state
        .http
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(&token.access_token)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            warn!("userinfo fetch failed: {e}");
            json_error(StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED)
        })?
        .json()
        .await
        .map_err(|e| {
            warn!("userinfo response unreadable: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
        })?;

    let name = info.name.unwrap_or_else(|| info.email.clone());
    let user = state
        .store
        .upsert_user(&name, &info.email, info.picture.as_deref())
        .await
        .map_err(|e| {
            warn!("user upsert failed: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
        })?;

    info!(user_id = %user.id, "user signed in");
    let session_token = state.session_key.issue(&user.email);
    Ok(Json(SessionResponse {
        token: session_token,
        user,
    }))
}

/// Percent-encode the handful of characters that matter in query values.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn token_roundtrip() {
        let key = SessionKey::new("secret");
        let token = key.issue("ana@example.com");
        assert_eq!(key.verify(&token).as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let key = SessionKey::new("secret");
        let token = key.issue("ana@example.com");

        // Swap the payload for another email, keeping the signature
        let (_, signature) = token.split_once('.').unwrap();
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(b"admin@example.com"),
            signature
        );
        assert!(key.verify(&forged).is_none());
    }

    #[test]
    fn token_from_other_key_is_rejected() {
        let token = SessionKey::new("secret-a").issue("ana@example.com");
        assert!(SessionKey::new("secret-b").verify(&token).is_none());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let key = SessionKey::new("secret");
        for token in ["", "no-dot", "a.b", "..", "%%%.%%%"] {
            assert!(key.verify(token).is_none(), "accepted {token:?}");
        }
    }

    #[test]
    fn resolve_identity_needs_bearer_prefix() {
        let key = SessionKey::new("secret");
        let token = key.issue("ana@example.com");

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            token.parse().unwrap(),
        );
        assert!(resolve_identity(&headers, &key).is_none());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        assert_eq!(
            resolve_identity(&headers, &key).as_deref(),
            Some("ana@example.com")
        );
    }

    #[tokio::test]
    async fn login_without_credentials_is_500() {
        let (state, _store) = test_state();
        let app = crate::build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn callback_without_code_is_400() {
        let (state, _store) = test_state();
        let app = crate::build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/callback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("http://a/b?c=d"), "http%3A%2F%2Fa%2Fb%3Fc%3Dd");
        assert_eq!(urlencode("plain-value_1.2~3"), "plain-value_1.2~3");
    }
}
