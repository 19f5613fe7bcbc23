//! HTTP API gateway for TentaCool.
//!
//! Exposes the agent turn endpoints (SSE streaming), the profile and
//! connection CRUD surface, the avatar image proxy, Google OAuth sign-in,
//! and a health check. Built on Axum.

pub mod agent_api;
pub mod auth;
pub mod connections_api;
pub mod image_proxy;
pub mod profiles_api;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use tentacool_config::AppConfig;
use tentacool_core::provider::Provider;
use tentacool_store::{ProfileStore, SqliteStore};

/// Error strings the product surfaces to clients. The agent and profile
/// endpoints answer in Spanish; the rest of the API keeps its original
/// English messages.
pub(crate) const ERR_INTERNAL: &str = "Error interno del servidor";
pub(crate) const ERR_UNAUTHORIZED: &str = "No autorizado";
pub(crate) const ERR_USER_NOT_FOUND: &str = "Usuario no encontrado";

/// Shared application state.
pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub store: Arc<dyn ProfileStore>,
    pub session_key: auth::SessionKey,
    pub http: reqwest::Client,
}

pub type SharedState = Arc<AppState>;

/// The structured `{error}` body every non-2xx JSON response carries.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn json_error(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/agent",
            get(agent_api::get_agent).post(agent_api::post_agent),
        )
        .route(
            "/api/profiles",
            get(profiles_api::list_profiles).post(profiles_api::upsert_profile),
        )
        .route(
            "/api/connections",
            get(connections_api::list_connections).post(connections_api::create_connection),
        )
        .route("/api/image-proxy", get(image_proxy::proxy_image))
        .route("/api/auth/login", get(auth::login))
        .route("/api/auth/callback", get(auth::callback))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Secrets are checked up front: a missing API key, database URL, OAuth
/// credential, or session secret fails here, never on a request path.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.require_secrets()?;

    let provider = tentacool_providers::build_from_config(&config)?;
    let store: Arc<dyn ProfileStore> = Arc::new(SqliteStore::new(&config.database.url).await?);
    let session_key = auth::SessionKey::new(
        config
            .auth
            .session_secret
            .as_deref()
            .ok_or("session secret missing")?,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        config,
        provider,
        store,
        session_key,
        http: reqwest::Client::new(),
    });

    let app = build_router(state);

    info!(addr = %addr, "gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tentacool_core::error::ProviderError;
    use tentacool_core::message::{Message, MessageToolCall};
    use tentacool_core::provider::{ProviderRequest, ProviderResponse};
    use tentacool_store::InMemoryStore;

    /// Scripted provider that counts invocations and repeats its last
    /// response once the script runs out.
    pub struct StubProvider {
        responses: Mutex<Vec<ProviderResponse>>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn text(content: &str) -> Self {
            Self::scripted(vec![text_response(content)])
        }

        pub fn scripted(responses: Vec<ProviderResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let responses = self.responses.lock().unwrap();
            let idx = n.min(responses.len() - 1);
            Ok(responses[idx].clone())
        }
    }

    pub fn text_response(content: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(content),
            usage: None,
            model: "stub".into(),
        }
    }

    pub fn tool_call_response(name: &str, args: serde_json::Value) -> ProviderResponse {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: args.to_string(),
        }];
        ProviderResponse {
            message: msg,
            usage: None,
            model: "stub".into(),
        }
    }

    pub fn test_state_with(provider: Arc<dyn Provider>) -> (SharedState, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState {
            config: AppConfig::default(),
            provider,
            store: store.clone(),
            session_key: auth::SessionKey::new("test-secret"),
            http: reqwest::Client::new(),
        });
        (state, store)
    }

    pub fn test_state() -> (SharedState, Arc<InMemoryStore>) {
        test_state_with(Arc::new(StubProvider::text("hola")))
    }

    pub fn bearer(state: &SharedState, email: &str) -> String {
        format!("Bearer {}", state.session_key.issue(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint() {
        let (state, _store) = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (state, _store) = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
