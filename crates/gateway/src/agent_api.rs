//! The agent turn endpoints.
//!
//! `POST /api/agent?persona=` takes the full message history (the client
//! resends it every turn; nothing is stored server-side) and streams the
//! answer as SSE `data:` frames carrying [`UiStreamEvent`] JSON. Identity
//! checks happen before the first model call; once streaming has begun the
//! status is committed and failures become terminal `error` events.
//!
//! `GET /api/agent` streams a fixed prompt through the event-host persona
//! as a capability probe.

use crate::{ERR_INTERNAL, ERR_UNAUTHORIZED, ERR_USER_NOT_FOUND, ErrorBody, SharedState, json_error};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::response::sse::{Event as SseEvent, Sse};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tentacool_agent::{AgentSession, CallerSnapshot, Persona, UiStreamEvent};
use tentacool_core::message::{Conversation, Message};
use tentacool_core::tool::ToolRegistry;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

/// Request body: the full conversation history in UI wire format.
#[derive(Debug, Deserialize)]
pub struct AgentTurnRequest {
    pub messages: Vec<UiMessage>,
}

/// A message as the UI sends it: a role plus ordered parts. Only text
/// parts contribute to the model-visible history; other part kinds
/// (tool traces the client echoes back) are skipped.
#[derive(Debug, Deserialize)]
pub struct UiMessage {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<UiPart>,
}

#[derive(Debug, Deserialize)]
pub struct UiPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl UiMessage {
    /// Flatten into a domain message, if the role is known and any text
    /// part is present.
    fn flatten(&self) -> Option<Message> {
        let text: Vec<&str> = self
            .parts
            .iter()
            .filter(|p| p.kind == "text")
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            return None;
        }
        let content = text.join("\n");

        match self.role.as_str() {
            "user" => Some(Message::user(content)),
            "assistant" => Some(Message::assistant(content)),
            "system" => Some(Message::system(content)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PersonaQuery {
    pub persona: Option<String>,
}

type SseStream = Sse<futures::stream::BoxStream<'static, Result<SseEvent, Infallible>>>;

/// `POST /api/agent` — run one streamed turn.
pub async fn post_agent(
    State(state): State<SharedState>,
    Query(query): Query<PersonaQuery>,
    headers: HeaderMap,
    Json(payload): Json<AgentTurnRequest>,
) -> Result<SseStream, (StatusCode, Json<ErrorBody>)> {
    let Some(persona) = Persona::parse(query.persona.as_deref()) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "Solicitud inválida"));
    };

    let history: Vec<Message> = payload.messages.iter().filter_map(UiMessage::flatten).collect();
    if history.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Solicitud inválida"));
    }

    run_turn(state, persona, &headers, Conversation::from_messages(history)).await
}

/// `GET /api/agent` — stream a fixed prompt through the event-host persona.
pub async fn get_agent(
    State(state): State<SharedState>,
) -> Result<SseStream, (StatusCode, Json<ErrorBody>)> {
    let conversation = Conversation::from_messages(vec![Message::user(
        "Hola, ¿por qué debería asistir a la PulpoCon?",
    )]);
    run_turn(state, Persona::EventHost, &HeaderMap::new(), conversation).await
}

/// Shared turn setup: identity rules, tool binding, prompt construction.
/// Everything here runs before the first model call, so it can still fail
/// with a proper HTTP status.
async fn run_turn(
    state: SharedState,
    persona: Persona,
    headers: &HeaderMap,
    conversation: Conversation,
) -> Result<SseStream, (StatusCode, Json<ErrorBody>)> {
    let snapshot = if persona.requires_identity() {
        Some(resolve_caller(&state, headers).await?)
    } else {
        None
    };

    let tools = if persona.uses_directory_tool() {
        Arc::new(tentacool_tools::matchmaker_registry(state.store.clone()))
    } else {
        Arc::new(ToolRegistry::new())
    };

    let model_cfg = &state.config.model;
    let session = AgentSession::new(
        state.provider.clone(),
        &model_cfg.model,
        persona.system_prompt(snapshot.as_ref()),
    )
    .with_temperature(model_cfg.temperature)
    .with_max_tokens(model_cfg.max_tokens)
    .with_tools(tools)
    .with_max_steps(state.config.agent.max_steps);

    info!(persona = persona.as_str(), "agent turn accepted");

    let rx = session.run_stream(conversation);
    let stream = ReceiverStream::new(rx)
        .map(|event: UiStreamEvent| Ok::<_, Infallible>(SseEvent::default().data(event.to_sse_data())));

    Ok(Sse::new(Box::pin(stream)))
}

/// Resolve the caller to a user + profile snapshot, or fail with the
/// persona's identity errors: 401 without a valid token, 404 when the
/// token resolves to no user or no profile.
async fn resolve_caller(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<CallerSnapshot, (StatusCode, Json<ErrorBody>)> {
    let Some(email) = crate::auth::resolve_identity(headers, &state.session_key) else {
        return Err(json_error(StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED));
    };

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL))?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, ERR_USER_NOT_FOUND))?;

    let profile = state
        .store
        .find_profile_by_user_id(&user.id)
        .await
        .map_err(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL))?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, ERR_USER_NOT_FOUND))?;

    Ok(CallerSnapshot { user, profile })
}
