//! HTTP server inbound adapter exposing sampling, model listing and in-memory chat sessions.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Context as AnyhowContext, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::Mutex as AsyncMutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::{
    conversation::{ConversationState, Phase},
    domain::Message,
    error::Error as CoreError,
    ports::{
        ChatTurnOutcome, ChatTurnRequest, ModelListing, PromptService, SampleOutcome,
        SampleRequest,
    },
};

/// Server adapter that exposes the `PromptService` via HTTP.
pub struct ServerAdapter {
    service: Arc<dyn PromptService>,
}

impl ServerAdapter {
    pub fn new(service: Arc<dyn PromptService>) -> Self {
        Self { service }
    }

    /// Run the HTTP server on the given address.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind promptbench listener")?;
        self.run_with_listener(listener).await
    }

    /// Run the HTTP server with an existing listener (useful for tests).
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<()> {
        let state = Arc::new(ServeState::new(self.service));
        let router = build_router(state);
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "promptbench serve listening");
        } else {
            info!("promptbench serve listening");
        }
        axum::serve(listener, router.into_make_service())
            .await
            .context("serve endpoint failed")
    }
}

/// One chat session. A turn holds `conversation` until its reply is recorded, which
/// is what makes a concurrent second submission a conflict.
struct Session {
    conversation: Arc<AsyncMutex<ConversationState>>,
    /// The conversation as of its last settled turn, readable while a turn runs.
    settled: Mutex<ConversationState>,
}

impl Session {
    fn new() -> Self {
        Self {
            conversation: Arc::new(AsyncMutex::new(ConversationState::new())),
            settled: Mutex::new(ConversationState::new()),
        }
    }

    fn settled(&self) -> Result<MutexGuard<'_, ConversationState>, ApiError> {
        self.settled
            .lock()
            .map_err(|_| ApiError::internal("session snapshot lock poisoned"))
    }

    fn publish(&self, conversation: &ConversationState) {
        match self.settled.lock() {
            Ok(mut settled) => *settled = conversation.clone(),
            Err(_) => warn!("session snapshot lock poisoned; view not updated"),
        }
    }
}

/// Sessions live in process memory only and vanish on restart.
struct ServeState {
    service: Arc<dyn PromptService>,
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
}

impl ServeState {
    fn new(service: Arc<dyn PromptService>) -> Self {
        Self {
            service,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn create_session(&self) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        self.sessions_guard()?.insert(id, Arc::new(Session::new()));
        Ok(id)
    }

    fn session(&self, raw_id: &str) -> Result<(Uuid, Arc<Session>), ApiError> {
        let id = parse_session_id(raw_id)?;
        let session = self
            .sessions_guard()?
            .get(&id)
            .cloned()
            .ok_or_else(|| session_not_found(raw_id))?;
        Ok((id, session))
    }

    /// Swaps in a fresh session under the same id. A reply still in flight lands on
    /// the detached one and is discarded.
    fn reset_session(&self, raw_id: &str) -> Result<(), ApiError> {
        let (id, _) = self.session(raw_id)?;
        self.sessions_guard()?.insert(id, Arc::new(Session::new()));
        Ok(())
    }

    fn end_session(&self, raw_id: &str) -> Result<(), ApiError> {
        let id = parse_session_id(raw_id)?;
        self.sessions_guard()?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| session_not_found(raw_id))
    }

    fn sessions_guard(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Arc<Session>>>, ApiError> {
        self.sessions
            .lock()
            .map_err(|_| ApiError::internal("session table lock poisoned"))
    }
}

fn session_not_found(raw_id: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, format!("Session {raw_id} not found"))
}

fn parse_session_id(raw_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw_id).map_err(|_| session_not_found(raw_id))
}

fn build_router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/models", get(list_models_handler))
        .route("/samples", post(sample_handler))
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(session_detail_handler).delete(end_session_handler),
        )
        .route(
            "/sessions/{id}/messages",
            post(submit_message_handler).delete(reset_session_handler),
        )
        .with_state(state)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::MissingCredential { .. } => StatusCode::UNAUTHORIZED,
            CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::InvalidState(_) => StatusCode::CONFLICT,
            CoreError::Gateway { .. } | CoreError::CatalogUnavailable(_) => StatusCode::BAD_GATEWAY,
            CoreError::UnknownModelPricing { .. } => StatusCode::NOT_FOUND,
            CoreError::Config(_) | CoreError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Optional `Authorization: Bearer <key>` header; the service falls back to its own
/// credential source when absent.
fn bearer_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn default_samples() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct SampleBody {
    prompt: String,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default = "default_samples")]
    samples: usize,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    text: String,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default = "default_samples")]
    samples: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    /// `awaiting_reply` while a submission is in flight; history is then the last
    /// settled one.
    pub phase: String,
    pub messages: Vec<Message>,
    pub candidates: Vec<String>,
}

impl SessionView {
    fn of(session_id: Uuid, conversation: &ConversationState, phase: Phase) -> Self {
        let phase = match phase {
            Phase::Empty => "empty",
            Phase::AwaitingReply => "awaiting_reply",
        };
        Self {
            session_id,
            phase: phase.to_string(),
            messages: conversation.messages().to_vec(),
            candidates: conversation.candidates().to_vec(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<ModelListing>,
}

async fn list_models_handler(
    State(state): State<Arc<ServeState>>,
    headers: HeaderMap,
) -> Result<Json<ModelList>, ApiError> {
    let models = state.service.list_models(bearer_key(&headers)).await?;
    Ok(Json(ModelList { models }))
}

async fn sample_handler(
    State(state): State<Arc<ServeState>>,
    headers: HeaderMap,
    Json(body): Json<SampleBody>,
) -> Result<Json<SampleOutcome>, ApiError> {
    let request = SampleRequest {
        prompt: body.prompt,
        system_prompt: body.system_prompt,
        model: body.model,
        temperature: body.temperature,
        samples: body.samples,
        api_key: bearer_key(&headers),
    };
    Ok(Json(state.service.sample(request).await?))
}

async fn create_session_handler(
    State(state): State<Arc<ServeState>>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let session_id = state.create_session()?;
    info!(%session_id, "chat session created");
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

async fn session_detail_handler(
    Path(raw_id): Path<String>,
    State(state): State<Arc<ServeState>>,
) -> Result<Json<SessionView>, ApiError> {
    let (session_id, session) = state.session(&raw_id)?;
    let view = match session.conversation.try_lock() {
        Ok(conversation) => SessionView::of(session_id, &conversation, conversation.phase()),
        Err(_) => SessionView::of(session_id, &*session.settled()?, Phase::AwaitingReply),
    };
    Ok(Json(view))
}

async fn submit_message_handler(
    Path(raw_id): Path<String>,
    State(state): State<Arc<ServeState>>,
    headers: HeaderMap,
    Json(body): Json<MessageBody>,
) -> Result<Json<ChatTurnOutcome>, ApiError> {
    let (session_id, session) = state.session(&raw_id)?;
    let mut conversation = session
        .conversation
        .clone()
        .try_lock_owned()
        .map_err(|_| {
            ApiError::new(
                StatusCode::CONFLICT,
                "a submission is already awaiting its reply",
            )
        })?;

    let request = ChatTurnRequest {
        text: body.text,
        system_prompt: body.system_prompt,
        model: body.model,
        temperature: body.temperature,
        samples: body.samples,
        api_key: bearer_key(&headers),
    };
    let service = state.service.clone();

    // Owns the session lock, so the turn settles even if the client goes away.
    let turn = tokio::spawn(async move {
        let outcome = service.chat_turn(&mut conversation, request).await;
        session.publish(&conversation);
        outcome
    });
    let outcome = turn.await.map_err(|err| {
        warn!(%session_id, error = %err, "chat turn task failed");
        ApiError::internal("chat turn task failed")
    })??;
    Ok(Json(outcome))
}

async fn reset_session_handler(
    Path(raw_id): Path<String>,
    State(state): State<Arc<ServeState>>,
) -> Result<StatusCode, ApiError> {
    state.reset_session(&raw_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn end_session_handler(
    Path(raw_id): Path<String>,
    State(state): State<Arc<ServeState>>,
) -> Result<StatusCode, ApiError> {
    state.end_session(&raw_id)?;
    info!(session_id = %raw_id, "chat session ended");
    Ok(StatusCode::NO_CONTENT)
}
