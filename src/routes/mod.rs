//! API routes

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::CurrentUser;
use crate::conversation::{Conversation, Message};
use crate::core::{record_reply, GenerationRequest, RelayStream, FALLBACK_REPLY};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Body of `POST /generate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub conversation_history: Option<Vec<Message>>,
}

/// Body of `POST /chats/{id}/generate`; history comes from the stored chat
#[derive(Debug, Deserialize)]
pub struct ChatGenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::Generation(format!("unreadable request body: {}", e)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn generate(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    body: Bytes,
) -> Result<RelayStream, AppError> {
    let body: GenerateBody = parse_body(&body)?;

    let request = GenerationRequest::new(
        body.prompt,
        body.tone,
        body.goal,
        body.audience,
        body.conversation_history.as_deref().unwrap_or_default(),
    )?;

    info!(
        user_id = %user_id,
        history = request.history().len(),
        backend = state.backend.name(),
        "generating"
    );

    let prompt = request.assemble(&state.preamble);
    let chunks = state.backend.stream_generate(&state.model, &prompt).await?;

    Ok(RelayStream::new(chunks))
}

async fn list_chats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(state.conversations.list(&user_id).await?))
}

async fn create_chat(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    let chat = state.conversations.create(&user_id).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

async fn get_chat(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(chat_id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    state
        .conversations
        .open(&user_id, &chat_id)
        .await?
        .map(Json)
        .ok_or(AppError::ChatNotFound(chat_id))
}

async fn put_chat(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(chat_id): Path<String>,
    body: Bytes,
) -> Result<Json<Conversation>, AppError> {
    let mut chat: Conversation =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidRecord(e.to_string()))?;
    chat.id = chat_id;

    state.conversations.save(&user_id, &mut chat).await?;
    Ok(Json(chat))
}

async fn generate_in_chat(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(chat_id): Path<String>,
    body: Bytes,
) -> Result<RelayStream, AppError> {
    let body: ChatGenerateBody = parse_body(&body)?;

    let mut chat = state
        .conversations
        .open(&user_id, &chat_id)
        .await?
        .ok_or_else(|| AppError::ChatNotFound(chat_id.clone()))?;

    let request = GenerationRequest::new(
        body.prompt,
        body.tone,
        body.goal,
        body.audience,
        chat.recent_history(),
    )?;

    state
        .conversations
        .append(&user_id, &mut chat, Message::user(request.prompt()))
        .await?;

    info!(
        user_id = %user_id,
        chat_id = %chat.id,
        history = request.history().len(),
        "generating into chat"
    );

    let prompt = request.assemble(&state.preamble);
    let chunks = match state.backend.stream_generate(&state.model, &prompt).await {
        Ok(chunks) => chunks,
        Err(e) => {
            let fallback = Message::assistant(FALLBACK_REPLY);
            if let Err(save_err) = state.conversations.append(&user_id, &mut chat, fallback).await
            {
                error!(chat_id = %chat.id, "failed to save fallback reply: {}", save_err);
            }
            return Err(e.into());
        }
    };

    let recorded = record_reply(chunks, state.conversations.clone(), user_id, chat);
    Ok(RelayStream::new(recorded))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/:id", get(get_chat).put(put_chat))
        .route("/chats/:id/generate", post(generate_in_chat))
}
