use crate::{
    AppState,
    api::validation::{BodySchema, Field, FieldType, Shape, ValidatedJson},
    chat::{ChatTurn, StreamSettings, chat_events, greeting},
    session::epoch_seconds,
    types::{
        ActionResponse, ChatRequest, CreateSessionRequest, DeleteSessionResponse,
        GreetingResponse, HealthResponse, SessionResponse, SessionStats, SessionStatus,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

const SESSION_CREATED: &str = "會話已創建，可以開始聊天";
const SESSION_MISSING: &str = "會話不存在";

impl BodySchema for ChatRequest {
    const SHAPE: Shape = Shape::Object(&[
        Field::required("message", FieldType::Str),
        Field::optional("session_id", FieldType::Str),
    ]);
}

impl BodySchema for CreateSessionRequest {
    const SHAPE: Shape = Shape::Object(&[Field::optional("with_greeting", FieldType::Bool)]);

    fn empty_body() -> Option<Self> {
        Some(Self::default())
    }
}

/// Create a chat session
#[utoipa::path(
    post,
    path = "/session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = SessionResponse),
        (status = 422, description = "Validation error")
    ),
    tag = "chat"
)]
pub async fn create_session(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateSessionRequest>,
) -> Json<SessionResponse> {
    let session_id = state.sessions.create_session();
    let greeting = request
        .with_greeting
        .then(|| greeting::random_greeting().to_string());

    Json(SessionResponse {
        session_id,
        message: SESSION_CREATED.to_string(),
        greeting,
    })
}

/// Create a chat session without a greeting; any request body is ignored
#[utoipa::path(
    post,
    path = "/session",
    responses((status = 200, description = "Session created", body = SessionResponse)),
    tag = "chat"
)]
pub async fn create_plain_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: state.sessions.create_session(),
        message: SESSION_CREATED.to_string(),
        greeting: None,
    })
}

/// Stream a reply as server-sent events
#[utoipa::path(
    post,
    path = "/stream",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "SSE stream of chat events", content_type = "text/event-stream"),
        (status = 422, description = "Validation error")
    ),
    tag = "chat"
)]
pub async fn chat_stream(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    // Unknown ids get a fresh session, announced to the client
    let (session_id, announce_session) = match request.session_id {
        Some(id) if state.sessions.exists(&id) => (id, false),
        _ => (state.sessions.create_session(), true),
    };

    let config = state.config.config();
    let turn = ChatTurn {
        sessions: Arc::clone(&state.sessions),
        engine: Arc::clone(&state.engine),
        session_id,
        announce_session,
        message: request.message,
        mode: state.variant.answer_mode(),
        settings: StreamSettings {
            words_per_chunk: config.stream.words_per_chunk,
            chunk_delay: config.stream.chunk_delay(),
            top_k: config.rag.similarity_top_k,
        },
    };

    Sse::new(chat_events(turn).map(|event| Ok::<_, Infallible>(event.to_sse())))
        .keep_alive(KeepAlive::default())
}

/// Remove expired sessions and report counts
#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "Session statistics", body = SessionStats)),
    tag = "chat"
)]
pub async fn session_info(State(state): State<AppState>) -> Json<SessionStats> {
    let cleaned_sessions = state.sessions.cleanup_expired_sessions();
    Json(SessionStats {
        active_sessions: state.sessions.session_count(),
        cleaned_sessions,
    })
}

/// Delete a session
#[utoipa::path(
    delete,
    path = "/session/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Deletion result", body = DeleteSessionResponse)),
    tag = "chat"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<DeleteSessionResponse> {
    let deleted = state.sessions.delete_session(&session_id);
    Json(DeleteSessionResponse {
        deleted,
        message: if deleted { "會話已刪除" } else { SESSION_MISSING }.to_string(),
    })
}

fn failure(message: &str) -> Json<ActionResponse> {
    Json(ActionResponse {
        success: false,
        message: message.to_string(),
        session_id: None,
    })
}

/// Abort the reply currently streaming in a session
#[utoipa::path(
    post,
    path = "/abort/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Abort result", body = ActionResponse)),
    tag = "chat"
)]
pub async fn abort_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<ActionResponse> {
    if state.sessions.get_session(&session_id).is_none() {
        return failure(SESSION_MISSING);
    }
    if !state.sessions.is_session_processing(&session_id) {
        return failure("當前沒有進行中的對話");
    }

    let aborted = state.sessions.abort_session(&session_id);
    tracing::info!(session_id = %session_id, "Chat aborted by client");
    Json(ActionResponse {
        success: aborted,
        message: if aborted { "對話已中止" } else { "中止失敗" }.to_string(),
        session_id: Some(session_id),
    })
}

/// Clear the abort and processing flags, keeping the history
#[utoipa::path(
    post,
    path = "/reset/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Reset result", body = ActionResponse)),
    tag = "chat"
)]
pub async fn reset_session_state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<ActionResponse> {
    if state.sessions.get_session(&session_id).is_none() {
        return failure(SESSION_MISSING);
    }

    let reset = state.sessions.reset_session_abort(&session_id);
    state.sessions.set_processing_status(&session_id, false);
    Json(ActionResponse {
        success: reset,
        message: if reset { "會話狀態已重置" } else { "重置失敗" }.to_string(),
        session_id: Some(session_id),
    })
}

/// Session flags and timestamps
#[utoipa::path(
    get,
    path = "/status/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Session status", body = SessionStatus)),
    tag = "chat"
)]
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionStatus> {
    let Some(session) = state.sessions.get_session(&session_id) else {
        return Json(SessionStatus {
            exists: false,
            message: Some(SESSION_MISSING.to_string()),
            session_id: None,
            is_processing: None,
            is_aborted: None,
            created_at: None,
            last_access: None,
        });
    };

    Json(SessionStatus {
        exists: true,
        message: None,
        session_id: Some(session.id),
        is_processing: Some(session.is_processing),
        is_aborted: Some(session.is_aborted),
        created_at: Some(epoch_seconds(session.created_at)),
        last_access: Some(epoch_seconds(session.last_access)),
    })
}

/// Greeting generated from the policy documents
#[utoipa::path(
    get,
    path = "/greeting/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Greeting or fallback", body = GreetingResponse)),
    tag = "chat"
)]
pub async fn intelligent_greeting(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<GreetingResponse> {
    if state.sessions.get_session(&session_id).is_none() {
        return Json(GreetingResponse {
            success: false,
            greeting: None,
            session_id: None,
            message: Some(SESSION_MISSING.to_string()),
            fallback_greeting: None,
        });
    }

    let top_k = state.config.config().rag.similarity_top_k;
    let history = state.sessions.history(&session_id);
    let prompt = greeting::GREETING_PROMPT;

    match state.engine.rag_answer(prompt, &history, top_k).await {
        Ok(reply) => {
            state.sessions.record_exchange(&session_id, prompt, &reply.answer);
            Json(GreetingResponse {
                success: true,
                greeting: Some(reply.answer),
                session_id: Some(session_id),
                message: None,
                fallback_greeting: None,
            })
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Greeting generation failed: {}", e);
            Json(GreetingResponse {
                success: false,
                greeting: None,
                session_id: None,
                message: Some(format!("生成智能問候語時發生錯誤: {e}")),
                fallback_greeting: Some(greeting::random_greeting().to_string()),
            })
        }
    }
}

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let rag = state.engine.rag();
    Json(HealthResponse {
        status: "healthy".to_string(),
        rag_service: if rag.is_ready() { "ready" } else { "initializing" }.to_string(),
        active_sessions: state.sessions.session_count(),
        indexed_chunks: rag.chunk_count(),
    })
}
