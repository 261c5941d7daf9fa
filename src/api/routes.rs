use crate::api::handlers::{chat, demo};
use crate::types::{
    ActionResponse, AppError, ChatRequest, CreateSessionRequest, DeleteSessionResponse,
    GreetingResponse, HealthResponse, SessionResponse, SessionStats, SessionStatus,
};
use crate::{AppState, AppVariant};
use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use utoipa::OpenApi;

/// Streaming and session bookkeeping shared by both applications.
#[derive(OpenApi)]
#[openapi(
    paths(chat::chat_stream, chat::session_info, chat::delete_session),
    components(schemas(ChatRequest, SessionResponse, SessionStats, DeleteSessionResponse))
)]
struct ChatCoreApi;

/// Session creation and control endpoints of the main application.
#[derive(OpenApi)]
#[openapi(
    paths(
        chat::create_session,
        chat::abort_chat,
        chat::reset_session_state,
        chat::session_status,
        chat::intelligent_greeting
    ),
    components(schemas(CreateSessionRequest, ActionResponse, SessionStatus, GreetingResponse))
)]
struct ChatControlApi;

#[derive(OpenApi)]
#[openapi(paths(chat::create_plain_session))]
struct ChatAppSessionApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Foodie API", description = "美食平台 API", version = "1.0.0"),
    paths(demo::read_root, demo::read_item, demo::update_item, demo::total_price),
    components(schemas(demo::Item, demo::ItemPrice, demo::Cart)),
    nest(
        (path = "/api/v1/chat", api = ChatCoreApi),
        (path = "/api/v1/chat", api = ChatControlApi)
    )
)]
pub struct MainApiDoc;

#[derive(OpenApi)]
#[openapi(
    info(title = "RAG 聊天 API", description = "智能客服聊天系統", version = "1.0.0"),
    paths(chat::health_check),
    components(schemas(HealthResponse)),
    nest(
        (path = "/api/chat", api = ChatCoreApi),
        (path = "/api/chat", api = ChatAppSessionApi)
    )
)]
pub struct ChatAppApiDoc;

fn chat_core_routes() -> Router<AppState> {
    Router::new()
        .route("/stream", post(chat::chat_stream))
        .route("/sessions", get(chat::session_info))
        .route("/session/{session_id}", delete(chat::delete_session))
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "detail": "Method Not Allowed" })),
    )
}

pub fn create_router(variant: AppVariant) -> Router<AppState> {
    let router = match variant {
        AppVariant::Main => {
            let chat_routes = chat_core_routes()
                .route("/session", post(chat::create_session))
                .route("/abort/{session_id}", post(chat::abort_chat))
                .route("/reset/{session_id}", post(chat::reset_session_state))
                .route("/status/{session_id}", get(chat::session_status))
                .route("/greeting/{session_id}", get(chat::intelligent_greeting));

            Router::new()
                .route("/", get(demo::read_root))
                .route(
                    "/items/{item_id}",
                    get(demo::read_item).put(demo::update_item),
                )
                .route("/cart", post(demo::total_price))
                .nest("/api/v1/chat", chat_routes)
                .route(
                    "/openapi.json",
                    get(|| async { Json(MainApiDoc::openapi()) }),
                )
        }
        AppVariant::ChatApp => Router::new()
            .nest(
                "/api/chat",
                chat_core_routes().route("/session", post(chat::create_plain_session)),
            )
            .route("/api/health", get(chat::health_check))
            .route(
                "/openapi.json",
                get(|| async { Json(ChatAppApiDoc::openapi()) }),
            ),
    };

    router
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_openapi_lists_nested_chat_paths() {
        let doc = MainApiDoc::openapi();
        assert_eq!(doc.info.title, "Foodie API");
        assert!(doc.paths.paths.contains_key("/cart"));
        assert!(doc.paths.paths.contains_key("/api/v1/chat/stream"));
        assert!(doc.paths.paths.contains_key("/api/v1/chat/abort/{session_id}"));
    }

    #[test]
    fn test_chat_app_openapi() {
        let doc = ChatAppApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/chat/session"));
        assert!(doc.paths.paths.contains_key("/api/health"));
        assert!(!doc.paths.paths.contains_key("/api/chat/abort/{session_id}"));
    }
}
