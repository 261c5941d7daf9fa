//! HTTP API Handlers and Routes
//!
//! Two applications are served from the same handlers:
//!
//! ## Main (`--app main`)
//! - `GET /`, `GET /items/{item_id}`, `PUT /items/{item_id}`, `POST /cart`
//! - `POST /api/v1/chat/session` - Create a session, optionally with a greeting
//! - `POST /api/v1/chat/stream` - Stream a retrieval-grounded reply (SSE)
//! - `GET /api/v1/chat/sessions` - Clean up expired sessions and count the rest
//! - `DELETE /api/v1/chat/session/{id}` - Delete a session
//! - `POST /api/v1/chat/abort/{id}`, `POST /api/v1/chat/reset/{id}`
//! - `GET /api/v1/chat/status/{id}`, `GET /api/v1/chat/greeting/{id}`
//!
//! ## Chat app (`--app chat-app`)
//! - `POST /api/chat/session`, `POST /api/chat/stream` (intent-routed replies)
//! - `GET /api/chat/sessions`, `DELETE /api/chat/session/{id}`
//! - `GET /api/health`
//!
//! Both serve their OpenAPI document at `/openapi.json`. Request validation
//! failures are answered with HTTP 422 and a `detail` list (see [`validation`]).

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
/// Body schemas, the validating JSON extractor and the error envelope.
pub mod validation;
