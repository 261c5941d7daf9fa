//! Server-sent event stream for a single chat turn.
//!
//! The full answer is produced first and then replayed as cumulative
//! `content` events of a few words each, checking the session's abort flag
//! between words.

use crate::chat::engine::{AnswerMode, ChatEngine};
use crate::session::SessionManager;
use crate::types::ChatEvent;
use async_stream::stream;
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;

pub const START_MESSAGE: &str = "正在思考...";
pub const ABORTED_MESSAGE: &str = "對話已中止";
pub const DONE_MESSAGE: &str = "回答完成";

#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub words_per_chunk: usize,
    pub chunk_delay: Duration,
    pub top_k: usize,
}

pub struct ChatTurn {
    pub sessions: Arc<SessionManager>,
    pub engine: Arc<ChatEngine>,
    pub session_id: String,
    /// Emit a `session_id` event first (the session was created for this turn)
    pub announce_session: bool,
    pub message: String,
    pub mode: AnswerMode,
    pub settings: StreamSettings,
}

/// Clears the processing flag when the stream finishes or is dropped.
struct ProcessingGuard {
    sessions: Arc<SessionManager>,
    session_id: String,
}

impl ProcessingGuard {
    fn start(sessions: Arc<SessionManager>, session_id: String) -> Self {
        sessions.set_processing_status(&session_id, true);
        sessions.reset_session_abort(&session_id);
        Self {
            sessions,
            session_id,
        }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.sessions.set_processing_status(&self.session_id, false);
    }
}

pub fn chat_events(turn: ChatTurn) -> impl Stream<Item = ChatEvent> {
    stream! {
        let ChatTurn { sessions, engine, session_id, announce_session, message, mode, settings } = turn;
        let _guard = ProcessingGuard::start(Arc::clone(&sessions), session_id.clone());
        let aborted = || ChatEvent::Aborted { message: ABORTED_MESSAGE.to_string() };

        if announce_session {
            yield ChatEvent::SessionId { session_id: session_id.clone() };
        }
        yield ChatEvent::Start { message: START_MESSAGE.to_string() };

        if sessions.is_session_aborted(&session_id) {
            yield aborted();
            return;
        }

        let answer = match engine
            .respond(&sessions, &session_id, &message, mode, settings.top_k)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Chat turn failed: {}", e);
                yield ChatEvent::Error { message: format!("發生錯誤: {e}") };
                return;
            }
        };

        if sessions.is_session_aborted(&session_id) {
            yield aborted();
            return;
        }

        let words: Vec<&str> = answer.split_whitespace().collect();
        let n = settings.words_per_chunk.max(1);
        let mut current = String::new();
        for (i, word) in words.iter().enumerate() {
            if sessions.is_session_aborted(&session_id) {
                yield aborted();
                return;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);

            if (i + 1) % n == 0 || i == words.len() - 1 {
                yield ChatEvent::Content { content: current.clone() };
                if !settings.chunk_delay.is_zero() {
                    tokio::time::sleep(settings.chunk_delay).await;
                }
            }
        }

        yield ChatEvent::Done { message: DONE_MESSAGE.to_string() };
    }
}
