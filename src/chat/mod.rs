//! Customer-service chat: answering, routing, greetings and streaming.

pub mod engine;
pub mod greeting;
pub mod intent;
pub mod stream;

pub use engine::{AnswerMode, ChatEngine, RagAnswer};
pub use intent::Intent;
pub use stream::{ChatTurn, StreamSettings, chat_events};
