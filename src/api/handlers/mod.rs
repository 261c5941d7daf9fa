//! API request handlers.

/// Chat session, streaming and health handlers.
pub mod chat;
/// Item and cart handlers of the main application.
pub mod demo;
