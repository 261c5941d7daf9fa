//! Conversation memory for chat sessions.
//!
//! Each session keeps its exchanges in a [`ChatMemory`] bounded by an
//! estimated token budget. When the budget is exceeded the oldest messages
//! are dropped first, so the most recent turns always survive.

use crate::types::{Message, MessageRole};
use std::collections::VecDeque;

/// Default token budget for a session's history.
pub const DEFAULT_TOKEN_LIMIT: usize = 3000;

/// Estimates token count for a message (rough approximation).
///
/// Uses a simple heuristic of ~4 bytes per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Renders history as `role: content` lines for prompt templates.
pub fn format_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Token-limited message buffer.
#[derive(Debug, Clone)]
pub struct ChatMemory {
    token_limit: usize,
    messages: VecDeque<Message>,
}

impl Default for ChatMemory {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LIMIT)
    }
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            messages: VecDeque::new(),
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        self.trim();
    }

    /// Record a user question and the assistant's answer.
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.push(Message::new(MessageRole::User, question));
        self.push(Message::new(MessageRole::Assistant, answer));
    }

    /// History in chronological order, within the token budget.
    pub fn history(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| estimate_tokens(&m.content)).sum()
    }

    fn trim(&mut self) {
        while self.estimated_tokens() > self.token_limit && !self.messages.is_empty() {
            self.messages.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> Message {
        Message::new(MessageRole::User, content)
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("this is a longer test string"), 7);
        // Multi-byte text counts bytes, not characters
        assert_eq!(estimate_tokens("退貨"), 2);
    }

    #[test]
    fn test_memory_keeps_order() {
        let mut memory = ChatMemory::default();
        memory.record_exchange("how do I return shoes?", "Bring the receipt.");
        let history = memory.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[test]
    fn test_memory_drops_oldest_when_over_budget() {
        let mut memory = ChatMemory::new(5);
        memory.push(msg("aaaaaaaa")); // 2 tokens
        memory.push(msg("bbbbbbbb")); // 2 tokens
        memory.push(msg("cccccccc")); // 2 tokens, total 6 > 5
        let history = memory.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "bbbbbbbb");
        assert!(memory.estimated_tokens() <= memory.token_limit());
    }

    #[test]
    fn test_oversized_message_is_not_kept() {
        let mut memory = ChatMemory::new(2);
        memory.push(msg(&"x".repeat(40)));
        assert!(memory.is_empty());
    }

    #[test]
    fn test_format_history() {
        let mut memory = ChatMemory::default();
        memory.record_exchange("hi", "hello");
        assert_eq!(format_history(&memory.history()), "user: hi\nassistant: hello");
    }
}
