//! Condense-question RAG over the policy documents.

use crate::chat::intent::{self, Intent};
use crate::llm::LLMClient;
use crate::memory::format_history;
use crate::rag::{RagService, ScoredChunk};
use crate::session::SessionManager;
use crate::types::{Message, Result};
use std::sync::Arc;
use tracing::debug;

const CONDENSE_QUESTION_TEMPLATE: &str = "Given a conversation (between Human and Assistant) and a follow up message from Human, \
rewrite the message to be a standalone question that captures all relevant context from the conversation.\n\n\
<Chat History>\n{chat_history}\n\n<Follow Up Message>\n{question}\n\n<Standalone question>\n";

const QA_TEMPLATE: &str = "你是專業的客服助理。根據提供的退貨政策內容回答問題，需要合理推理相關條款。\
\n\n[退貨政策內容]\n{context_str}\n\n[客戶問題]\n{query_str}\
\n\n回答指引：\
\n- 仔細分析所有相關條款\
\n- 提供明確的答案和依據\
\n- 如果有灰色地帶，建議聯絡客服\
\n- 只有在政策完全沒有涉及時才回答「不知道」";

const GENERAL_TEMPLATE: &str = "你是一個友善的智能助理。請直接回答用戶的問題，但要提醒用戶我主要專長是協助退貨相關問題。\
\n\n用戶問題：{message}\
\n\n請提供簡潔有用的回答，並在最後提及如果有退貨相關問題可以詢問我。";

/// How a message is turned into an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Always answer from the policy documents
    Rag,
    /// Route by intent first
    Routed,
}

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub standalone_question: String,
    pub sources: Vec<ScoredChunk>,
}

pub fn condense_prompt(history: &[Message], question: &str) -> String {
    CONDENSE_QUESTION_TEMPLATE
        .replace("{chat_history}", &format_history(history))
        .replace("{question}", question)
}

pub fn qa_prompt(chunks: &[ScoredChunk], query: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| format!("source: {}\n\n{}", c.source, c.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    QA_TEMPLATE
        .replace("{context_str}", &context)
        .replace("{query_str}", query)
}

pub fn general_prompt(message: &str) -> String {
    GENERAL_TEMPLATE.replace("{message}", message)
}

pub struct ChatEngine {
    llm: Arc<dyn LLMClient>,
    rag: Arc<RagService>,
}

impl ChatEngine {
    pub fn new(llm: Arc<dyn LLMClient>, rag: Arc<RagService>) -> Self {
        Self { llm, rag }
    }

    pub fn rag(&self) -> &Arc<RagService> {
        &self.rag
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer `question` from the documents, resolving it against `history` first.
    pub async fn rag_answer(
        &self,
        question: &str,
        history: &[Message],
        top_k: usize,
    ) -> Result<RagAnswer> {
        let standalone_question = if history.is_empty() {
            question.to_string()
        } else {
            let condensed = self.llm.generate(&condense_prompt(history, question)).await?;
            let condensed = condensed.trim();
            if condensed.is_empty() {
                question.to_string()
            } else {
                condensed.to_string()
            }
        };
        debug!(%standalone_question, "Querying index");

        let sources = self.rag.retrieve(&standalone_question, top_k).await?;
        let answer = self
            .llm
            .generate(&qa_prompt(&sources, &standalone_question))
            .await?;

        Ok(RagAnswer {
            answer,
            standalone_question,
            sources,
        })
    }

    /// Answer directly, without retrieval.
    pub async fn general_answer(&self, message: &str) -> Result<String> {
        self.llm.generate(&general_prompt(message)).await
    }

    /// Produce the reply for one chat turn, recording it in the session memory
    /// when it came from retrieval.
    pub async fn respond(
        &self,
        sessions: &SessionManager,
        session_id: &str,
        message: &str,
        mode: AnswerMode,
        top_k: usize,
    ) -> Result<String> {
        let intent = match mode {
            AnswerMode::Rag => Intent::ReturnRelated,
            AnswerMode::Routed => intent::classify(message),
        };
        debug!(?intent, "Answering message");

        match intent {
            Intent::Simple => Ok(intent::simple_response(message).to_string()),
            Intent::General => self.general_answer(message).await,
            Intent::ReturnRelated => {
                let history = sessions.history(session_id);
                let reply = self.rag_answer(message, &history, top_k).await?;
                sessions.record_exchange(session_id, message, &reply.answer);
                Ok(reply.answer)
            }
        }
    }
}
