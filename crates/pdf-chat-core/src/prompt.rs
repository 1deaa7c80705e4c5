//! Prompt construction for the two model calls of a chat turn.
//!
//! 1. **Condense**: with prior turns present, the follow-up question is
//!    rewritten into a standalone question used for retrieval.
//! 2. **Answer**: the retrieved chunks are "stuffed" into a system message
//!    as context, followed by the prior turns and the new question.
//!
//! The answer prompt carries the question as the user asked it; the
//! condensed form is only used to search the index.

use crate::llm::Message;
use crate::models::{ChatTurn, SearchHit};

pub const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:";

pub const ANSWER_SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n{context}";

/// Render prior turns as `Human:` / `Assistant:` lines.
pub fn format_history(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("Human: {}\nAssistant: {}", t.question, t.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join retrieved chunk texts, nearest first, separated by blank lines.
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Messages asking the model to rewrite `question` as a standalone question.
pub fn condense_messages(history: &[ChatTurn], question: &str) -> Vec<Message> {
    let prompt = CONDENSE_QUESTION_TEMPLATE
        .replace("{chat_history}", &format_history(history))
        .replace("{question}", question);
    vec![Message::user(prompt)]
}

/// Messages for the grounded answer: context, prior turns, then the question.
pub fn answer_messages(hits: &[SearchHit], history: &[ChatTurn], question: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(Message::system(
        ANSWER_SYSTEM_TEMPLATE.replace("{context}", &format_context(hits)),
    ));
    for turn in history {
        messages.push(Message::user(turn.question.as_str()));
        messages.push(Message::assistant(turn.answer.as_str()));
    }
    messages.push(Message::user(question));
    messages
}
