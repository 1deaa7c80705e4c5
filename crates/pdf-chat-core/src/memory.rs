//! Conversation memory shared by every chat turn in the process.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::ChatTurn;

/// Handle to the single long-lived conversation. Retrievers rebuilt after
/// an upload clone this handle instead of creating a new memory.
pub type SharedMemory = Arc<Mutex<ConversationMemory>>;

/// Ordered record of completed question/answer turns. Append-only.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<ChatTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty memory wrapped for sharing.
    pub fn shared() -> SharedMemory {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }
}
