//! Conversational retriever: the memory-aware retrieval-and-answer step.
//!
//! A [`ConversationalRetriever`] binds one immutable [`SimilarityIndex`] to
//! the process-wide [`SharedMemory`]. Every upload builds a new retriever
//! around the new index and a clone of the same memory handle, so the
//! conversation survives re-indexing.
//!
//! # Turn lifecycle
//!
//! 1. Lock the memory (turns are serialized).
//! 2. If condensing is enabled and history exists, rewrite the question as
//!    a standalone question for retrieval.
//! 3. Embed the retrieval query and take the `top_k` nearest chunks.
//! 4. Ask the chat model for an answer grounded in those chunks and the
//!    prior turns.
//! 5. Record the turn. Any failure before this point leaves memory as it was.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::SimilarityIndex;
use crate::llm::ChatModel;
use crate::memory::SharedMemory;
use crate::models::{Answer, ChatTurn, SearchHit};
use crate::prompt;

/// Number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub top_k: usize,
    /// Rephrase follow-up questions into standalone ones before retrieval.
    pub condense_question: bool,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            condense_question: true,
        }
    }
}

/// An answering session over one index and the shared conversation.
pub struct ConversationalRetriever {
    index: Arc<SimilarityIndex>,
    memory: SharedMemory,
    embedder: Arc<dyn EmbeddingProvider>,
    chat_model: Arc<dyn ChatModel>,
    settings: RetrieverSettings,
}

impl ConversationalRetriever {
    pub fn new(
        index: Arc<SimilarityIndex>,
        memory: SharedMemory,
        embedder: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            index,
            memory,
            embedder,
            chat_model,
            settings,
        }
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    /// Embed `query` and return the nearest chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>> {
        let vector = embed_query(self.embedder.as_ref(), query)
            .await
            .context("failed to embed question")?;
        self.index.search(&vector, self.settings.top_k)
    }

    /// Answer `question` and record the turn in memory.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let mut memory = self.memory.lock().await;
        let history = memory.turns().to_vec();

        let retrieval_query = if self.settings.condense_question && !history.is_empty() {
            let messages = prompt::condense_messages(&history, question);
            let condensed = self
                .chat_model
                .complete(&messages)
                .await
                .context("failed to condense follow-up question")?;
            let condensed = condensed.trim();
            if condensed.is_empty() {
                question.to_string()
            } else {
                condensed.to_string()
            }
        } else {
            question.to_string()
        };

        let sources = self.retrieve(&retrieval_query).await?;
        tracing::debug!(
            query = %retrieval_query,
            hits = sources.len(),
            chunks = ?sources.iter().map(|h| h.chunk.index).collect::<Vec<_>>(),
            "retrieved context"
        );

        let messages = prompt::answer_messages(&sources, &history, question);
        let text = self
            .chat_model
            .complete(&messages)
            .await
            .with_context(|| format!("{} failed to answer", self.chat_model.model_name()))?;

        memory.push(ChatTurn::new(question, text.clone()));

        Ok(Answer {
            text,
            retrieval_query,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::chunk::RecursiveSplitter;
    use crate::indexer::{build_index, IndexOptions};
    use crate::memory::ConversationMemory;
    use crate::testing::{EchoModel, StubEmbedder};

    const CORPUS: &str = "The capital of France is Paris.\n\n\
        Rust is a systems programming language focused on safety.\n\n\
        Photosynthesis converts light energy into chemical energy in plants.\n\n\
        The Pacific is the largest ocean on Earth.";

    async fn retriever_over(
        text: &str,
        splitter: RecursiveSplitter,
        memory: SharedMemory,
    ) -> (ConversationalRetriever, Arc<StubEmbedder>, Arc<EchoModel>) {
        let embedder = Arc::new(StubEmbedder::default());
        let model = Arc::new(EchoModel::default());
        let index = build_index(
            text,
            &splitter,
            embedder.as_ref(),
            &IndexOptions::default(),
            None,
        )
        .await
        .unwrap();
        let retriever = ConversationalRetriever::new(
            Arc::new(index),
            memory,
            embedder.clone(),
            model.clone(),
            RetrieverSettings::default(),
        );
        (retriever, embedder, model)
    }

    fn small_chunks() -> RecursiveSplitter {
        RecursiveSplitter::new(80, 0).unwrap()
    }

    #[tokio::test]
    async fn test_answer_is_grounded_in_retrieved_chunk() {
        let (retriever, _, _) =
            retriever_over(CORPUS, small_chunks(), ConversationMemory::shared()).await;
        let answer = retriever
            .answer("What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(answer.sources.len(), 3);
        assert!(answer.sources[0].chunk.text.contains("Paris"));
        assert!(answer.text.contains("The capital of France is Paris."));
    }

    #[tokio::test]
    async fn test_successful_turn_appends_one_pair() {
        let memory = ConversationMemory::shared();
        let (retriever, _, _) = retriever_over(CORPUS, small_chunks(), memory.clone()).await;

        let answer = retriever.answer("Tell me about Rust").await.unwrap();

        let guard = memory.lock().await;
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.turns()[0], ChatTurn::new("Tell me about Rust", answer.text));
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_memory_untouched() {
        let memory = ConversationMemory::shared();
        let (retriever, _, model) = retriever_over(CORPUS, small_chunks(), memory.clone()).await;
        retriever.answer("first question").await.unwrap();

        model.fail.store(true, Ordering::SeqCst);
        assert!(retriever.answer("second question").await.is_err());
        assert_eq!(memory.lock().await.len(), 1);

        model.fail.store(false, Ordering::SeqCst);
        retriever.answer("third question").await.unwrap();
        let guard = memory.lock().await;
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.turns()[1].question, "third question");
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_memory_untouched() {
        let memory = ConversationMemory::shared();
        let (retriever, embedder, model) =
            retriever_over(CORPUS, small_chunks(), memory.clone()).await;
        embedder.fail.store(true, Ordering::SeqCst);

        assert!(retriever.answer("anything").await.is_err());
        assert!(memory.lock().await.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed_and_history_is_prompted() {
        let memory = ConversationMemory::shared();
        let (retriever, _, model) = retriever_over(CORPUS, small_chunks(), memory.clone()).await;

        retriever.answer("What is the largest ocean?").await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);

        let answer = retriever.answer("Which plants do photosynthesis?").await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(answer.retrieval_query, "Which plants do photosynthesis?");

        let seen = model.seen.lock().unwrap();
        let condense = &seen[1];
        assert!(condense[0].content.contains("Human: What is the largest ocean?"));
        let final_prompt = &seen[2];
        assert_eq!(final_prompt.len(), 4);
        assert_eq!(final_prompt[1].content, "What is the largest ocean?");
        assert_eq!(final_prompt[3].content, "Which plants do photosynthesis?");
    }

    /// Rewrites follow-ups to a fixed standalone question and records the
    /// user message of every answer prompt.
    #[derive(Default)]
    struct RephrasingModel {
        answered: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChatModel for RephrasingModel {
        fn model_name(&self) -> &str {
            "rephrasing"
        }

        async fn complete(&self, messages: &[crate::llm::Message]) -> Result<String> {
            if messages.len() == 1 {
                return Ok("What is photosynthesis in plants?".to_string());
            }
            let question = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.answered.lock().unwrap().push(question);
            Ok("answer".to_string())
        }
    }

    #[tokio::test]
    async fn test_answer_prompt_uses_original_question() {
        let embedder = Arc::new(StubEmbedder::default());
        let model = Arc::new(RephrasingModel::default());
        let index = build_index(
            CORPUS,
            &small_chunks(),
            embedder.as_ref(),
            &IndexOptions::default(),
            None,
        )
        .await
        .unwrap();
        let retriever = ConversationalRetriever::new(
            Arc::new(index),
            ConversationMemory::shared(),
            embedder,
            model.clone(),
            RetrieverSettings::default(),
        );

        retriever.answer("Tell me about oceans").await.unwrap();
        let answer = retriever.answer("And the green stuff?").await.unwrap();

        assert_eq!(answer.retrieval_query, "What is photosynthesis in plants?");
        assert!(answer.sources[0].chunk.text.contains("Photosynthesis"));
        let answered = model.answered.lock().unwrap();
        assert_eq!(answered.as_slice(), ["Tell me about oceans", "And the green stuff?"]);
    }

    #[tokio::test]
    async fn test_condensing_can_be_disabled() {
        let embedder = Arc::new(StubEmbedder::default());
        let model = Arc::new(EchoModel::default());
        let index = build_index(
            CORPUS,
            &small_chunks(),
            embedder.as_ref(),
            &IndexOptions::default(),
            None,
        )
        .await
        .unwrap();
        let retriever = ConversationalRetriever::new(
            Arc::new(index),
            ConversationMemory::shared(),
            embedder,
            model.clone(),
            RetrieverSettings {
                top_k: 1,
                condense_question: false,
            },
        );

        retriever.answer("one").await.unwrap();
        let answer = retriever.answer("two").await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_rebuilt_retriever_keeps_conversation() {
        let memory = ConversationMemory::shared();
        let (first, _, _) = retriever_over(CORPUS, small_chunks(), memory.clone()).await;
        first.answer("What is Rust?").await.unwrap();

        let grown = format!("{}\n\nMount Everest is the tallest mountain.", CORPUS);
        let (second, _, model) = retriever_over(&grown, small_chunks(), memory.clone()).await;
        second.answer("How tall is Everest?").await.unwrap();

        assert_eq!(memory.lock().await.len(), 2);
        let seen = model.seen.lock().unwrap();
        assert!(seen[0][0].content.contains("Human: What is Rust?"));
    }
}
