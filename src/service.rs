//! The chat service: process-wide corpus, index, and conversation.
//!
//! [`ChatService`] owns everything one running process shares: the
//! accumulated corpus text, the current answering session (index bound to
//! memory), and the conversation memory itself. The HTTP layer holds it in
//! an `Arc` and calls [`ingest`](ChatService::ingest) for uploads and
//! [`chat`](ChatService::chat) for questions.
//!
//! # Concurrency
//!
//! - Uploads are single-writer. The corpus mutex is held for the whole
//!   upload, so concurrent uploads apply one after another.
//! - The corpus and the new session are committed together, and only after
//!   extraction and indexing both succeeded. A failed upload changes nothing.
//! - Chats clone the current session `Arc` under a short read lock and never
//!   observe a half-built session. Turns serialize on the memory lock.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use pdf_chat_core::chunk::RecursiveSplitter;
use pdf_chat_core::embedding::EmbeddingProvider;
use pdf_chat_core::indexer::{build_index, IndexOptions};
use pdf_chat_core::llm::ChatModel;
use pdf_chat_core::memory::{ConversationMemory, SharedMemory};
use pdf_chat_core::models::{Answer, ChatTurn};
use pdf_chat_core::retriever::{ConversationalRetriever, RetrieverSettings};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{extract_blocking, ExtractError, PdfExtractor, TextExtractor};
use crate::llm::create_chat_model;

/// Answer returned when a question arrives before any successful upload.
pub const NO_DOCUMENTS_WARNING: &str = "⚠️ Please upload at least one PDF before chatting.";

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Documents processed by this upload.
    pub files: usize,
    /// Characters in the corpus after the upload.
    pub corpus_chars: usize,
    /// Chunks in the rebuilt index.
    pub chunks: usize,
}

/// Outcome of a chat request that did not fail.
#[derive(Debug, Clone)]
pub enum ChatReply {
    /// The query was empty or whitespace; no service was called.
    Empty,
    /// No upload has succeeded yet.
    NoDocuments,
    Answered(Answer),
}

impl ChatReply {
    /// The text sent back to the user.
    pub fn text(&self) -> &str {
        match self {
            ChatReply::Empty => "",
            ChatReply::NoDocuments => NO_DOCUMENTS_WARNING,
            ChatReply::Answered(answer) => &answer.text,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to extract text from {name}: {source}")]
    Extraction {
        name: String,
        #[source]
        source: ExtractError,
    },
    #[error("failed to rebuild the document index: {0:#}")]
    Indexing(anyhow::Error),
    #[error("failed to answer the question: {0:#}")]
    Answering(anyhow::Error),
}

pub struct ChatService {
    splitter: RecursiveSplitter,
    index_options: IndexOptions,
    retriever_settings: RetrieverSettings,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat_model: Arc<dyn ChatModel>,
    memory: SharedMemory,
    corpus: Mutex<String>,
    session: RwLock<Option<Arc<ConversationalRetriever>>>,
}

impl ChatService {
    /// Build a service with explicit collaborators.
    pub fn new(
        config: &Config,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let splitter =
            RecursiveSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        Ok(Self {
            splitter,
            index_options: config.embedding.index_options(),
            retriever_settings: config.retrieval.retriever_settings(),
            extractor,
            embedder,
            chat_model,
            memory: ConversationMemory::shared(),
            corpus: Mutex::new(String::new()),
            session: RwLock::new(None),
        })
    }

    /// Build a service with the PDF extractor and the providers named in
    /// `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.embedding.is_enabled() {
            tracing::warn!("embedding provider is disabled; uploads will be rejected");
        }
        if !config.llm.is_enabled() {
            tracing::warn!("llm provider is disabled; questions will be rejected");
        }
        let embedder = create_embedder(&config.embedding)?;
        let chat_model = create_chat_model(&config.llm)?;
        tracing::info!(
            embedding_model = embedder.model_name(),
            chat_model = chat_model.model_name(),
            chunk_size = config.chunking.chunk_size,
            chunk_overlap = config.chunking.chunk_overlap,
            top_k = config.retrieval.top_k,
            "chat service configured"
        );
        Self::new(config, Arc::new(PdfExtractor), embedder, chat_model)
    }

    /// Extract every file, append the text to the corpus, rebuild the
    /// index, and rebind the session to the existing conversation.
    ///
    /// All-or-nothing: if any file fails to extract, or indexing fails, the
    /// corpus and session are left exactly as they were.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<UploadSummary, ServiceError> {
        let mut corpus = self.corpus.lock().await;
        let count = files.len();

        let mut new_text = String::new();
        for file in files {
            let size = file.bytes.len();
            let text = extract_blocking(self.extractor.clone(), file.bytes)
                .await
                .map_err(|source| ServiceError::Extraction {
                    name: file.name.clone(),
                    source,
                })?;
            tracing::info!(
                file = %file.name,
                bytes = size,
                chars = text.chars().count(),
                "extracted document text"
            );
            new_text.push_str(&text);
            new_text.push('\n');
        }

        let candidate = format!("{}{}", corpus.as_str(), new_text);
        let previous = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.index().clone());

        let index = build_index(
            &candidate,
            &self.splitter,
            self.embedder.as_ref(),
            &self.index_options,
            previous.as_deref(),
        )
        .await
        .map_err(ServiceError::Indexing)?;
        let chunks = index.len();

        let retriever = ConversationalRetriever::new(
            Arc::new(index),
            self.memory.clone(),
            self.embedder.clone(),
            self.chat_model.clone(),
            self.retriever_settings.clone(),
        );
        *self.session.write().await = Some(Arc::new(retriever));
        *corpus = candidate;

        let summary = UploadSummary {
            files: count,
            corpus_chars: corpus.chars().count(),
            chunks,
        };
        tracing::info!(
            files = summary.files,
            corpus_chars = summary.corpus_chars,
            chunks = summary.chunks,
            "knowledge base rebuilt"
        );
        Ok(summary)
    }

    /// Answer `query` against the current session.
    pub async fn chat(&self, query: &str) -> Result<ChatReply, ServiceError> {
        if query.trim().is_empty() {
            return Ok(ChatReply::Empty);
        }

        let session = self.session.read().await.clone();
        let Some(session) = session else {
            return Ok(ChatReply::NoDocuments);
        };

        let answer = session
            .answer(query)
            .await
            .map_err(ServiceError::Answering)?;
        tracing::info!(
            sources = answer.sources.len(),
            answer_chars = answer.text.chars().count(),
            "answered question"
        );
        Ok(ChatReply::Answered(answer))
    }

    /// The accumulated corpus text.
    pub async fn corpus_text(&self) -> String {
        self.corpus.lock().await.clone()
    }

    /// Chunks in the current index, or `None` before the first upload.
    pub async fn indexed_chunks(&self) -> Option<usize> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.index().len())
    }

    /// Completed turns of the shared conversation, oldest first.
    pub async fn history(&self) -> Vec<ChatTurn> {
        self.memory.lock().await.turns().to_vec()
    }
}
