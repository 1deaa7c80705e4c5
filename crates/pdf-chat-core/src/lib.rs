//! # pdf-chat core
//!
//! Provider-agnostic logic for pdf-chat: the recursive text splitter, the
//! in-memory similarity index and the indexer that fills it, conversation
//! memory, prompt construction, and the conversational retriever that ties
//! them together.
//!
//! This crate performs no network or filesystem I/O. Embedding and
//! generation backends are reached through the [`embedding::EmbeddingProvider`]
//! and [`llm::ChatModel`] traits, implemented by the `pdf-chat` app crate.

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod memory;
pub mod models;
pub mod prompt;
pub mod retriever;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
