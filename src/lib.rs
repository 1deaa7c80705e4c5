//! # pdf-chat
//!
//! Conversational question answering over uploaded PDF documents.
//!
//! Uploaded PDFs are reduced to text and appended to one process-wide
//! corpus. After every upload the corpus is re-chunked, embedded, and
//! indexed for similarity search, and a conversational retriever is rebound
//! to the existing conversation memory. Questions are answered from the
//! chunks most similar to the (optionally condensed) question.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Upload  │──▶│  Extractor  │──▶│    Corpus     │
//! │  (HTTP)  │   │ pdf-extract │   │ chunk + embed │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │ index
//! ┌──────────┐   ┌─────────────┐   ┌──────▼───────┐
//! │   Chat   │──▶│  Retriever  │◀──│   Memory     │
//! │  (HTTP)  │   │ condense+QA │   │ (turn list)  │
//! └──────────┘   └─────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | Embedding providers (OpenAI, disabled) |
//! | [`llm`] | Chat model providers (OpenAI, disabled) |
//! | [`openai`] | Shared HTTP client for OpenAI-compatible APIs |
//! | [`service`] | Corpus, index, and conversation state |
//! | [`server`] | HTTP server |
//!
//! Chunking, the similarity index, memory, prompts, and the retriever live
//! in the `pdf-chat-core` crate.

pub mod config;
pub mod embedding;
pub mod extract;
pub mod llm;
pub mod openai;
pub mod server;
pub mod service;
