//! Deterministic stand-ins for the external services, with call counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::llm::{ChatModel, Message, Role};

pub const STUB_DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into a bucket and
/// the counts are L2-normalised. Texts sharing words land close together.
#[derive(Default)]
pub struct StubEmbedder {
    pub calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
    pub fail: AtomicBool,
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; STUB_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % STUB_DIMS as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Chat model that echoes the system message (the retrieved context) for
/// answer prompts and returns the follow-up verbatim for condense prompts.
#[derive(Default)]
pub struct EchoModel {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub seen: Mutex<Vec<Vec<Message>>>,
}

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            bail!("generation service unavailable");
        }
        match messages.first() {
            Some(m) if m.role == Role::System => Ok(m.content.clone()),
            Some(m) => Ok(m
                .content
                .rsplit("Follow Up Input: ")
                .next()
                .and_then(|rest| rest.split('\n').next())
                .unwrap_or_default()
                .to_string()),
            None => bail!("no messages"),
        }
    }
}
