//! Core data types that flow through the indexing and answering pipeline.

/// A bounded segment of corpus text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in split order, starting at 0.
    pub index: usize,
    pub text: String,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A chunk returned from a nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query vector. Lower is closer.
    pub distance: f32,
}

/// The result of one answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// The query actually used for retrieval (the rephrased standalone
    /// question when condensing is enabled and history exists).
    pub retrieval_query: String,
    pub sources: Vec<SearchHit>,
}
