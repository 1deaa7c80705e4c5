//! Text extraction for uploaded PDF documents.
//!
//! Best-effort linear extraction: the text of every page, in document
//! order, as one UTF-8 string. Layout, tables, and images are ignored.
//! There is no partial-text fallback; a document either extracts or fails.

use std::sync::Arc;

use thiserror::Error;

/// MIME type accepted by [`PdfExtractor`].
pub const MIME_PDF: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// The parser panicked on hostile or malformed input.
    #[error("PDF extraction aborted: {0}")]
    Panicked(String),
}

/// Converts document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// [`TextExtractor`] backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

/// Run `extractor` on a blocking thread.
///
/// Extraction is CPU-bound, and the PDF parser can panic on malformed
/// input; a panic is contained by the blocking task and reported as
/// [`ExtractError::Panicked`].
pub async fn extract_blocking(
    extractor: Arc<dyn TextExtractor>,
    bytes: Vec<u8>,
) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .map_err(|e| ExtractError::Panicked(e.to_string()))?
}
