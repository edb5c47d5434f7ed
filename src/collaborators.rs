//! Contracts for the external collaborators the workflow drives.
//!
//! Each trait is a narrow, async, object-safe function contract. The
//! controller holds them as `Arc<dyn …>` so callers can inject the pdfium /
//! vision-LLM implementations from [`crate::adapters`], or in-memory fakes in
//! tests.

use crate::error::StageError;
use crate::stage::PreviewSurface;
use crate::store::{PageRange, RichContent};
use async_trait::async_trait;
use std::sync::Arc;

/// `readDocument(file) -> bytes`.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Read the whole document named by `source` (a path or URL).
    async fn read_document(&self, source: &str) -> Result<Vec<u8>, StageError>;
}

/// `extractRange(bytes, start, end) -> bytes`.
#[async_trait]
pub trait RangeExtractor: Send + Sync {
    /// Copy the inclusive 1-indexed `range` of `document` into a new document.
    ///
    /// Must fail with [`StageError::Extraction`] when `range.end` exceeds the
    /// page count or the document is malformed.
    async fn extract_range(&self, document: &[u8], range: PageRange)
        -> Result<Vec<u8>, StageError>;
}

/// `recognizeText(bytes) -> text`.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize_text(&self, document: &[u8]) -> Result<String, StageError>;
}

/// `generateNotes(text) -> richContent`.
#[async_trait]
pub trait NotesGenerator: Send + Sync {
    async fn generate_notes(&self, text: &str) -> Result<RichContent, StageError>;
}

/// `renderPreview(bytes, surface) -> void`.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Render `document` onto `surface`. Returns once rendering completed or failed.
    async fn render_preview(
        &self,
        document: &[u8],
        surface: PreviewSurface,
    ) -> Result<(), StageError>;
}

/// `readEditorContent()` / `loadEditorContent(richContent)`.
#[async_trait]
pub trait NotesEditor: Send + Sync {
    async fn read_content(&self) -> Result<RichContent, StageError>;

    async fn load_content(&self, content: &RichContent) -> Result<(), StageError>;
}

/// Every collaborator the controller needs, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub reader: Arc<dyn DocumentReader>,
    pub extractor: Arc<dyn RangeExtractor>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub generator: Arc<dyn NotesGenerator>,
    pub renderer: Arc<dyn PreviewRenderer>,
    pub editor: Arc<dyn NotesEditor>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
