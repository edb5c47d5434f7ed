//! Concrete collaborators for running the workflow on real PDFs.
//!
//! ```text
//! upload ──▶ extract ──▶ recognise ──▶ generate ──▶ edit
//! (input)    (pdf)       (vision)      (notes)      (editor)
//! ```
//!
//! 1. [`input`]   read a local file or download a URL; checks `%PDF` magic
//! 2. [`pdf`]     pdfium range extraction, rasterisation and the terminal
//!    preview renderer; all pdfium work runs in `spawn_blocking`
//! 3. [`vision`]  page images → vision LLM → cleaned text
//! 4. [`notes`]   recognised text → LLM → HTML notes fragment
//! 5. [`editor`]  in-memory and `$EDITOR`-backed notes editors
//!
//! [`llm`] holds the shared retry/timeout call, [`provider`] the provider
//! resolution chain and [`postprocess`] the output cleanup rules.

pub mod editor;
pub mod input;
pub mod llm;
pub mod notes;
pub mod pdf;
pub mod postprocess;
pub mod provider;
pub mod vision;

pub use editor::{BufferEditor, ExternalEditor};
pub use input::FsDocumentReader;
pub use notes::LlmNotesGenerator;
pub use pdf::{PageCountRenderer, PdfiumExtractor};
pub use provider::resolve_provider;
pub use vision::VisionRecognizer;

use crate::collaborators::{Collaborators, NotesEditor};
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use std::sync::Arc;

/// Build the pdfium + LLM collaborators described by `config`.
///
/// The provider is resolved once and shared by recognition and notes
/// generation. The notes editor is supplied by the caller.
pub fn pdf_collaborators(
    config: &WorkflowConfig,
    editor: Arc<dyn NotesEditor>,
) -> Result<Collaborators, WorkflowError> {
    let provider = resolve_provider(config)?;
    Ok(Collaborators {
        reader: Arc::new(FsDocumentReader::new(config.download_timeout_secs)),
        extractor: Arc::new(PdfiumExtractor::new(config.password.clone())),
        recognizer: Arc::new(VisionRecognizer::new(Arc::clone(&provider), config)),
        generator: Arc::new(LlmNotesGenerator::new(provider, config)),
        renderer: Arc::new(PageCountRenderer::new(config.password.clone())),
        editor,
    })
}
