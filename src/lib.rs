//! # pagenotes
//!
//! Turn a few pages of a PDF into editable study notes.
//!
//! The crate is built around a workflow state machine. A user uploads a
//! document, picks a page range, extracts it, runs text recognition on the
//! extracted pages, generates notes from the recognised text, edits them and
//! exports them as HTML. The [`WorkflowController`] tracks which stage is
//! active, which artifacts exist and which UI panels are valid, and makes
//! sure a failing step never corrupts what earlier steps produced.
//!
//! ## Workflow Overview
//!
//! ```text
//! Empty
//!  │ upload
//!  ├─▶ Uploaded ── select range ──▶ RangeSelected
//!  │                                   │ extract
//!  │                                   ▼
//!  │                               Extracted ── recognise ──▶ Recognized
//!  │                                                             │ generate notes
//!  │                                                             ▼
//!  │                                   NotesEdited ◀── edit ── NotesGenerated
//!  │                                        │
//!  └──── re-upload resets to Uploaded       └─ export ──▶ processed-notes.html
//! ```
//!
//! Every step is carried out by an injected collaborator (see
//! [`collaborators`]). The [`adapters`] module provides pdfium and
//! vision-LLM implementations; tests inject in-memory fakes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagenotes::adapters::{pdf_collaborators, BufferEditor};
//! use pagenotes::{PageRange, WorkflowConfig, WorkflowController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = WorkflowConfig::builder().build()?;
//!     let collaborators = pdf_collaborators(&config, Arc::new(BufferEditor::new()))?;
//!     let workflow = WorkflowController::new(config, collaborators);
//!
//!     workflow.upload("lecture.pdf").await?;
//!     workflow.split(PageRange::new(2, 4)).await?;
//!     workflow.recognize().await?;
//!     workflow.generate_notes().await?;
//!     let path = workflow.export_to_dir(".").await?;
//!     eprintln!("notes written to {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `pagenotes` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `bundled` | off     | Embeds the pdfium shared library in the binary |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pagenotes = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapters;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod gate;
pub mod observer;
pub mod preview;
pub mod prompts;
pub mod stage;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collaborators::{
    Collaborators, DocumentReader, NotesEditor, NotesGenerator, PreviewRenderer, RangeExtractor,
    TextRecognizer,
};
pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use controller::{WorkflowController, WorkflowSnapshot};
pub use error::{StageError, WorkflowError};
pub use export::ExportArtifact;
pub use observer::{NoopObserver, SharedObserver, VisibilityDirective, WorkflowObserver};
pub use preview::PreviewCoordinator;
pub use stage::{Panel, PipelineStage, PreviewSurface, Step};
pub use store::{Artifact, ArtifactStore, PageRange, Payload, RichContent};
