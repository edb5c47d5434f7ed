//! Error types for the pagenotes library.
//!
//! Two error types mirror two layers:
//!
//! * [`StageError`]: a collaborator (reader, extractor, recogniser, notes
//!   generator, renderer, editor) could not produce its result. It carries
//!   the technical detail and is cheap to clone so it can travel inside
//!   events and snapshots.
//!
//! * [`WorkflowError`]: what a controller operation returns. Every variant
//!   is recoverable: the workflow stays in its last-known-good stage with all
//!   previously produced artifacts intact, and the user may retry.

use crate::stage::Step;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the controller for one attempted step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A precondition is not met: bad user input or a missing upstream
    /// artifact. Nothing was invoked and nothing changed.
    #[error("Cannot start {step}: {message}")]
    Validation { step: Step, message: String },

    /// The collaborator for `step` failed. Nothing changed.
    #[error("{step} failed: {cause}")]
    StageFailure {
        step: Step,
        #[source]
        cause: StageError,
    },

    /// `step` is already in flight; the second trigger was dropped.
    #[error("{step} is already in progress, please wait")]
    ReentrancyRejection { step: Step },

    /// Could not write the exported notes to disk.
    #[error("Failed to write export file '{path}': {source}")]
    ExportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No LLM provider could be created for recognition and notes.
    #[error("LLM provider '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },
}

impl WorkflowError {
    /// The step this error belongs to, when there is one.
    pub fn step(&self) -> Option<Step> {
        match self {
            WorkflowError::Validation { step, .. }
            | WorkflowError::StageFailure { step, .. }
            | WorkflowError::ReentrancyRejection { step } => Some(*step),
            WorkflowError::ExportWriteFailed { .. } => Some(Step::Export),
            WorkflowError::InvalidConfig(_) | WorkflowError::ProviderNotConfigured { .. } => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation { .. })
    }

    pub fn is_stage_failure(&self) -> bool {
        matches!(self, WorkflowError::StageFailure { .. })
    }

    pub fn is_reentrancy(&self) -> bool {
        matches!(self, WorkflowError::ReentrancyRejection { .. })
    }
}

/// A collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The document could not be read (I/O, download, not a PDF).
    #[error("Could not read '{source_name}': {detail}")]
    Read { source_name: String, detail: String },

    /// Page range extraction failed (range beyond page count, malformed document).
    #[error("Extraction failed: {detail}")]
    Extraction { detail: String },

    /// Text recognition failed.
    #[error("Recognition failed: {detail}")]
    Recognition { detail: String },

    /// Notes generation failed.
    #[error("Notes generation failed: {detail}")]
    Generation { detail: String },

    /// A preview could not be rendered.
    #[error("Preview rendering failed: {detail}")]
    Render { detail: String },

    /// The notes editor could not be read or loaded.
    #[error("Notes editor error: {detail}")]
    Editor { detail: String },

    /// The step's input was replaced while its collaborator was running;
    /// the result was discarded.
    #[error("Input changed while {step} was running; result discarded")]
    Superseded { step: Step },
}

impl StageError {
    pub fn extraction(detail: impl Into<String>) -> Self {
        StageError::Extraction {
            detail: detail.into(),
        }
    }

    pub fn recognition(detail: impl Into<String>) -> Self {
        StageError::Recognition {
            detail: detail.into(),
        }
    }

    pub fn generation(detail: impl Into<String>) -> Self {
        StageError::Generation {
            detail: detail.into(),
        }
    }

    pub fn render(detail: impl Into<String>) -> Self {
        StageError::Render {
            detail: detail.into(),
        }
    }

    pub fn editor(detail: impl Into<String>) -> Self {
        StageError::Editor {
            detail: detail.into(),
        }
    }
}
