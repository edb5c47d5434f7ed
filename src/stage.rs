//! Pipeline stages, user-triggered steps and the UI panels they drive.
//!
//! ## Stage order
//!
//! ```text
//! Empty ──▶ Uploaded ──▶ RangeSelected ──▶ Extracted ──▶ Recognized ──▶ NotesGenerated ──▶ NotesEdited
//! ```
//!
//! Exactly one stage is current at any time. The current stage alone decides
//! which control panels are visible; the two preview surfaces are owned by
//! [`crate::preview::PreviewCoordinator`] and the loading indicator by the
//! in-flight bookkeeping of [`crate::controller::WorkflowController`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Message surfaced when a step is triggered again while still in flight.
pub const BUSY_MESSAGE: &str = "Please wait, the previous request is still running.";

/// One step of the linear workflow. Ordering follows the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Nothing uploaded yet.
    Empty,
    /// A raw document is held.
    Uploaded,
    /// A well-formed page range was chosen for the raw document.
    RangeSelected,
    /// The page range was copied out into its own document.
    Extracted,
    /// Text was recognised from the extracted range.
    Recognized,
    /// Notes were generated from the recognised text.
    NotesGenerated,
    /// The generated notes were edited by the user.
    NotesEdited,
}

impl PipelineStage {
    /// All stages in pipeline order.
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::Empty,
        PipelineStage::Uploaded,
        PipelineStage::RangeSelected,
        PipelineStage::Extracted,
        PipelineStage::Recognized,
        PipelineStage::NotesGenerated,
        PipelineStage::NotesEdited,
    ];

    /// The stage whose artifact this stage's artifact is derived from.
    ///
    /// `NotesEdited` shares the notes slot with `NotesGenerated`, so both
    /// report `Recognized`.
    pub fn upstream(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Empty | PipelineStage::Uploaded => None,
            PipelineStage::RangeSelected => Some(PipelineStage::Uploaded),
            PipelineStage::Extracted => Some(PipelineStage::RangeSelected),
            PipelineStage::Recognized => Some(PipelineStage::Extracted),
            PipelineStage::NotesGenerated | PipelineStage::NotesEdited => {
                Some(PipelineStage::Recognized)
            }
        }
    }

    /// Whether upstream replacement clears this stage's artifact.
    ///
    /// Notes are a derived but independently mutable artifact; they survive
    /// until the user regenerates them.
    pub fn follows_upstream(self) -> bool {
        !matches!(
            self,
            PipelineStage::NotesGenerated | PipelineStage::NotesEdited
        )
    }

    /// Control panels visible while this stage is current.
    ///
    /// Preview surfaces and the loading indicator are not part of this table.
    pub fn panels(self) -> BTreeSet<Panel> {
        let panels: &[Panel] = match self {
            PipelineStage::Empty => &[Panel::Upload],
            PipelineStage::Uploaded | PipelineStage::RangeSelected => {
                &[Panel::Upload, Panel::SplitControls]
            }
            PipelineStage::Extracted => &[Panel::Upload, Panel::SplitControls, Panel::OcrControls],
            PipelineStage::Recognized => &[
                Panel::Upload,
                Panel::SplitControls,
                Panel::OcrControls,
                Panel::OcrTextPreview,
                Panel::NotesControls,
            ],
            PipelineStage::NotesGenerated | PipelineStage::NotesEdited => &[
                Panel::Upload,
                Panel::SplitControls,
                Panel::OcrControls,
                Panel::NotesControls,
                Panel::NotesEditor,
            ],
        };
        panels.iter().copied().collect()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Empty => "empty",
            PipelineStage::Uploaded => "uploaded",
            PipelineStage::RangeSelected => "range selected",
            PipelineStage::Extracted => "extracted",
            PipelineStage::Recognized => "recognized",
            PipelineStage::NotesGenerated => "notes generated",
            PipelineStage::NotesEdited => "notes edited",
        };
        f.write_str(name)
    }
}

/// A user-triggered action. Errors and in-flight bookkeeping are keyed by step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Upload,
    SelectRange,
    Extract,
    Recognize,
    GenerateNotes,
    EditNotes,
    Export,
}

impl Step {
    /// The stage a successful step makes current. `Export` never moves the stage.
    pub fn target(self) -> Option<PipelineStage> {
        match self {
            Step::Upload => Some(PipelineStage::Uploaded),
            Step::SelectRange => Some(PipelineStage::RangeSelected),
            Step::Extract => Some(PipelineStage::Extracted),
            Step::Recognize => Some(PipelineStage::Recognized),
            Step::GenerateNotes => Some(PipelineStage::NotesGenerated),
            Step::EditNotes => Some(PipelineStage::NotesEdited),
            Step::Export => None,
        }
    }

    /// Panel on which failures of this step are surfaced.
    pub fn error_panel(self) -> Panel {
        match self {
            Step::Upload => Panel::OriginalPreview,
            Step::SelectRange | Step::Extract => Panel::ExtractedPreview,
            Step::Recognize => Panel::OcrTextPreview,
            Step::GenerateNotes => Panel::NotesEditor,
            Step::EditNotes | Step::Export => Panel::NotesEditor,
        }
    }

    /// Panel on which a missing precondition is reported.
    ///
    /// Differs from [`Step::error_panel`] only for notes generation, whose
    /// missing input is the OCR text shown in the OCR preview.
    pub fn validation_panel(self) -> Panel {
        match self {
            Step::GenerateNotes => Panel::OcrTextPreview,
            other => other.error_panel(),
        }
    }

    pub fn validation_message(self) -> &'static str {
        match self {
            Step::Upload => "No document selected. Please choose a PDF file.",
            Step::SelectRange | Step::Extract => {
                "Invalid input. Please specify a valid page range."
            }
            Step::Recognize => "No split PDF available. Please split the PDF first.",
            Step::GenerateNotes => "No OCR text available. Please perform OCR first.",
            Step::EditNotes => "No notes to edit. Please generate notes first.",
            Step::Export => "No notes available. Please generate notes first.",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Step::Upload => "Failed to load the PDF. Please try again.",
            Step::SelectRange | Step::Extract => "Failed to split the PDF. Please try again.",
            Step::Recognize => "Failed to perform OCR. Please try again.",
            Step::GenerateNotes => "Failed to generate notes. Please try again.",
            Step::EditNotes => "Failed to read the notes editor. Please try again.",
            Step::Export => "Failed to save the notes. Please try again.",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Upload => "upload",
            Step::SelectRange => "range selection",
            Step::Extract => "extraction",
            Step::Recognize => "text recognition",
            Step::GenerateNotes => "notes generation",
            Step::EditNotes => "notes editing",
            Step::Export => "export",
        };
        f.write_str(name)
    }
}

/// Named UI panels the core emits show/hide directives for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Panel {
    Upload,
    SplitControls,
    OcrControls,
    OcrTextPreview,
    NotesControls,
    NotesEditor,
    OriginalPreview,
    ExtractedPreview,
    LoadingIndicator,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Panel::Upload => "upload",
            Panel::SplitControls => "splitControls",
            Panel::OcrControls => "ocrControls",
            Panel::OcrTextPreview => "ocrTextPreview",
            Panel::NotesControls => "notesControls",
            Panel::NotesEditor => "notesEditor",
            Panel::OriginalPreview => "originalPreview",
            Panel::ExtractedPreview => "extractedPreview",
            Panel::LoadingIndicator => "loadingIndicator",
        };
        f.write_str(name)
    }
}

/// The two mutually exclusive preview surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSurface {
    Original,
    Extracted,
}

impl PreviewSurface {
    pub fn panel(self) -> Panel {
        match self {
            PreviewSurface::Original => Panel::OriginalPreview,
            PreviewSurface::Extracted => Panel::ExtractedPreview,
        }
    }
}

impl fmt::Display for PreviewSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.panel(), f)
    }
}
