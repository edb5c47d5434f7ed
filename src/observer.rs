//! Observer trait through which the workflow talks to the UI layer.
//!
//! The core never touches a rendering surface. It emits visibility
//! directives (`show`/`hide` per named [`Panel`]), error events carrying
//! `(panel, message)`, the recognised text for the OCR preview, stage
//! changes, and finished downloads. A thin adapter applies them to a
//! terminal, a web page, or a test recorder.
//!
//! # Example
//!
//! ```rust
//! use pagenotes::{Panel, WorkflowObserver};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct ErrorLog {
//!     errors: Mutex<Vec<(Panel, String)>>,
//! }
//!
//! impl WorkflowObserver for ErrorLog {
//!     fn on_error(&self, panel: Panel, message: &str) {
//!         self.errors.lock().unwrap().push((panel, message.to_string()));
//!     }
//! }
//! ```

use crate::export::ExportArtifact;
use crate::stage::{Panel, PipelineStage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single show/hide instruction for one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "panel", rename_all = "snake_case")]
pub enum VisibilityDirective {
    Show(Panel),
    Hide(Panel),
}

impl VisibilityDirective {
    pub fn panel(self) -> Panel {
        match self {
            VisibilityDirective::Show(p) | VisibilityDirective::Hide(p) => p,
        }
    }

    pub fn is_show(self) -> bool {
        matches!(self, VisibilityDirective::Show(_))
    }
}

/// Receives UI events from the workflow.
///
/// All methods default to no-ops so implementations override only what they
/// need. Events are delivered after the controller has released its state
/// lock, so an observer may query the controller from inside a callback.
pub trait WorkflowObserver: Send + Sync {
    /// A panel must be shown or hidden.
    fn on_visibility(&self, directive: VisibilityDirective) {
        let _ = directive;
    }

    /// A step failed or was refused; show `message` on `panel`.
    fn on_error(&self, panel: Panel, message: &str) {
        let _ = (panel, message);
    }

    /// New recognised text for the OCR preview panel.
    fn on_text_preview(&self, text: &str) {
        let _ = text;
    }

    /// The current stage moved.
    fn on_stage_change(&self, from: PipelineStage, to: PipelineStage) {
        let _ = (from, to);
    }

    /// Exported notes are ready to be saved by the client.
    fn on_download(&self, artifact: &ExportArtifact) {
        let _ = artifact;
    }
}

/// Observer that ignores every event. Used when none is supplied.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Shared observer handle as stored by the controller.
pub type SharedObserver = Arc<dyn WorkflowObserver>;

/// An event queued while the state lock is held and delivered afterwards.
#[derive(Debug, Clone)]
pub(crate) enum Notice {
    Visibility(VisibilityDirective),
    Error { panel: Panel, message: String },
    TextPreview(String),
    StageChange { from: PipelineStage, to: PipelineStage },
}

impl Notice {
    pub(crate) fn deliver(self, observer: &dyn WorkflowObserver) {
        match self {
            Notice::Visibility(d) => observer.on_visibility(d),
            Notice::Error { panel, message } => observer.on_error(panel, &message),
            Notice::TextPreview(text) => observer.on_text_preview(&text),
            Notice::StageChange { from, to } => observer.on_stage_change(from, to),
        }
    }
}
