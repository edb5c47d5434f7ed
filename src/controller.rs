//! The workflow state machine.
//!
//! ## Transition protocol
//!
//! Every user-triggered step goes through the same sequence:
//!
//! ```text
//! admit ──▶ invoke collaborator ──▶ commit ──▶ present
//!   │               │                  │
//!   │               └─ Err ──▶ StageFailure (no state change)
//!   ├─ in flight ──▶ ReentrancyRejection
//!   └─ gate false ─▶ Validation (no state change)
//! ```
//!
//! 1. **admit**, under the state lock: refuse if the step is already in
//!    flight, ask [`crate::gate`] whether the target stage may be entered,
//!    copy out the inputs the collaborator needs and mark the step in flight.
//! 2. **invoke**: the lock is released while the collaborator runs, so
//!    other steps (and queries) stay responsive.
//! 3. **commit**, under the lock again: if the step's input was replaced in
//!    the meantime the result is discarded as `Superseded`; otherwise the
//!    artifact is written, the stage advances and panel visibility follows.
//! 4. **present**: previews and the notes editor are updated. Failures here
//!    are reported on the affected panel but do not undo the commit.
//!
//! The in-flight marker is an RAII guard, so it is cleared on every exit
//! path including a dropped future.
//!
//! Observer events are queued while the lock is held and delivered after it
//! is released.

use crate::collaborators::Collaborators;
use crate::config::WorkflowConfig;
use crate::error::{StageError, WorkflowError};
use crate::export::ExportArtifact;
use crate::gate;
use crate::observer::{NoopObserver, Notice, SharedObserver, VisibilityDirective};
use crate::preview::PreviewCoordinator;
use crate::stage::{Panel, PipelineStage, PreviewSurface, Step, BUSY_MESSAGE};
use crate::store::{ArtifactStore, PageRange, Payload};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Orchestrates the upload → extract → recognise → notes → export workflow.
///
/// Owns the [`ArtifactStore`] and the current [`PipelineStage`]; nothing
/// else mutates them. All methods take `&self`, so one controller can be
/// shared (e.g. behind an `Arc`) between the UI event sources that trigger
/// steps.
pub struct WorkflowController {
    config: WorkflowConfig,
    collaborators: Collaborators,
    preview: PreviewCoordinator,
    observer: SharedObserver,
    state: Mutex<WorkflowState>,
}

struct WorkflowState {
    store: ArtifactStore,
    stage: PipelineStage,
    /// Control panels plus the loading indicator. Previews live in the coordinator.
    panels: BTreeSet<Panel>,
    in_flight: BTreeSet<Step>,
}

impl WorkflowState {
    fn new() -> Self {
        Self {
            store: ArtifactStore::new(),
            stage: PipelineStage::Empty,
            panels: PipelineStage::Empty.panels(),
            in_flight: BTreeSet::new(),
        }
    }

    /// Make `stage` current and queue the visibility changes it implies.
    fn move_to(&mut self, stage: PipelineStage, notices: &mut Vec<Notice>) {
        if stage != self.stage {
            notices.push(Notice::StageChange {
                from: self.stage,
                to: stage,
            });
            self.stage = stage;
        }
        self.sync_panels(notices);
    }

    /// Store `range` as the selection, dropping everything derived from the old one.
    fn select(&mut self, range: PageRange, notices: &mut Vec<Notice>) {
        self.store.invalidate_from(PipelineStage::RangeSelected);
        self.store.set(Payload::Range(range));
        self.move_to(PipelineStage::RangeSelected, notices);
    }

    /// Whether the artifact for `stage` is still the one written at `revision`.
    fn holds(&self, stage: PipelineStage, revision: u64) -> bool {
        self.store.get(stage).map(|a| a.revision) == Some(revision)
    }

    fn sync_panels(&mut self, notices: &mut Vec<Notice>) {
        let mut target = self.stage.panels();
        if !self.in_flight.is_empty() {
            target.insert(Panel::LoadingIndicator);
        }
        for &panel in self.panels.difference(&target) {
            notices.push(Notice::Visibility(VisibilityDirective::Hide(panel)));
        }
        for &panel in target.difference(&self.panels) {
            notices.push(Notice::Visibility(VisibilityDirective::Show(panel)));
        }
        self.panels = target;
    }
}

/// Raw document, selected range and the range's revision, when extraction
/// may run.
fn extraction_input(store: &ArtifactStore) -> Option<(Arc<[u8]>, PageRange, u64)> {
    if !gate::can_enter(PipelineStage::Extracted, store) {
        return None;
    }
    Some((
        store.raw_document()?,
        store.selected_range()?,
        store.get(PipelineStage::RangeSelected)?.revision,
    ))
}

/// Clears a step's in-flight mark when dropped.
struct InFlight<'a> {
    controller: &'a WorkflowController,
    step: Step,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let notices = {
            let mut state = self.controller.lock();
            let mut notices = Vec::new();
            state.in_flight.remove(&self.step);
            state.sync_panels(&mut notices);
            notices
        };
        debug!("{} no longer in flight", self.step);
        self.controller.emit(notices);
    }
}

/// Read-only summary of the workflow, suitable for logging or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub stage: PipelineStage,
    pub revision: u64,
    pub raw_document_bytes: Option<usize>,
    pub selected_range: Option<PageRange>,
    pub extracted_bytes: Option<usize>,
    pub recognized_chars: Option<usize>,
    pub notes_bytes: Option<usize>,
    pub notes_stale: bool,
    pub in_flight: Vec<Step>,
    pub visible_panels: Vec<Panel>,
}

impl WorkflowController {
    /// Create a controller that discards UI events.
    pub fn new(config: WorkflowConfig, collaborators: Collaborators) -> Self {
        Self::with_observer(config, collaborators, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        config: WorkflowConfig,
        collaborators: Collaborators,
        observer: SharedObserver,
    ) -> Self {
        let preview =
            PreviewCoordinator::new(Arc::clone(&collaborators.renderer), Arc::clone(&observer));
        Self {
            config,
            collaborators,
            preview,
            observer,
            state: Mutex::new(WorkflowState::new()),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.lock().stage
    }

    /// Run `f` against the artifact store.
    pub fn with_store<R>(&self, f: impl FnOnce(&ArtifactStore) -> R) -> R {
        f(&self.lock().store)
    }

    /// Every panel currently visible, previews and loading indicator included.
    pub fn visible_panels(&self) -> BTreeSet<Panel> {
        let mut panels = self.lock().panels.clone();
        if let Some(surface) = self.preview.visible() {
            panels.insert(surface.panel());
        }
        panels
    }

    pub fn visible_preview(&self) -> Option<PreviewSurface> {
        self.preview.visible()
    }

    pub fn in_flight(&self) -> Vec<Step> {
        self.lock().in_flight.iter().copied().collect()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let visible_panels = self.visible_panels().into_iter().collect();
        let state = self.lock();
        let store = &state.store;
        WorkflowSnapshot {
            stage: state.stage,
            revision: store.revision(),
            raw_document_bytes: store.raw_document().map(|b| b.len()),
            selected_range: store.selected_range(),
            extracted_bytes: store.extracted_range().map(|b| b.len()),
            recognized_chars: store.recognized_text().map(|t| t.chars().count()),
            notes_bytes: store.derived_notes().map(|n| n.as_html().len()),
            notes_stale: store.is_stale(PipelineStage::NotesGenerated),
            in_flight: state.in_flight.iter().copied().collect(),
            visible_panels,
        }
    }

    // ── Steps ────────────────────────────────────────────────────────────

    /// Read a new document and make it the raw artifact.
    ///
    /// Replacing the document clears the selected range, the extracted range
    /// and the recognised text, and returns the workflow to `Uploaded`.
    /// Derived notes survive until they are regenerated.
    pub async fn upload(&self, source: &str) -> Result<(), WorkflowError> {
        let step = Step::Upload;
        let (_flight, ()) = self.admit(step, |store| {
            (gate::can_enter(PipelineStage::Uploaded, store) && !source.trim().is_empty())
                .then_some(())
        })?;

        info!("Reading document: {}", source);
        let bytes: Arc<[u8]> = match self.collaborators.reader.read_document(source).await {
            Ok(bytes) => bytes.into(),
            Err(cause) => return Err(self.fail(step, cause)),
        };

        let (notices, revision) = {
            let mut state = self.lock();
            let mut notices = Vec::new();
            state.store.invalidate_from(PipelineStage::Uploaded);
            let revision = state.store.set(Payload::Raw(Arc::clone(&bytes)));
            state.move_to(PipelineStage::Uploaded, &mut notices);
            (notices, revision)
        };
        self.emit(notices);
        info!("Uploaded {} bytes from {}", bytes.len(), source);

        if self.still_current(PipelineStage::Uploaded, revision) {
            let rendered = self.preview.show_original(&bytes).await;
            self.report_presentation(Panel::OriginalPreview, rendered);
        }
        Ok(())
    }

    /// Record the page range to extract from the raw document.
    ///
    /// Only syntax is validated here; a range past the last page is rejected
    /// later by the extractor. A new range invalidates the extracted range
    /// and the recognised text.
    pub fn select_range(&self, range: PageRange) -> Result<(), WorkflowError> {
        let step = Step::SelectRange;
        let mut notices = Vec::new();
        let result = {
            let mut state = self.lock();
            if gate::can_select_range(&range, &state.store) {
                state.select(range, &mut notices);
                Ok(())
            } else {
                Err(self.refuse(step, &mut notices))
            }
        };
        self.emit(notices);

        if result.is_ok() {
            debug!("Selected pages {}", range);
            self.hide_extracted_preview();
        }
        result
    }

    /// Copy the selected page range out of the raw document.
    pub async fn extract(&self) -> Result<(), WorkflowError> {
        self.run_extraction(None).await
    }

    /// Select `range` and extract it in one go.
    ///
    /// The selection happens under the same admission as the extraction, so
    /// a split triggered while another extraction is in flight is rejected
    /// before the stored range is touched.
    pub async fn split(&self, range: PageRange) -> Result<(), WorkflowError> {
        self.run_extraction(Some(range)).await
    }

    async fn run_extraction(&self, new_range: Option<PageRange>) -> Result<(), WorkflowError> {
        let step = Step::Extract;
        let (_flight, (raw, range, range_rev)) = self.admit_with(step, |state, notices| {
            if let Some(range) = new_range {
                if !gate::can_select_range(&range, &state.store) {
                    return Err(self.refuse(Step::SelectRange, notices));
                }
                state.select(range, notices);
            }
            extraction_input(&state.store).ok_or_else(|| self.refuse(step, notices))
        })?;
        if let Some(range) = new_range {
            debug!("Selected pages {}", range);
            self.hide_extracted_preview();
        }

        info!("Extracting pages {} from {} bytes", range, raw.len());
        let bytes: Arc<[u8]> = match self.collaborators.extractor.extract_range(&raw, range).await
        {
            Ok(bytes) => bytes.into(),
            Err(cause) => return Err(self.fail(step, cause)),
        };

        let revision =
            self.commit(step, Some(range_rev), Payload::Extracted(Arc::clone(&bytes)))?;
        info!("Extracted pages {} → {} bytes", range, bytes.len());

        if self.still_current(PipelineStage::Extracted, revision) {
            let rendered = self.preview.show_extracted(&bytes).await;
            self.report_presentation(Panel::ExtractedPreview, rendered);
        }
        Ok(())
    }

    /// Run text recognition on the extracted range.
    pub async fn recognize(&self) -> Result<(), WorkflowError> {
        let step = Step::Recognize;
        let (_flight, (document, extracted_rev)) = self.admit(step, |store| {
            if !gate::can_enter(PipelineStage::Recognized, store) {
                return None;
            }
            Some((
                store.extracted_range()?,
                store.get(PipelineStage::Extracted)?.revision,
            ))
        })?;

        info!("Recognising text in {} bytes", document.len());
        let text: Arc<str> = match self.collaborators.recognizer.recognize_text(&document).await {
            Ok(text) => text.into(),
            Err(cause) => return Err(self.fail(step, cause)),
        };

        self.commit(step, Some(extracted_rev), Payload::Text(Arc::clone(&text)))?;
        info!("Recognised {} characters", text.chars().count());

        self.preview.hide_all();
        self.emit(vec![Notice::TextPreview(text.to_string())]);
        Ok(())
    }

    /// Generate notes from the recognised text and load them into the editor.
    pub async fn generate_notes(&self) -> Result<(), WorkflowError> {
        let step = Step::GenerateNotes;
        let (_flight, (text, text_rev)) = self.admit(step, |store| {
            if !gate::can_enter(PipelineStage::NotesGenerated, store) {
                return None;
            }
            Some((
                store.recognized_text()?,
                store.get(PipelineStage::Recognized)?.revision,
            ))
        })?;

        info!("Generating notes from {} characters", text.chars().count());
        let notes = match self.collaborators.generator.generate_notes(&text).await {
            Ok(notes) => notes,
            Err(cause) => return Err(self.fail(step, cause)),
        };

        self.commit(step, Some(text_rev), Payload::Notes(notes.clone()))?;
        info!("Generated {} bytes of notes", notes.as_html().len());

        let loaded = self.collaborators.editor.load_content(&notes).await;
        self.report_presentation(Panel::NotesEditor, loaded);
        Ok(())
    }

    /// Take the editor's current content as the new notes.
    ///
    /// The recognised text is left alone; notes are independently mutable.
    pub async fn edit_notes(&self) -> Result<(), WorkflowError> {
        let step = Step::EditNotes;
        let (_flight, derived_from) = self.admit(step, |store| {
            if !gate::can_enter(PipelineStage::NotesEdited, store) {
                return None;
            }
            Some(store.get(PipelineStage::NotesGenerated)?.derived_from)
        })?;

        let content = match self.collaborators.editor.read_content().await {
            Ok(content) => content,
            Err(cause) => return Err(self.fail(step, cause)),
        };

        self.commit(step, derived_from, Payload::Notes(content))?;
        debug!("Notes edited");
        Ok(())
    }

    /// Serialise the current notes as an HTML download.
    ///
    /// Legal whenever notes exist, regardless of the current stage. Never
    /// changes the stage or the store.
    pub fn export(&self) -> Result<ExportArtifact, WorkflowError> {
        let step = Step::Export;
        let mut notices = Vec::new();
        let result = {
            let state = self.lock();
            match state.store.derived_notes() {
                Some(notes) if gate::can_export(&state.store) => Ok(ExportArtifact::from_notes(
                    self.config.export_file_name.as_str(),
                    notes,
                )),
                _ => Err(self.refuse(step, &mut notices)),
            }
        };
        self.emit(notices);

        let artifact = result?;
        info!(
            "Exporting {} ({} bytes)",
            artifact.file_name,
            artifact.body.len()
        );
        self.observer.on_download(&artifact);
        Ok(artifact)
    }

    /// Export and write the file into `dir`.
    pub async fn export_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, WorkflowError> {
        let artifact = self.export()?;
        artifact.write_to_dir(dir).await.inspect_err(|e| {
            warn!("{}", e);
            self.observer
                .on_error(Step::Export.error_panel(), Step::Export.failure_message());
        })
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, notices: Vec<Notice>) {
        for notice in notices {
            notice.deliver(self.observer.as_ref());
        }
    }

    /// Gate check through `take_input`, refusing with the step's validation
    /// message when it yields nothing.
    fn admit<T>(
        &self,
        step: Step,
        take_input: impl FnOnce(&ArtifactStore) -> Option<T>,
    ) -> Result<(InFlight<'_>, T), WorkflowError> {
        self.admit_with(step, |state, notices| {
            take_input(&state.store).ok_or_else(|| self.refuse(step, notices))
        })
    }

    /// Reentrancy check, then `take_input` under the same lock; on success
    /// the step is marked in flight. `take_input` may update the state only
    /// when it succeeds.
    fn admit_with<T>(
        &self,
        step: Step,
        take_input: impl FnOnce(&mut WorkflowState, &mut Vec<Notice>) -> Result<T, WorkflowError>,
    ) -> Result<(InFlight<'_>, T), WorkflowError> {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.lock();
            if state.in_flight.contains(&step) {
                warn!("{} triggered while already in flight", step);
                notices.push(Notice::Error {
                    panel: step.error_panel(),
                    message: BUSY_MESSAGE.to_string(),
                });
                Err(WorkflowError::ReentrancyRejection { step })
            } else {
                take_input(&mut state, &mut notices).map(|input| {
                    state.in_flight.insert(step);
                    state.sync_panels(&mut notices);
                    debug!("{} in flight", step);
                    input
                })
            }
        };
        self.emit(notices);
        result.map(|input| {
            (
                InFlight {
                    controller: self,
                    step,
                },
                input,
            )
        })
    }

    /// Queue the validation message for `step` and build its error.
    fn refuse(&self, step: Step, notices: &mut Vec<Notice>) -> WorkflowError {
        let message = step.validation_message();
        debug!("{} refused: {}", step, message);
        notices.push(Notice::Error {
            panel: step.validation_panel(),
            message: message.to_string(),
        });
        WorkflowError::Validation {
            step,
            message: message.to_string(),
        }
    }

    /// Surface a collaborator failure and build its error. No state changes.
    fn fail(&self, step: Step, cause: StageError) -> WorkflowError {
        warn!("{} failed: {}", step, cause);
        self.observer
            .on_error(step.error_panel(), step.failure_message());
        WorkflowError::StageFailure { step, cause }
    }

    /// Write a collaborator result and advance to the step's target stage.
    ///
    /// `upstream_rev` is the revision of the input the collaborator consumed.
    /// If that input is no longer current the result is discarded. Returns
    /// the revision of the written artifact.
    fn commit(
        &self,
        step: Step,
        upstream_rev: Option<u64>,
        payload: Payload,
    ) -> Result<u64, WorkflowError> {
        let stage = payload.stage();
        let target = step.target().unwrap_or(stage);

        let committed = {
            let mut state = self.lock();
            let current = stage
                .upstream()
                .and_then(|up| state.store.get(up))
                .map(|a| a.revision);
            if upstream_rev.is_none() || current != upstream_rev {
                None
            } else {
                let mut notices = Vec::new();
                if stage.follows_upstream() {
                    state.store.invalidate_from(stage);
                }
                let revision = state.store.set_with_provenance(payload, upstream_rev);
                state.move_to(target, &mut notices);
                Some((notices, revision))
            }
        };

        match committed {
            Some((notices, revision)) => {
                self.emit(notices);
                Ok(revision)
            }
            None => Err(self.fail(step, StageError::Superseded { step })),
        }
    }

    /// Whether a committed artifact has not been replaced since. Previews are
    /// only drawn for current artifacts.
    fn still_current(&self, stage: PipelineStage, revision: u64) -> bool {
        let current = self.lock().holds(stage, revision);
        if !current {
            debug!("{} artifact replaced before its preview was shown", stage);
        }
        current
    }

    fn hide_extracted_preview(&self) {
        if self.preview.visible() == Some(PreviewSurface::Extracted) {
            self.preview.hide_all();
        }
    }

    /// Report a failed preview render or editor load without undoing the step.
    fn report_presentation(&self, panel: Panel, result: Result<(), StageError>) {
        if let Err(e) = result {
            warn!("Could not update {}: {}", panel, e);
            self.observer.on_error(panel, &e.to_string());
        }
    }
}
