//! End-to-end workflow tests with in-memory collaborators.
//!
//! No pdfium or LLM is involved: every collaborator is a fake whose
//! behaviour (failures, blocking) is switched per test, and a recording
//! observer captures the UI events the controller emits.

use async_trait::async_trait;
use pagenotes::adapters::BufferEditor;
use pagenotes::{
    Collaborators, DocumentReader, NotesGenerator, PageRange, Panel, PipelineStage,
    PreviewRenderer, PreviewSurface, RangeExtractor, RichContent, StageError, Step,
    TextRecognizer, VisibilityDirective, WorkflowConfig, WorkflowController, WorkflowError,
    WorkflowObserver,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

// ── Fakes ────────────────────────────────────────────────────────────────

const PAGE_COUNT: i64 = 10;

#[derive(Default)]
struct FakeReader {
    fail: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl DocumentReader for FakeReader {
    async fn read_document(&self, source: &str) -> Result<Vec<u8>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StageError::Read {
                source_name: source.to_string(),
                detail: "permission denied".into(),
            });
        }
        Ok(format!("%PDF {source}").into_bytes())
    }
}

/// Pretends every document has `PAGE_COUNT` pages. Optionally blocks until
/// released so tests can act while an extraction is in flight.
#[derive(Default)]
struct FakeExtractor {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl RangeExtractor for FakeExtractor {
    async fn extract_range(
        &self,
        document: &[u8],
        range: PageRange,
    ) -> Result<Vec<u8>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if range.end > PAGE_COUNT {
            return Err(StageError::extraction(format!(
                "page range {} exceeds the document's {} pages",
                range, PAGE_COUNT
            )));
        }
        let source = String::from_utf8_lossy(document);
        Ok(format!("pages {range} of [{source}]").into_bytes())
    }
}

#[derive(Default)]
struct FakeRecognizer {
    fail: AtomicBool,
    blank: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize_text(&self, document: &[u8]) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StageError::recognition("vision model unavailable"));
        }
        if self.blank.load(Ordering::SeqCst) {
            return Ok("   \n".into());
        }
        Ok(format!("text of {}", String::from_utf8_lossy(document)))
    }
}

#[derive(Default)]
struct FakeGenerator {
    fail: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl NotesGenerator for FakeGenerator {
    async fn generate_notes(&self, text: &str) -> Result<RichContent, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StageError::generation("rate limited"));
        }
        Ok(RichContent::new(format!("<h1>Notes</h1><p>{text}</p>")))
    }
}

#[derive(Default)]
struct FakeRenderer {
    fail: AtomicBool,
    rendered: Mutex<Vec<PreviewSurface>>,
}

#[async_trait]
impl PreviewRenderer for FakeRenderer {
    async fn render_preview(
        &self,
        _document: &[u8],
        surface: PreviewSurface,
    ) -> Result<(), StageError> {
        self.rendered.lock().unwrap().push(surface);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StageError::render("canvas unavailable"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Visibility(VisibilityDirective),
    Error(Panel, String),
    TextPreview(String),
    Stage(PipelineStage, PipelineStage),
    Download(String),
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Event>>);

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<(Panel, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(p, m) => Some((p, m)),
                _ => None,
            })
            .collect()
    }

    fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl WorkflowObserver for Recorder {
    fn on_visibility(&self, directive: VisibilityDirective) {
        self.0.lock().unwrap().push(Event::Visibility(directive));
    }
    fn on_error(&self, panel: Panel, message: &str) {
        self.0
            .lock()
            .unwrap()
            .push(Event::Error(panel, message.to_string()));
    }
    fn on_text_preview(&self, text: &str) {
        self.0
            .lock()
            .unwrap()
            .push(Event::TextPreview(text.to_string()));
    }
    fn on_stage_change(&self, from: PipelineStage, to: PipelineStage) {
        self.0.lock().unwrap().push(Event::Stage(from, to));
    }
    fn on_download(&self, artifact: &pagenotes::ExportArtifact) {
        self.0
            .lock()
            .unwrap()
            .push(Event::Download(artifact.body.clone()));
    }
}

struct Harness {
    workflow: Arc<WorkflowController>,
    reader: Arc<FakeReader>,
    extractor: Arc<FakeExtractor>,
    recognizer: Arc<FakeRecognizer>,
    generator: Arc<FakeGenerator>,
    renderer: Arc<FakeRenderer>,
    editor: Arc<BufferEditor>,
    events: Arc<Recorder>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness_with(extractor: FakeExtractor) -> Harness {
    init_tracing();
    let reader = Arc::new(FakeReader::default());
    let extractor = Arc::new(extractor);
    let recognizer = Arc::new(FakeRecognizer::default());
    let generator = Arc::new(FakeGenerator::default());
    let renderer = Arc::new(FakeRenderer::default());
    let editor = Arc::new(BufferEditor::new());
    let events = Arc::new(Recorder::default());

    let collaborators = Collaborators {
        reader: reader.clone(),
        extractor: extractor.clone(),
        recognizer: recognizer.clone(),
        generator: generator.clone(),
        renderer: renderer.clone(),
        editor: editor.clone(),
    };
    let workflow = Arc::new(WorkflowController::with_observer(
        WorkflowConfig::default(),
        collaborators,
        events.clone(),
    ));

    Harness {
        workflow,
        reader,
        extractor,
        recognizer,
        generator,
        renderer,
        editor,
        events,
    }
}

fn harness() -> Harness {
    harness_with(FakeExtractor::default())
}

fn panels(list: &[Panel]) -> BTreeSet<Panel> {
    list.iter().copied().collect()
}

async fn run_to_notes(h: &Harness) {
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.split(PageRange::new(2, 4)).await.unwrap();
    h.workflow.recognize().await.unwrap();
    h.workflow.generate_notes().await.unwrap();
}

/// Store revision and current stage; equal fingerprints mean nothing changed.
fn fingerprint(workflow: &WorkflowController) -> (u64, PipelineStage) {
    (workflow.with_store(|s| s.revision()), workflow.stage())
}

async fn wait_until_in_flight(workflow: &WorkflowController, step: Step) {
    while !workflow.in_flight().contains(&step) {
        tokio::task::yield_now().await;
    }
}

// ── Happy path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn full_workflow_exports_edited_notes() {
    let h = harness();
    let wf = &h.workflow;
    assert_eq!(wf.stage(), PipelineStage::Empty);

    wf.upload("lecture.pdf").await.unwrap();
    assert_eq!(wf.stage(), PipelineStage::Uploaded);
    assert_eq!(wf.visible_preview(), Some(PreviewSurface::Original));

    wf.select_range(PageRange::new(2, 4)).unwrap();
    assert_eq!(wf.stage(), PipelineStage::RangeSelected);

    wf.extract().await.unwrap();
    assert_eq!(wf.stage(), PipelineStage::Extracted);
    assert_eq!(wf.visible_preview(), Some(PreviewSurface::Extracted));

    wf.recognize().await.unwrap();
    assert_eq!(wf.stage(), PipelineStage::Recognized);
    assert_eq!(wf.visible_preview(), None);

    wf.generate_notes().await.unwrap();
    assert_eq!(wf.stage(), PipelineStage::NotesGenerated);
    assert!(h.editor.get().as_html().starts_with("<h1>Notes</h1>"));

    h.editor.set("<h1>Thermodynamics</h1><p>Entropy &amp; order</p>");
    wf.edit_notes().await.unwrap();
    assert_eq!(wf.stage(), PipelineStage::NotesEdited);

    let artifact = wf.export().unwrap();
    assert_eq!(artifact.file_name, "processed-notes.html");
    assert_eq!(artifact.mime_type, "text/html");
    assert_eq!(
        artifact.body,
        "<h1>Thermodynamics</h1><p>Entropy &amp; order</p>"
    );
    assert_eq!(wf.stage(), PipelineStage::NotesEdited);

    assert_eq!(
        h.events.events().last(),
        Some(&Event::Download(artifact.body.clone()))
    );
    assert_eq!(h.renderer.rendered.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn stage_changes_are_reported_in_order() {
    let h = harness();
    run_to_notes(&h).await;

    let stages: Vec<PipelineStage> = h
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Stage(_, to) => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            PipelineStage::Uploaded,
            PipelineStage::RangeSelected,
            PipelineStage::Extracted,
            PipelineStage::Recognized,
            PipelineStage::NotesGenerated,
        ]
    );
}

#[tokio::test]
async fn recognition_publishes_text_and_shows_notes_controls() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.split(PageRange::new(2, 4)).await.unwrap();
    h.workflow.recognize().await.unwrap();

    let text = h
        .workflow
        .with_store(|s| s.recognized_text())
        .expect("text stored");
    assert!(h
        .events
        .events()
        .contains(&Event::TextPreview(text.to_string())));
    assert_eq!(
        h.workflow.visible_panels(),
        panels(&[
            Panel::Upload,
            Panel::SplitControls,
            Panel::OcrControls,
            Panel::OcrTextPreview,
            Panel::NotesControls,
        ])
    );
}

#[tokio::test]
async fn editing_keeps_recognized_text() {
    let h = harness();
    run_to_notes(&h).await;
    let before = h.workflow.with_store(|s| s.recognized_text());

    h.editor.set("<p>mine</p>");
    h.workflow.edit_notes().await.unwrap();

    assert_eq!(h.workflow.with_store(|s| s.recognized_text()), before);
    assert_eq!(
        h.workflow
            .with_store(|s| s.derived_notes().cloned())
            .unwrap()
            .as_html(),
        "<p>mine</p>"
    );
}

// ── Validation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn reversed_range_is_rejected_without_extracting() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.events.clear();

    let err = h.workflow.split(PageRange::new(5, 3)).await.unwrap_err();
    assert!(err.is_validation(), "got: {err}");
    assert_eq!(err.step(), Some(Step::SelectRange));
    assert_eq!(h.workflow.stage(), PipelineStage::Uploaded);
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.events.errors(),
        vec![(
            Panel::ExtractedPreview,
            "Invalid input. Please specify a valid page range.".to_string()
        )]
    );
}

#[tokio::test]
async fn zero_start_page_is_rejected() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    let err = h.workflow.select_range(PageRange::new(0, 2)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.workflow.with_store(|s| s.selected_range()), None);
}

#[tokio::test]
async fn range_needs_a_document() {
    let h = harness();
    let err = h.workflow.select_range(PageRange::new(1, 2)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.workflow.stage(), PipelineStage::Empty);
}

#[tokio::test]
async fn recognize_before_extract_is_rejected() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.select_range(PageRange::new(2, 4)).unwrap();
    h.events.clear();

    let err = h.workflow.recognize().await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.workflow.stage(), PipelineStage::RangeSelected);
    assert_eq!(
        h.events.errors(),
        vec![(
            Panel::OcrTextPreview,
            "No split PDF available. Please split the PDF first.".to_string()
        )]
    );
}

#[tokio::test]
async fn generate_before_recognize_is_rejected() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.split(PageRange::new(1, 1)).await.unwrap();

    let err = h.workflow.generate_notes().await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.events.errors().last().map(|(p, _)| *p),
        Some(Panel::OcrTextPreview)
    );
}

#[tokio::test]
async fn blank_text_cannot_generate_notes() {
    let h = harness();
    h.recognizer.blank.store(true, Ordering::SeqCst);
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.split(PageRange::new(1, 2)).await.unwrap();
    h.workflow.recognize().await.unwrap();

    let err = h.workflow.generate_notes().await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.workflow.stage(), PipelineStage::Recognized);
}

#[tokio::test]
async fn empty_source_is_rejected() {
    let h = harness();
    let err = h.workflow.upload("  ").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.reader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn export_without_notes_is_rejected() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    let err = assert_err!(h.workflow.export());
    assert!(err.is_validation());
    assert_eq!(
        h.events.errors().last().map(|(p, _)| *p),
        Some(Panel::NotesEditor)
    );
}

// ── Re-upload and staleness ──────────────────────────────────────────────

#[tokio::test]
async fn reupload_resets_to_uploaded_and_hides_downstream() {
    let h = harness();
    run_to_notes(&h).await;
    h.events.clear();

    h.workflow.upload("other.pdf").await.unwrap();

    assert_eq!(h.workflow.stage(), PipelineStage::Uploaded);
    h.workflow.with_store(|s| {
        assert!(s.raw_document().unwrap().ends_with(b"other.pdf"));
        assert_eq!(s.selected_range(), None);
        assert!(s.extracted_range().is_none());
        assert!(s.recognized_text().is_none());
        assert!(s.derived_notes().is_some());
        assert!(s.is_stale(PipelineStage::NotesGenerated));
    });
    assert_eq!(
        h.workflow.visible_panels(),
        panels(&[Panel::Upload, Panel::SplitControls, Panel::OriginalPreview])
    );

    let events = h.events.events();
    for panel in [Panel::OcrControls, Panel::NotesControls, Panel::NotesEditor] {
        assert!(
            events.contains(&Event::Visibility(VisibilityDirective::Hide(panel))),
            "{panel} not hidden"
        );
    }
}

#[tokio::test]
async fn stale_notes_can_be_exported_but_not_edited() {
    let h = harness();
    run_to_notes(&h).await;
    let notes = h.editor.get();
    h.workflow.upload("other.pdf").await.unwrap();

    assert_eq!(h.workflow.export().unwrap().body, notes.as_html());
    assert!(h.workflow.edit_notes().await.unwrap_err().is_validation());
}

#[tokio::test]
async fn new_range_invalidates_extraction_and_hides_its_preview() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.split(PageRange::new(2, 4)).await.unwrap();
    assert_eq!(h.workflow.visible_preview(), Some(PreviewSurface::Extracted));

    h.workflow.select_range(PageRange::new(6, 7)).unwrap();
    assert_eq!(h.workflow.stage(), PipelineStage::RangeSelected);
    assert!(h.workflow.with_store(|s| s.extracted_range()).is_none());
    assert_eq!(h.workflow.visible_preview(), None);
}

#[tokio::test]
async fn reupload_during_extraction_discards_the_result() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(FakeExtractor {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.select_range(PageRange::new(2, 4)).unwrap();

    let wf = h.workflow.clone();
    let extraction = tokio::spawn(async move { wf.extract().await });
    wait_until_in_flight(&h.workflow, Step::Extract).await;

    h.workflow.upload("other.pdf").await.unwrap();
    gate.notify_one();

    let err = extraction.await.unwrap().unwrap_err();
    match err {
        WorkflowError::StageFailure { step, cause } => {
            assert_eq!(step, Step::Extract);
            assert_eq!(cause, StageError::Superseded { step: Step::Extract });
        }
        other => panic!("expected superseded, got {other}"),
    }
    assert_eq!(h.workflow.stage(), PipelineStage::Uploaded);
    assert!(h.workflow.with_store(|s| s.extracted_range()).is_none());
    assert!(h.workflow.in_flight().is_empty());
}

// ── Reentrancy ───────────────────────────────────────────────────────────

#[tokio::test]
async fn second_extraction_while_in_flight_is_rejected() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(FakeExtractor {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.select_range(PageRange::new(2, 4)).unwrap();

    let wf = h.workflow.clone();
    let first = tokio::spawn(async move { wf.extract().await });
    wait_until_in_flight(&h.workflow, Step::Extract).await;

    let revision_before = h.workflow.with_store(|s| s.revision());
    let second = h.workflow.extract().await;
    assert!(matches!(
        second,
        Err(WorkflowError::ReentrancyRejection {
            step: Step::Extract
        })
    ));
    assert_eq!(h.workflow.with_store(|s| s.revision()), revision_before);

    gate.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.workflow.stage(), PipelineStage::Extracted);
    assert!(h
        .events
        .errors()
        .iter()
        .any(|(p, m)| *p == Panel::ExtractedPreview && m.contains("Please wait")));
}

#[tokio::test]
async fn second_split_while_extracting_changes_nothing() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(FakeExtractor {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    h.workflow.upload("lecture.pdf").await.unwrap();

    let wf = h.workflow.clone();
    let first = tokio::spawn(async move { wf.split(PageRange::new(2, 4)).await });
    wait_until_in_flight(&h.workflow, Step::Extract).await;

    let before = fingerprint(&h.workflow);
    for range in [PageRange::new(2, 4), PageRange::new(6, 7), PageRange::new(5, 3)] {
        let err = assert_err!(h.workflow.split(range).await);
        assert!(
            matches!(
                err,
                WorkflowError::ReentrancyRejection {
                    step: Step::Extract
                }
            ),
            "got: {err}"
        );
        assert_eq!(fingerprint(&h.workflow), before);
        assert_eq!(
            h.workflow.with_store(|s| s.selected_range()),
            Some(PageRange::new(2, 4))
        );
    }

    gate.notify_one();
    assert_ok!(first.await.unwrap());

    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.workflow.stage(), PipelineStage::Extracted);
    assert!(h.workflow.with_store(|s| s.extracted_range()).is_some());
    assert_eq!(h.workflow.visible_preview(), Some(PreviewSurface::Extracted));
}

#[tokio::test]
async fn refused_steps_leave_store_and_stage_untouched() {
    let h = harness();

    // Nothing uploaded yet.
    let before = fingerprint(&h.workflow);
    assert_err!(h.workflow.upload("  ").await);
    assert_err!(h.workflow.select_range(PageRange::new(1, 2)));
    assert_err!(h.workflow.split(PageRange::new(1, 2)).await);
    assert_err!(h.workflow.extract().await);
    assert_err!(h.workflow.recognize().await);
    assert_err!(h.workflow.generate_notes().await);
    assert_err!(h.workflow.edit_notes().await);
    assert_err!(h.workflow.export());
    assert_eq!(fingerprint(&h.workflow), before);
    assert_eq!(before.1, PipelineStage::Empty);

    // Document held, nothing derived from it.
    h.workflow.upload("lecture.pdf").await.unwrap();
    let before = fingerprint(&h.workflow);
    assert_err!(h.workflow.select_range(PageRange::new(0, 2)));
    assert_err!(h.workflow.split(PageRange::new(5, 3)).await);
    assert_err!(h.workflow.extract().await);
    assert_err!(h.workflow.recognize().await);
    assert_err!(h.workflow.generate_notes().await);
    assert_err!(h.workflow.edit_notes().await);
    assert_err!(h.workflow.export());
    assert_eq!(fingerprint(&h.workflow), before);

    // Blank recognised text.
    h.recognizer.blank.store(true, Ordering::SeqCst);
    h.workflow.split(PageRange::new(1, 2)).await.unwrap();
    h.workflow.recognize().await.unwrap();
    let before = fingerprint(&h.workflow);
    assert_err!(h.workflow.generate_notes().await);
    assert_err!(h.workflow.edit_notes().await);
    assert_err!(h.workflow.export());
    assert_eq!(fingerprint(&h.workflow), before);

    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert!(h.workflow.in_flight().is_empty());
}

#[tokio::test]
async fn loading_indicator_follows_in_flight_steps() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(FakeExtractor {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.select_range(PageRange::new(2, 4)).unwrap();
    assert!(!h.workflow.visible_panels().contains(&Panel::LoadingIndicator));

    let wf = h.workflow.clone();
    let extraction = tokio::spawn(async move { wf.extract().await });
    wait_until_in_flight(&h.workflow, Step::Extract).await;
    assert!(h.workflow.visible_panels().contains(&Panel::LoadingIndicator));

    gate.notify_one();
    extraction.await.unwrap().unwrap();
    assert!(!h.workflow.visible_panels().contains(&Panel::LoadingIndicator));

    let loading: Vec<bool> = h
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Visibility(d) if d.panel() == Panel::LoadingIndicator => Some(d.is_show()),
            _ => None,
        })
        .collect();
    // upload, extract
    assert_eq!(loading, vec![true, false, true, false]);
}

// ── Stage failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_upload_leaves_workflow_empty() {
    let h = harness();
    h.reader.fail.store(true, Ordering::SeqCst);

    let err = h.workflow.upload("locked.pdf").await.unwrap_err();
    assert!(err.is_stage_failure());
    assert_eq!(h.workflow.stage(), PipelineStage::Empty);
    assert!(h.workflow.with_store(|s| s.raw_document()).is_none());
    assert_eq!(
        h.events.errors(),
        vec![(
            Panel::OriginalPreview,
            "Failed to load the PDF. Please try again.".to_string()
        )]
    );
}

#[tokio::test]
async fn range_past_last_page_fails_extraction_and_can_be_retried() {
    let h = harness();
    h.workflow.upload("lecture.pdf").await.unwrap();

    let err = h.workflow.split(PageRange::new(8, 12)).await.unwrap_err();
    match &err {
        WorkflowError::StageFailure { step, cause } => {
            assert_eq!(*step, Step::Extract);
            assert!(matches!(cause, StageError::Extraction { .. }));
        }
        other => panic!("expected stage failure, got {other}"),
    }
    assert_eq!(h.workflow.stage(), PipelineStage::RangeSelected);
    assert!(h.workflow.with_store(|s| s.raw_document()).is_some());
    assert_eq!(
        h.events.errors().last(),
        Some(&(
            Panel::ExtractedPreview,
            "Failed to split the PDF. Please try again.".to_string()
        ))
    );

    h.workflow.split(PageRange::new(8, 10)).await.unwrap();
    assert_eq!(h.workflow.stage(), PipelineStage::Extracted);
}

#[tokio::test]
async fn failed_recognition_keeps_extraction() {
    let h = harness();
    h.recognizer.fail.store(true, Ordering::SeqCst);
    h.workflow.upload("lecture.pdf").await.unwrap();
    h.workflow.split(PageRange::new(2, 4)).await.unwrap();

    let err = h.workflow.recognize().await.unwrap_err();
    assert!(err.is_stage_failure());
    assert_eq!(h.workflow.stage(), PipelineStage::Extracted);
    assert!(h.workflow.with_store(|s| s.extracted_range()).is_some());
    assert!(!h.workflow.visible_panels().contains(&Panel::OcrTextPreview));

    h.recognizer.fail.store(false, Ordering::SeqCst);
    h.workflow.recognize().await.unwrap();
    assert_eq!(h.workflow.stage(), PipelineStage::Recognized);
}

#[tokio::test]
async fn failed_regeneration_keeps_previous_notes() {
    let h = harness();
    run_to_notes(&h).await;
    let notes = h.workflow.with_store(|s| s.derived_notes().cloned());

    h.generator.fail.store(true, Ordering::SeqCst);
    let err = h.workflow.generate_notes().await.unwrap_err();
    assert!(err.is_stage_failure());
    assert_eq!(h.workflow.stage(), PipelineStage::NotesGenerated);
    assert_eq!(h.workflow.with_store(|s| s.derived_notes().cloned()), notes);
    assert_eq!(
        h.events.errors().last(),
        Some(&(
            Panel::NotesEditor,
            "Failed to generate notes. Please try again.".to_string()
        ))
    );
}

#[tokio::test]
async fn render_failure_does_not_undo_upload() {
    let h = harness();
    h.renderer.fail.store(true, Ordering::SeqCst);

    h.workflow.upload("lecture.pdf").await.unwrap();
    assert_eq!(h.workflow.stage(), PipelineStage::Uploaded);
    assert!(h.workflow.with_store(|s| s.raw_document()).is_some());

    let errors = h.events.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, Panel::OriginalPreview);
    assert_eq!(h.renderer.rendered.lock().unwrap().len(), 1);
}

// ── Export ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_is_idempotent() {
    let h = harness();
    run_to_notes(&h).await;
    let revision = h.workflow.with_store(|s| s.revision());

    let first = assert_ok!(h.workflow.export());
    let second = assert_ok!(h.workflow.export());
    assert_eq!(first, second);
    assert_eq!(h.workflow.stage(), PipelineStage::NotesGenerated);
    assert_eq!(h.workflow.with_store(|s| s.revision()), revision);
}

#[tokio::test]
async fn export_to_dir_writes_the_notes_file() {
    let h = harness();
    run_to_notes(&h).await;
    let tmp = tempfile::tempdir().unwrap();

    let path = h.workflow.export_to_dir(tmp.path()).await.unwrap();
    assert_eq!(path, tmp.path().join("processed-notes.html"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        h.editor.get().as_html()
    );
}

#[tokio::test]
async fn snapshot_serialises_current_state() {
    let h = harness();
    run_to_notes(&h).await;

    let snapshot = h.workflow.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::NotesGenerated);
    assert_eq!(snapshot.selected_range, Some(PageRange::new(2, 4)));
    assert!(!snapshot.notes_stale);
    assert!(snapshot.in_flight.is_empty());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["stage"], "notes_generated");
    assert_eq!(json["selected_range"]["start"], 2);
    assert!(json["visible_panels"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("notesEditor")));
}
