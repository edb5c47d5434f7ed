//! Stage gate: pure legality checks for entering a pipeline stage.
//!
//! None of these functions mutate anything, log, or fail. A `false` answer
//! means a precondition is missing; turning that into a user-facing message
//! is the caller's job (see [`crate::stage::Step::validation_message`]).
//!
//! The upper bound of a page range is intentionally not checked here. The
//! gate never sees the document's page count; the extraction collaborator
//! rejects an out-of-range `end` as an ordinary stage failure.

use crate::stage::PipelineStage;
use crate::store::{ArtifactStore, PageRange};

/// Whether `target` may be entered given the artifacts currently held.
pub fn can_enter(target: PipelineStage, store: &ArtifactStore) -> bool {
    match target {
        PipelineStage::Empty => false,
        PipelineStage::Uploaded => true,
        PipelineStage::RangeSelected => {
            store.raw_document().is_some()
                && store
                    .selected_range()
                    .is_some_and(|r| r.is_well_formed())
                && !store.is_stale(PipelineStage::RangeSelected)
        }
        PipelineStage::Extracted => can_enter(PipelineStage::RangeSelected, store),
        PipelineStage::Recognized => {
            store.extracted_range().is_some() && !store.is_stale(PipelineStage::Extracted)
        }
        PipelineStage::NotesGenerated => {
            store
                .recognized_text()
                .is_some_and(|t| !t.trim().is_empty())
                && !store.is_stale(PipelineStage::Recognized)
        }
        PipelineStage::NotesEdited => {
            store.derived_notes().is_some() && !store.is_stale(PipelineStage::NotesGenerated)
        }
    }
}

/// Whether `range` may be selected for the document currently held.
pub fn can_select_range(range: &PageRange, store: &ArtifactStore) -> bool {
    store.raw_document().is_some() && range.is_well_formed()
}

/// Export needs notes, nothing else. Stale notes are still exportable.
pub fn can_export(store: &ArtifactStore) -> bool {
    store.derived_notes().is_some()
}
