//! Artifact storage for the workflow.
//!
//! [`ArtifactStore`] holds one artifact per pipeline slot and stamps every
//! write with a monotonically increasing revision. Each artifact also records
//! the revision of the upstream artifact it was produced from, so a consumer
//! can tell a current artifact from a *stale* one whose input has since been
//! replaced.
//!
//! The store is plain data: no I/O, no locking, no logging. It is owned
//! exclusively by [`crate::controller::WorkflowController`]; everything else
//! gets read access only.

use crate::stage::PipelineStage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Inclusive, 1-indexed page range as typed by the user.
///
/// Only syntactic well-formedness is checked here. Whether `end` exceeds the
/// document's real page count is decided by the extraction collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: i64,
    pub end: i64,
}

impl PageRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// `start >= 1` and `end >= start`.
    pub fn is_well_formed(&self) -> bool {
        self.start >= 1 && self.end >= self.start
    }

    /// Number of pages covered, or 0 for a malformed range.
    pub fn len(&self) -> usize {
        if self.is_well_formed() {
            (self.end - self.start + 1) as usize
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse `"3-7"` or a single page `"5"`.
    ///
    /// Returns `None` when either bound is not an integer. Well-formedness is
    /// left to the caller, so `"5-3"` parses to a range that is rejected later
    /// by the stage gate.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        match input.split_once('-') {
            Some((start, end)) => Some(Self {
                start: start.trim().parse().ok()?,
                end: end.trim().parse().ok()?,
            }),
            None => {
                let page = input.parse().ok()?;
                Some(Self {
                    start: page,
                    end: page,
                })
            }
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Rich notes content: an HTML fragment, exported verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichContent(String);

impl RichContent {
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    pub fn as_html(&self) -> &str {
        &self.0
    }

    pub fn into_html(self) -> String {
        self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for RichContent {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RichContent {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RichContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag identifying which stage a byte artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    Raw,
    Extracted,
}

/// The value held in one store slot. The variant decides the slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Uploaded document bytes.
    Raw(Arc<[u8]>),
    /// Page range chosen for the raw document.
    Range(PageRange),
    /// Document bytes for the extracted page range.
    Extracted(Arc<[u8]>),
    /// Text recognised from the extracted range.
    Text(Arc<str>),
    /// Generated (and possibly edited) notes.
    Notes(RichContent),
}

impl Payload {
    /// The slot this payload is stored under.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Payload::Raw(_) => PipelineStage::Uploaded,
            Payload::Range(_) => PipelineStage::RangeSelected,
            Payload::Extracted(_) => PipelineStage::Extracted,
            Payload::Text(_) => PipelineStage::Recognized,
            Payload::Notes(_) => PipelineStage::NotesGenerated,
        }
    }

    pub fn origin(&self) -> Option<ArtifactOrigin> {
        match self {
            Payload::Raw(_) => Some(ArtifactOrigin::Raw),
            Payload::Extracted(_) => Some(ArtifactOrigin::Extracted),
            _ => None,
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            Payload::Raw(b) | Payload::Extracted(b) => b.len(),
            Payload::Range(_) => 0,
            Payload::Text(t) => t.len(),
            Payload::Notes(n) => n.as_html().len(),
        }
    }
}

/// A stored payload plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub payload: Payload,
    /// Store revision at which this artifact was written.
    pub revision: u64,
    /// Revision of the upstream artifact this one was produced from.
    pub derived_from: Option<u64>,
}

impl Artifact {
    pub fn origin(&self) -> Option<ArtifactOrigin> {
        self.payload.origin()
    }

    pub fn len(&self) -> usize {
        self.payload.byte_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-writer store of pipeline artifacts.
#[derive(Debug, Default, Clone)]
pub struct ArtifactStore {
    slots: BTreeMap<PipelineStage, Artifact>,
    revision: u64,
}

/// Map a stage onto the slot that holds its artifact.
fn slot(stage: PipelineStage) -> Option<PipelineStage> {
    match stage {
        PipelineStage::Empty => None,
        PipelineStage::NotesEdited => Some(PipelineStage::NotesGenerated),
        other => Some(other),
    }
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision counter. Every write and every invalidation bumps it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Store `payload` in its slot, stamping it with a fresh revision.
    ///
    /// `derived_from` is taken from the upstream slot as it is right now.
    /// Returns the new artifact's revision.
    pub fn set(&mut self, payload: Payload) -> u64 {
        let stage = payload.stage();
        let derived_from = stage
            .upstream()
            .and_then(|up| self.get(up))
            .map(|a| a.revision);
        self.set_with_provenance(payload, derived_from)
    }

    /// Store `payload` recording an explicit upstream revision.
    ///
    /// Used when the payload was computed from an input read earlier, so the
    /// provenance reflects what the collaborator actually consumed.
    pub fn set_with_provenance(&mut self, payload: Payload, derived_from: Option<u64>) -> u64 {
        self.revision += 1;
        let revision = self.revision;
        self.slots.insert(
            payload.stage(),
            Artifact {
                payload,
                revision,
                derived_from,
            },
        );
        revision
    }

    /// The artifact held for `stage`, if any.
    pub fn get(&self, stage: PipelineStage) -> Option<&Artifact> {
        slot(stage).and_then(|s| self.slots.get(&s))
    }

    /// Clear the artifact at `stage` and every downstream artifact that
    /// follows its upstream. Derived notes are never cleared here.
    ///
    /// Always bumps the revision, even when nothing was held.
    pub fn invalidate_from(&mut self, stage: PipelineStage) {
        self.revision += 1;
        self.slots
            .retain(|&held, _| held < stage || !held.follows_upstream());
    }

    /// Whether the artifact at `stage` was produced from an upstream artifact
    /// that has since been replaced or cleared.
    ///
    /// Absent artifacts and artifacts without an upstream are never stale.
    pub fn is_stale(&self, stage: PipelineStage) -> bool {
        let Some(artifact) = self.get(stage) else {
            return false;
        };
        let Some(upstream) = stage.upstream() else {
            return false;
        };
        match (artifact.derived_from, self.get(upstream)) {
            (Some(rev), Some(up)) => rev != up.revision,
            _ => true,
        }
    }

    // ── Typed views ──────────────────────────────────────────────────────

    pub fn raw_document(&self) -> Option<Arc<[u8]>> {
        match self.get(PipelineStage::Uploaded).map(|a| &a.payload) {
            Some(Payload::Raw(b)) => Some(Arc::clone(b)),
            _ => None,
        }
    }

    pub fn selected_range(&self) -> Option<PageRange> {
        match self.get(PipelineStage::RangeSelected).map(|a| &a.payload) {
            Some(Payload::Range(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn extracted_range(&self) -> Option<Arc<[u8]>> {
        match self.get(PipelineStage::Extracted).map(|a| &a.payload) {
            Some(Payload::Extracted(b)) => Some(Arc::clone(b)),
            _ => None,
        }
    }

    pub fn recognized_text(&self) -> Option<Arc<str>> {
        match self.get(PipelineStage::Recognized).map(|a| &a.payload) {
            Some(Payload::Text(t)) => Some(Arc::clone(t)),
            _ => None,
        }
    }

    pub fn derived_notes(&self) -> Option<&RichContent> {
        match self.get(PipelineStage::NotesGenerated).map(|a| &a.payload) {
            Some(Payload::Notes(n)) => Some(n),
            _ => None,
        }
    }
}
