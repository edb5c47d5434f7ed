//! Mutually exclusive preview surfaces.
//!
//! [`PreviewCoordinator`] owns the visibility of the `originalPreview` and
//! `extractedPreview` panels. At most one of them is visible at any time.
//! Showing a surface first flips visibility (hiding the other one), then asks
//! the renderer to draw the payload. A failed render is reported to the
//! caller and never retried; the surface stays visible so the error can be
//! displayed on it.

use crate::collaborators::PreviewRenderer;
use crate::error::StageError;
use crate::observer::{SharedObserver, VisibilityDirective};
use crate::stage::PreviewSurface;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub struct PreviewCoordinator {
    renderer: Arc<dyn PreviewRenderer>,
    observer: SharedObserver,
    visible: Mutex<Option<PreviewSurface>>,
}

impl PreviewCoordinator {
    pub fn new(renderer: Arc<dyn PreviewRenderer>, observer: SharedObserver) -> Self {
        Self {
            renderer,
            observer,
            visible: Mutex::new(None),
        }
    }

    /// The surface currently visible, if any.
    pub fn visible(&self) -> Option<PreviewSurface> {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn show_original(&self, payload: &[u8]) -> Result<(), StageError> {
        self.show(PreviewSurface::Original, payload).await
    }

    pub async fn show_extracted(&self, payload: &[u8]) -> Result<(), StageError> {
        self.show(PreviewSurface::Extracted, payload).await
    }

    /// Hide both surfaces. No-op when nothing is visible.
    pub fn hide_all(&self) {
        let previous = self
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(surface) = previous {
            debug!("Hiding {}", surface);
            self.observer
                .on_visibility(VisibilityDirective::Hide(surface.panel()));
        }
    }

    async fn show(&self, surface: PreviewSurface, payload: &[u8]) -> Result<(), StageError> {
        let previous = self
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(surface);

        if previous != Some(surface) {
            if let Some(other) = previous {
                self.observer
                    .on_visibility(VisibilityDirective::Hide(other.panel()));
            }
            self.observer
                .on_visibility(VisibilityDirective::Show(surface.panel()));
        }

        debug!("Rendering {} bytes on {}", payload.len(), surface);
        self.renderer
            .render_preview(payload, surface)
            .await
            .inspect_err(|e| warn!("Rendering {} failed: {}", surface, e))
    }
}
