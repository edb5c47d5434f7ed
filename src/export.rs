//! Notes export.
//!
//! Export reads the current notes, serialises them verbatim into an HTML
//! download named `processed-notes.html` and hands the result to the
//! observer. It never touches pipeline state, so exporting twice yields two
//! identical artifacts.

use crate::config::EXPORT_MIME_TYPE;
use crate::error::WorkflowError;
use crate::store::RichContent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// A downloadable file produced from the notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub body: String,
}

impl ExportArtifact {
    /// Wrap `notes` as an HTML download. The body is the content verbatim.
    pub fn from_notes(file_name: impl Into<String>, notes: &RichContent) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: EXPORT_MIME_TYPE.to_string(),
            body: notes.as_html().to_string(),
        }
    }

    /// Write the artifact into `dir` and return the final path.
    ///
    /// Uses atomic write (temp file + rename) so a reader never sees a
    /// half-written file.
    pub async fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, WorkflowError> {
        let dir = dir.as_ref();
        let path = dir.join(&self.file_name);
        let fail = |source| WorkflowError::ExportWriteFailed {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(fail)?;

        let tmp_path = path.with_extension("html.tmp");
        tokio::fs::write(&tmp_path, self.body.as_bytes())
            .await
            .map_err(fail)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(fail)?;

        info!("Exported {} bytes to {}", self.body.len(), path.display());
        Ok(path)
    }
}
