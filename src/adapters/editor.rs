//! Notes editors.
//!
//! - [`BufferEditor`] keeps the content in memory. Library users driving a
//!   real rich-text widget can wrap it, and tests use it to simulate edits.
//! - [`ExternalEditor`] mirrors the content into a temp file and, when asked
//!   for the content, opens that file in the user's `$EDITOR` first.

use crate::collaborators::NotesEditor;
use crate::error::StageError;
use crate::store::RichContent;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;
use tracing::{debug, info};

/// In-memory notes editor.
#[derive(Debug, Default)]
pub struct BufferEditor {
    content: Mutex<RichContent>,
}

impl BufferEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer, as a user typing into the editor would.
    pub fn set(&self, content: impl Into<RichContent>) {
        *self.content.lock().unwrap_or_else(PoisonError::into_inner) = content.into();
    }

    pub fn get(&self) -> RichContent {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotesEditor for BufferEditor {
    async fn read_content(&self) -> Result<RichContent, StageError> {
        Ok(self.get())
    }

    async fn load_content(&self, content: &RichContent) -> Result<(), StageError> {
        self.set(content.clone());
        Ok(())
    }
}

/// Notes editor backed by a file and an external editor command.
///
/// The temp directory is removed when the editor is dropped.
pub struct ExternalEditor {
    command: Option<String>,
    path: PathBuf,
    _dir: TempDir,
}

impl ExternalEditor {
    /// Create an editor that launches `command` (e.g. `vim`, `code --wait`).
    /// With `None`, the file is read back as-is.
    pub fn new(command: Option<String>, file_name: &str) -> Result<Self, StageError> {
        let dir = TempDir::new().map_err(|e| StageError::editor(e.to_string()))?;
        let path = dir.path().join(file_name);
        Ok(Self {
            command: command.filter(|c| !c.trim().is_empty()),
            path,
            _dir: dir,
        })
    }

    /// Use `$VISUAL`, then `$EDITOR`.
    pub fn from_env(file_name: &str) -> Result<Self, StageError> {
        let command = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .ok();
        Self::new(command, file_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn launch(&self, command: &str) -> Result<(), StageError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| StageError::editor("empty editor command"))?;

        info!("Opening notes in {}", program);
        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(&self.path)
            .status()
            .await
            .map_err(|e| StageError::editor(format!("could not launch '{}': {}", program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(StageError::editor(format!(
                "'{}' exited with {}",
                program, status
            )))
        }
    }
}

#[async_trait]
impl NotesEditor for ExternalEditor {
    async fn read_content(&self) -> Result<RichContent, StageError> {
        if let Some(command) = &self.command {
            self.launch(command).await?;
        }
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StageError::editor(format!("{}: {}", self.path.display(), e)))?;
        debug!("Read {} bytes of edited notes", html.len());
        Ok(RichContent::new(html))
    }

    async fn load_content(&self, content: &RichContent) -> Result<(), StageError> {
        tokio::fs::write(&self.path, content.as_html())
            .await
            .map_err(|e| StageError::editor(format!("{}: {}", self.path.display(), e)))?;
        debug!("Notes written to {}", self.path.display());
        Ok(())
    }
}
