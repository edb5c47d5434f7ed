//! Document reading: load a local path or download a URL into memory.
//!
//! The workflow keeps the raw document as bytes, so unlike a converter that
//! hands pdfium a file path there is no temp file here. The PDF magic bytes
//! (`%PDF`) are checked before returning so a wrong file is reported at
//! upload rather than as a pdfium failure during extraction.

use crate::collaborators::DocumentReader;
use crate::error::StageError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Reads documents from the file system or over HTTP(S).
#[derive(Debug, Clone)]
pub struct FsDocumentReader {
    download_timeout_secs: u64,
}

impl FsDocumentReader {
    pub fn new(download_timeout_secs: u64) -> Self {
        Self {
            download_timeout_secs: download_timeout_secs.max(1),
        }
    }
}

impl Default for FsDocumentReader {
    fn default() -> Self {
        Self::new(120)
    }
}

#[async_trait]
impl DocumentReader for FsDocumentReader {
    async fn read_document(&self, source: &str) -> Result<Vec<u8>, StageError> {
        let bytes = if is_url(source) {
            download_url(source, self.download_timeout_secs).await?
        } else {
            read_local(source).await?
        };
        check_magic(source, &bytes)?;
        Ok(bytes)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn read_error(source: &str, detail: impl Into<String>) -> StageError {
    StageError::Read {
        source_name: source.to_string(),
        detail: detail.into(),
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, StageError> {
    let path = Path::new(path_str);
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => read_error(path_str, "file not found"),
        std::io::ErrorKind::PermissionDenied => read_error(path_str, "permission denied"),
        _ => read_error(path_str, e.to_string()),
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, StageError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| read_error(url, e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            read_error(url, format!("download timed out after {}s", timeout_secs))
        } else {
            read_error(url, e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(read_error(url, format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| read_error(url, e.to_string()))?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

fn check_magic(source: &str, bytes: &[u8]) -> Result<(), StageError> {
    match bytes.get(..4) {
        Some(b"%PDF") => Ok(()),
        Some(magic) => Err(read_error(
            source,
            format!("not a PDF (starts with {:02x?})", magic),
        )),
        None => Err(read_error(source, "file is too short to be a PDF")),
    }
}
