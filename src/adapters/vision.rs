//! Text recognition with a vision LLM.
//!
//! ```text
//! extracted PDF ──▶ render (pdfium) ──▶ encode (PNG/base64) ──▶ VLM ──▶ clean
//! ```
//!
//! Pages are sent concurrently (bounded by `concurrency`) and reassembled in
//! page order. Unlike a best-effort converter, recognition is all or
//! nothing: a page that still fails after its retries fails the whole step,
//! so the workflow never advances on partial text.

use crate::adapters::llm::{chat_with_retry, completion_options, RetryPolicy};
use crate::adapters::{pdf, postprocess};
use crate::collaborators::TextRecognizer;
use crate::config::WorkflowConfig;
use crate::error::StageError;
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, ImageData, LLMProvider};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info};

/// Encode a rasterised page as a base64 PNG ready for the VLM API.
///
/// PNG keeps rendered text crisp; JPEG artefacts degrade recognition.
/// `detail: "high"` lets GPT-4-class models see fine print.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// [`TextRecognizer`] backed by a vision-capable [`LLMProvider`].
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    max_rendered_pixels: u32,
    concurrency: usize,
    temperature: f32,
    max_tokens: usize,
    retry: RetryPolicy,
    password: Option<String>,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &WorkflowConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .ocr_system_prompt
                .clone()
                .unwrap_or_else(|| OCR_SYSTEM_PROMPT.to_string()),
            max_rendered_pixels: config.max_rendered_pixels,
            concurrency: config.concurrency.max(1),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::from_config(config),
            password: config.password.clone(),
        }
    }

    async fn recognize_page(
        &self,
        page_num: usize,
        image: ImageData,
    ) -> Result<(usize, String), StageError> {
        // The empty user text is intentional: the image carries the content.
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = completion_options(self.temperature, self.max_tokens);
        let label = format!("Page {}", page_num);

        let raw = chat_with_retry(&self.provider, &messages, &options, self.retry, &label)
            .await
            .map_err(|e| StageError::recognition(format!("page {}: {}", page_num, e)))?;
        Ok((page_num, postprocess::clean_text(&raw)))
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize_text(&self, document: &[u8]) -> Result<String, StageError> {
        let bytes = document.to_vec();
        let max_pixels = self.max_rendered_pixels;
        let password = self.password.clone();
        let images = tokio::task::spawn_blocking(move || {
            pdf::render_pages_blocking(&bytes, max_pixels, password.as_deref())
        })
        .await
        .map_err(|e| StageError::recognition(format!("render task panicked: {}", e)))?
        .map_err(StageError::recognition)?;

        if images.is_empty() {
            return Err(StageError::recognition("document has no pages"));
        }

        let encoded = images
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                encode_page(img).map(|data| (idx + 1, data)).map_err(|e| {
                    StageError::recognition(format!("page {}: image encoding failed: {}", idx + 1, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        drop(images);

        info!(
            "Recognising {} pages ({} concurrent)",
            encoded.len(),
            self.concurrency
        );

        let mut pages: Vec<(usize, String)> = stream::iter(encoded)
            .map(|(page_num, data)| self.recognize_page(page_num, data))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        pages.sort_by_key(|(page_num, _)| *page_num);
        Ok(join_pages(pages.into_iter().map(|(_, text)| text)))
    }
}

/// Join page texts in order, separated by a blank line. Empty pages are skipped.
fn join_pages(pages: impl Iterator<Item = String>) -> String {
    pages
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
