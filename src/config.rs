//! Configuration for the workflow and its concrete collaborators.
//!
//! All behaviour is controlled through [`WorkflowConfig`], built via
//! [`WorkflowConfigBuilder`]. The controller itself only reads the export
//! settings; the remaining knobs feed the adapters in [`crate::adapters`].

use crate::error::WorkflowError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// File name of the exported notes.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "processed-notes.html";

/// MIME type of the exported notes.
pub const EXPORT_MIME_TYPE: &str = "text/html";

/// Configuration for a notes workflow.
///
/// # Example
/// ```rust
/// use pagenotes::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .concurrency(4)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.export_file_name, "processed-notes.html");
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Name of the exported notes file. Default: `processed-notes.html`.
    pub export_file_name: String,

    /// Maximum rendered page dimension in pixels for OCR. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent vision calls during recognition. Default: 4.
    pub concurrency: usize,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for recognition. Default: 0.1.
    pub temperature: f32,

    /// Sampling temperature for notes generation. Default: 0.3.
    pub notes_temperature: f32,

    /// Maximum tokens per LLM response. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page on a failed vision call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom recognition prompt. If None, uses [`crate::prompts::OCR_SYSTEM_PROMPT`].
    pub ocr_system_prompt: Option<String>,

    /// Custom notes prompt. If None, uses [`crate::prompts::NOTES_SYSTEM_PROMPT`].
    pub notes_system_prompt: Option<String>,

    /// Download timeout for URL uploads in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            max_rendered_pixels: 2000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            notes_temperature: 0.3,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            password: None,
            ocr_system_prompt: None,
            notes_system_prompt: None,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("export_file_name", &self.export_file_name)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("notes_temperature", &self.notes_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl WorkflowConfig {
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn export_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.export_file_name = name.into();
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn notes_temperature(mut self, t: f32) -> Self {
        self.config.notes_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.ocr_system_prompt = Some(prompt.into());
        self
    }

    pub fn notes_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.notes_system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, WorkflowError> {
        let c = &self.config;
        let name = c.export_file_name.trim();
        if name.is_empty() {
            return Err(WorkflowError::InvalidConfig(
                "Export file name must not be empty".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(WorkflowError::InvalidConfig(format!(
                "Export file name must be a bare file name, got '{}'",
                name
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(WorkflowError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
