//! CLI binary for pagenotes.
//!
//! A thin shim over the library crate: maps CLI flags to `WorkflowConfig`,
//! drives the workflow from upload to export and renders the controller's
//! UI events on the terminal.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagenotes::adapters::{pdf_collaborators, BufferEditor, ExternalEditor};
use pagenotes::{
    NotesEditor, PageRange, Panel, PipelineStage, VisibilityDirective, WorkflowConfig,
    WorkflowController, WorkflowObserver,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Terminal observer using indicatif ────────────────────────────────────────

/// Renders the loading indicator as a spinner and prints stage changes and
/// error events to stderr.
struct CliObserver {
    show_progress: bool,
    quiet: bool,
    /// Suspended while an interactive editor owns the terminal.
    paused: AtomicBool,
    message: Mutex<String>,
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliObserver {
    fn new(show_progress: bool, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            show_progress,
            quiet,
            paused: AtomicBool::new(false),
            message: Mutex::new(String::new()),
            spinner: Mutex::new(None),
        })
    }

    /// Label for the next spinner.
    fn working(&self, message: impl Into<String>) {
        let message = message.into();
        if let Some(bar) = self.spinner.lock().unwrap().as_ref() {
            bar.set_message(message.clone());
        }
        *self.message.lock().unwrap() = message;
    }

    fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    fn start_spinner(&self) {
        if !self.show_progress || self.paused.load(Ordering::SeqCst) {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message(self.message.lock().unwrap().clone());
        bar.enable_steady_tick(Duration::from_millis(80));
        *self.spinner.lock().unwrap() = Some(bar);
    }

    fn stop_spinner(&self) {
        if let Some(bar) = self.spinner.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }

    fn print(&self, line: String) {
        match self.spinner.lock().unwrap().as_ref() {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl WorkflowObserver for CliObserver {
    fn on_visibility(&self, directive: VisibilityDirective) {
        match directive {
            VisibilityDirective::Show(Panel::LoadingIndicator) => self.start_spinner(),
            VisibilityDirective::Hide(Panel::LoadingIndicator) => self.stop_spinner(),
            _ => {}
        }
    }

    fn on_error(&self, panel: Panel, message: &str) {
        self.print(format!("{} {}  {}", red("✗"), red(message), dim(&format!("[{panel}]"))));
    }

    fn on_stage_change(&self, _from: PipelineStage, to: PipelineStage) {
        if !self.quiet {
            self.print(format!("  {} {}", green("✓"), to));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Notes for pages 2-4, written to ./processed-notes.html
  pagenotes lecture.pdf --pages 2-4

  # Review the notes in $EDITOR before exporting
  pagenotes lecture.pdf --pages 2-4 --edit -o notes/

  # Only run text recognition and print the text
  pagenotes lecture.pdf --pages 7 --ocr-only

  # Use a specific model
  pagenotes --provider anthropic --model claude-sonnet-4-20250514 lecture.pdf --pages 1-3

  # From a URL, JSON summary on stdout
  pagenotes https://arxiv.org/pdf/1706.03762 --pages 1-2 --json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  VISUAL / EDITOR         Editor launched by --edit
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Run:             pagenotes lecture.pdf --pages 2-4

  PDFium (~30 MB) is downloaded automatically on first run and cached.
  To use an existing pdfium copy: PDFIUM_LIB_PATH=/path/to/libpdfium pagenotes ...
"#;

/// Turn a page range of a PDF into editable HTML study notes.
#[derive(Parser, Debug)]
#[command(
    name = "pagenotes",
    version,
    about = "Turn a page range of a PDF into editable HTML study notes",
    long_about = "Upload a PDF (local file or URL), extract a page range, recognise its text \
with a vision LLM, generate study notes from the text, optionally edit them, and export them \
as HTML.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Pages to extract: 5 or 3-7 (1-indexed, inclusive).
    #[arg(short, long, env = "PAGENOTES_PAGES")]
    pages: String,

    /// Directory to write the exported notes into.
    #[arg(short, long, env = "PAGENOTES_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// File name of the exported notes.
    #[arg(long, env = "PAGENOTES_EXPORT_NAME", default_value = "processed-notes.html")]
    export_name: String,

    /// Open the generated notes in $VISUAL / $EDITOR before exporting.
    #[arg(long, env = "PAGENOTES_EDIT")]
    edit: bool,

    /// Stop after text recognition and print the recognised text.
    #[arg(long)]
    ocr_only: bool,

    /// Print a JSON snapshot of the final workflow state to stdout.
    #[arg(long, env = "PAGENOTES_JSON")]
    json: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "PAGENOTES_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PAGENOTES_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent vision calls during recognition.
    #[arg(short, long, env = "PAGENOTES_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Longest edge of rendered pages in pixels.
    #[arg(long, env = "PAGENOTES_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAGENOTES_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom recognition prompt.
    #[arg(long, env = "PAGENOTES_OCR_PROMPT")]
    ocr_prompt: Option<PathBuf>,

    /// Path to a text file containing a custom notes prompt.
    #[arg(long, env = "PAGENOTES_NOTES_PROMPT")]
    notes_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PAGENOTES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Recognition temperature (0.0–2.0).
    #[arg(long, env = "PAGENOTES_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Notes generation temperature (0.0–2.0).
    #[arg(long, env = "PAGENOTES_NOTES_TEMPERATURE", default_value_t = 0.3)]
    notes_temperature: f32,

    /// Retries per LLM call.
    #[arg(long, env = "PAGENOTES_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Disable the spinner.
    #[arg(long, env = "PAGENOTES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGENOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGENOTES_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAGENOTES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PAGENOTES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the spinner; it carries the feedback.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    #[cfg(feature = "bundled")]
    {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_bundled())
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        } else {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        }
    }

    // ── Build the workflow ───────────────────────────────────────────────
    let range = PageRange::parse(&cli.pages)
        .ok_or_else(|| anyhow!("Invalid page range '{}': use 5 or 3-7", cli.pages))?;
    let config = build_config(&cli).await?;

    let editor: Arc<dyn NotesEditor> = if cli.edit {
        Arc::new(
            ExternalEditor::from_env(&config.export_file_name)
                .context("Failed to prepare the notes editor")?,
        )
    } else {
        Arc::new(BufferEditor::new())
    };
    let collaborators =
        pdf_collaborators(&config, editor).context("Failed to set up the LLM provider")?;

    let observer = CliObserver::new(show_progress, cli.quiet);
    let workflow = WorkflowController::with_observer(config, collaborators, observer.clone());

    // ── Run the steps ────────────────────────────────────────────────────
    observer.working(format!("Reading {}", cli.input));
    workflow.upload(&cli.input).await.context("Upload failed")?;

    observer.working(format!("Extracting pages {range}"));
    workflow.split(range).await.context("Extraction failed")?;

    observer.working(format!("Recognising text on {} pages", range.len()));
    workflow
        .recognize()
        .await
        .context("Text recognition failed")?;

    if cli.ocr_only {
        if cli.json {
            print_snapshot(&workflow)?;
        } else {
            let text = workflow
                .with_store(|store| store.recognized_text())
                .unwrap_or_default();
            let mut handle = io::stdout().lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        return Ok(());
    }

    observer.working("Generating notes");
    workflow
        .generate_notes()
        .await
        .context("Notes generation failed")?;

    if cli.edit {
        observer.pause(true);
        let edited = workflow.edit_notes().await;
        observer.pause(false);
        edited.context("Editing notes failed")?;
    }

    let path = workflow
        .export_to_dir(&cli.output_dir)
        .await
        .context("Export failed")?;

    if cli.json {
        print_snapshot(&workflow)?;
    } else if !cli.quiet {
        eprintln!("{}  Notes written  →  {}", green("✔"), bold(&path.display().to_string()));
    }

    Ok(())
}

fn print_snapshot(workflow: &WorkflowController) -> Result<()> {
    let json = serde_json::to_string_pretty(&workflow.snapshot())
        .context("Failed to serialise workflow snapshot")?;
    println!("{json}");
    Ok(())
}

/// Map CLI args to `WorkflowConfig`.
async fn build_config(cli: &Cli) -> Result<WorkflowConfig> {
    let mut builder = WorkflowConfig::builder()
        .export_file_name(cli.export_name.clone())
        .concurrency(cli.concurrency)
        .max_rendered_pixels(cli.max_pixels)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .notes_temperature(cli.notes_temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref path) = cli.ocr_prompt {
        builder = builder.ocr_system_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.notes_prompt {
        builder = builder.notes_system_prompt(read_prompt(path).await?);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}
