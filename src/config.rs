//! Configuration types for document text extraction.
//!
//! Everything that is fixed at process start lives in [`ExtractionConfig`]:
//! rendering DPI, which recognition backend to use, engine pool sizing and
//! timeouts. The optional LLM step that turns text into an invoice record is
//! configured separately through [`StructuringConfig`], since many callers
//! only want the raw text.
//!
//! Both are plain structs with sensible defaults; [`ExtractionConfig`] also
//! has a builder that clamps out-of-range values and validates on `build()`.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// DPI used when rasterising every page for full extraction.
pub const DEFAULT_DPI: u32 = 300;

/// DPI used for single-page previews.
pub const DEFAULT_PREVIEW_DPI: u32 = 200;

/// Configuration for the extraction pipeline.
///
/// # Example
/// ```rust
/// use edgequake_docext::{ExtractionConfig, RecognitionBackendKind};
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .backend(RecognitionBackendKind::Textract)
///     .request_timeout_secs(Some(60))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI for multi-page extraction. Range: 72–600. Default: 300.
    ///
    /// Higher DPI improves recognition of small print at the cost of memory
    /// per page: an A4 page at 300 DPI is roughly 2480 × 3508 px.
    pub dpi: u32,

    /// Rendering DPI for [`crate::Extractor::preview`]. Default: 200.
    pub preview_dpi: u32,

    /// Which recognition backend turns page images into text. Default: Tesseract.
    pub backend: RecognitionBackendKind,

    /// Tesseract language codes, `+`-separated (e.g. `"eng+fra"`). Default: `"eng"`.
    pub languages: String,

    /// Tesseract page-segmentation mode, set once when the engine is created.
    /// Default: 3 (fully automatic, no OSD).
    pub page_seg_mode: u8,

    /// Which Textract block type is kept. Default: [`BlockGranularity::Line`].
    pub granularity: BlockGranularity,

    /// AWS region for Textract. `None` uses the default provider chain.
    pub aws_region: Option<String>,

    /// Separator inserted between page texts. Default: blank line.
    pub page_separator: PageSeparator,

    /// Number of rendering engine leases that may be held at once. Default: 1.
    ///
    /// pdfium is not re-entrant; with more than one lease the calls are still
    /// serialised inside pdfium-render, so raising this only helps when the
    /// recognition step dominates.
    pub pool_size: usize,

    /// Timeout for the first engine acquisition at startup. Default: 30.
    pub startup_timeout_secs: u64,

    /// Timeout for acquiring an engine lease per request. Default: 10.
    pub acquire_timeout_secs: u64,

    /// Overall per-document deadline. `None` disables it. Default: 120.
    pub request_timeout_secs: Option<u64>,

    /// Directory containing the pdfium shared library. `None` tries the
    /// working directory, then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            preview_dpi: DEFAULT_PREVIEW_DPI,
            backend: RecognitionBackendKind::default(),
            languages: "eng".to_string(),
            page_seg_mode: 3,
            granularity: BlockGranularity::default(),
            aws_region: None,
            page_separator: PageSeparator::default(),
            pool_size: 1,
            startup_timeout_secs: 30,
            acquire_timeout_secs: 10,
            request_timeout_secs: Some(120),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("preview_dpi", &self.preview_dpi)
            .field("backend", &self.backend)
            .field("languages", &self.languages)
            .field("page_seg_mode", &self.page_seg_mode)
            .field("granularity", &self.granularity)
            .field("aws_region", &self.aws_region)
            .field("page_separator", &self.page_separator)
            .field("pool_size", &self.pool_size)
            .field("startup_timeout_secs", &self.startup_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn preview_dpi(mut self, dpi: u32) -> Self {
        self.config.preview_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn backend(mut self, backend: RecognitionBackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn languages(mut self, languages: impl Into<String>) -> Self {
        self.config.languages = languages.into();
        self
    }

    pub fn page_seg_mode(mut self, psm: u8) -> Self {
        self.config.page_seg_mode = psm;
        self
    }

    pub fn granularity(mut self, granularity: BlockGranularity) -> Self {
        self.config.granularity = granularity;
        self
    }

    pub fn aws_region(mut self, region: impl Into<String>) -> Self {
        self.config.aws_region = Some(region.into());
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn pool_size(mut self, n: usize) -> Self {
        self.config.pool_size = n.max(1);
        self
    }

    pub fn startup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.startup_timeout_secs = secs;
        self
    }

    pub fn acquire_timeout_secs(mut self, secs: u64) -> Self {
        self.config.acquire_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.page_seg_mode > 13 {
            return Err(ExtractError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                c.page_seg_mode
            )));
        }
        if c.languages.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "At least one OCR language is required".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(ExtractError::InvalidConfig(
                "Request timeout must be ≥ 1s (use None to disable)".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings for turning extracted text into an [`crate::invoice::Invoice`].
#[derive(Clone)]
pub struct StructuringConfig {
    /// LLM model identifier. If None, uses `gpt-4.1-nano`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from env.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 2048.
    pub max_tokens: usize,

    /// Retry attempts on a failed provider call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in invoice prompt.
    pub system_prompt: Option<String>,
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for StructuringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuringConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Recognition backend selected at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum RecognitionBackendKind {
    /// Local Tesseract engine, one shared instance serialised behind a mutex.
    #[default]
    Tesseract,
    /// AWS Textract `DetectDocumentText`, one stateless call per page.
    Textract,
}

impl RecognitionBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionBackendKind::Tesseract => "tesseract",
            RecognitionBackendKind::Textract => "textract",
        }
    }
}

impl fmt::Display for RecognitionBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which text-detection block type contributes to the page text.
///
/// Textract reports every piece of text twice: once per LINE block and once
/// per WORD block. Keeping both duplicates the page, so exactly one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum BlockGranularity {
    /// LINE blocks, joined by newlines. (default)
    #[default]
    Line,
    /// WORD blocks, joined by spaces.
    Word,
}

/// How to separate pages in the combined text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line: "\n\n". (default)
    #[default]
    Blank,
    /// Single space, matching a plain whitespace join.
    Space,
    /// ASCII form feed, the traditional page break in plain text.
    FormFeed,
    /// Marker line naming the page: "\n\n--- page N ---\n\n"
    Marker,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::Blank => "\n\n".to_string(),
            PageSeparator::Space => " ".to_string(),
            PageSeparator::FormFeed => "\n\x0c\n".to_string(),
            PageSeparator::Marker => format!("\n\n--- page {} ---\n\n", page_num),
            PageSeparator::Custom(s) => s.clone(),
        }
    }
}
