//! Top-level extraction API: [`Extractor`] dispatches a [`DocumentBlob`] to
//! the PDF page loop or the HTML text extractor.
//!
//! An `Extractor` is built once per process and shared (it is `Send + Sync`).
//! It owns the rendering engine pool and the recognition backend; both are
//! created at startup so a missing pdfium library or OCR language pack fails
//! the process immediately rather than the first request.

use crate::config::ExtractionConfig;
use crate::document::{DocumentBlob, DocumentKind};
use crate::error::ExtractError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::html::extract_text_from_html;
use crate::pipeline::ocr::{build_recognizer, Recognizer};
use crate::pipeline::pages::{extract_pages, render_first_page, PageLoopOptions};
use crate::pipeline::pool::EnginePool;
use crate::pipeline::postprocess::clean_text;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Shared, long-lived text extractor.
#[derive(Clone)]
pub struct Extractor {
    pool: EnginePool,
    recognizer: Arc<dyn Recognizer>,
    config: ExtractionConfig,
}

impl Extractor {
    /// Assemble an extractor from already-initialised parts.
    pub fn new(pool: EnginePool, recognizer: Arc<dyn Recognizer>, config: ExtractionConfig) -> Self {
        Self {
            pool,
            recognizer,
            config,
        }
    }

    /// Bind pdfium, warm the engine pool within the startup timeout and build
    /// the configured recognition backend.
    ///
    /// Any error here is meant to abort the process.
    pub async fn from_config(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let pool = EnginePool::pdfium(&config)?;
        pool.warm_up(config.startup_timeout()).await?;
        let recognizer = build_recognizer(&config).await?;
        info!(
            "Extractor ready: backend={}, dpi={}, pool={}",
            recognizer.name(),
            config.dpi,
            pool.size()
        );
        Ok(Self::new(pool, recognizer, config))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Extract the text of `doc`, choosing the strategy from its filename.
    ///
    /// PDFs go through render → encode → recognise for every page, in order,
    /// and fail on the first page that fails. HTML is parsed directly.
    pub async fn extract(&self, doc: &DocumentBlob) -> Result<String, ExtractError> {
        let start = Instant::now();
        let kind = doc.kind()?;
        info!(
            "Extracting '{}' ({} bytes) as {:?}",
            doc.filename,
            doc.bytes.len(),
            kind
        );

        let text = match kind {
            DocumentKind::Pdf => self.extract_pdf(doc.bytes.clone()).await?,
            DocumentKind::Html => clean_text(&extract_text_from_html(&doc.bytes)?),
        };

        info!(
            "Extracted {} chars from '{}' in {:?}",
            text.len(),
            doc.filename,
            start.elapsed()
        );
        Ok(text)
    }

    async fn extract_pdf(&self, bytes: Vec<u8>) -> Result<String, ExtractError> {
        let deadline_secs = self.config.request_timeout_secs.unwrap_or(0);
        let deadline = self
            .config
            .request_timeout()
            .map(|t| tokio::time::Instant::now() + t);

        let lease = self.pool.acquire().await?;
        let recognizer = Arc::clone(&self.recognizer);
        let opts = PageLoopOptions {
            dpi: self.config.dpi,
            separator: self.config.page_separator.clone(),
            deadline,
            deadline_secs,
            progress: self.config.progress_callback.clone(),
        };
        let rt = Handle::current();

        tokio::task::spawn_blocking(move || {
            extract_pages(lease.engine(), &bytes, recognizer.as_ref(), &rt, &opts)
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("page loop task panicked: {e}")))?
    }

    /// Render the first page of a PDF at the preview DPI.
    pub async fn preview(&self, doc: &DocumentBlob) -> Result<EncodedImage, ExtractError> {
        if doc.kind()? != DocumentKind::Pdf {
            return Err(ExtractError::UnsupportedType {
                filename: doc.filename.clone(),
            });
        }

        let lease = self.pool.acquire().await?;
        let bytes = doc.bytes.clone();
        let dpi = self.config.preview_dpi;
        let image = tokio::task::spawn_blocking(move || {
            render_first_page(lease.engine(), &bytes, dpi)
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("preview task panicked: {e}")))??;

        debug!(
            "Preview of '{}': {}x{} px, {} bytes",
            doc.filename,
            image.width,
            image.height,
            image.png.len()
        );
        Ok(image)
    }
}
