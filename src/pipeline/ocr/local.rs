//! Local OCR: a stateful engine shared by every request.
//!
//! Tesseract holds the current image and its recognition result inside the
//! engine object, so two requests using it at the same time would overwrite
//! each other's image between `set_image` and `read_text`. [`LocalRecognizer`]
//! keeps one engine behind `Arc<Mutex<_>>` and runs set-image + read-text as a
//! single critical section on the blocking pool. Clones share the engine.

use crate::error::ExtractError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::ocr::{RecognitionResult, Recognizer, TextFragment};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A stateful OCR engine fed one image at a time.
pub trait OcrEngine: Send + 'static {
    /// Replace the engine's current image with the given PNG.
    fn set_image(&mut self, png: &[u8]) -> Result<(), String>;

    /// Recognise the current image.
    fn read_text(&mut self) -> Result<String, String>;
}

/// [`Recognizer`] over a shared [`OcrEngine`].
pub struct LocalRecognizer<E: OcrEngine> {
    name: String,
    engine: Arc<Mutex<E>>,
}

impl<E: OcrEngine> LocalRecognizer<E> {
    pub fn new(name: impl Into<String>, engine: E) -> Self {
        Self {
            name: name.into(),
            engine: Arc::new(Mutex::new(engine)),
        }
    }
}

impl<E: OcrEngine> Clone for LocalRecognizer<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            engine: Arc::clone(&self.engine),
        }
    }
}

#[async_trait]
impl<E: OcrEngine> Recognizer for LocalRecognizer<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, image: EncodedImage) -> Result<RecognitionResult, ExtractError> {
        let page_num = image.page_num();
        let engine = Arc::clone(&self.engine);
        let fail = |detail: String| ExtractError::RecognitionFailure {
            page: page_num,
            backend: self.name.clone(),
            detail,
        };

        let text = tokio::task::spawn_blocking(move || {
            let mut engine = engine.blocking_lock();
            engine
                .set_image(&image.png)
                .map_err(|e| format!("failed to set image: {e}"))?;
            engine
                .read_text()
                .map_err(|e| format!("failed to read text: {e}"))
        })
        .await
        .map_err(|e| fail(format!("OCR task panicked: {e}")))?
        .map_err(fail)?;

        debug!("Page {}: {} recognised {} chars", page_num, self.name, text.len());

        Ok(RecognitionResult::new(
            text.lines().map(TextFragment::line).collect(),
        ))
    }
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// [`OcrEngine`] backed by libtesseract through `leptess`.
#[cfg(feature = "tesseract")]
pub struct TesseractEngine {
    inner: leptess::LepTess,
}

#[cfg(feature = "tesseract")]
impl TesseractEngine {
    /// Load `languages` (e.g. `"eng+deu"`) and fix the page-segmentation mode.
    pub fn new(languages: &str, page_seg_mode: u8) -> Result<Self, ExtractError> {
        let unavailable = |reason: String| ExtractError::BackendUnavailable {
            backend: "tesseract".to_string(),
            reason,
        };

        let mut inner = leptess::LepTess::new(None, languages)
            .map_err(|e| unavailable(format!("failed to load '{languages}': {e}")))?;
        inner
            .set_variable(
                leptess::Variable::TesseditPagesegMode,
                &page_seg_mode.to_string(),
            )
            .map_err(|e| unavailable(format!("failed to set page segmentation mode: {e:?}")))?;

        tracing::info!(languages, page_seg_mode, "Tesseract OCR initialized");
        Ok(Self { inner })
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for TesseractEngine {
    fn set_image(&mut self, png: &[u8]) -> Result<(), String> {
        self.inner.set_image_from_mem(png).map_err(|e| e.to_string())
    }

    fn read_text(&mut self) -> Result<String, String> {
        self.inner.get_utf8_text().map_err(|e| e.to_string())
    }
}
