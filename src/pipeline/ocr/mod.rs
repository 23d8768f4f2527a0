//! Recognition backends: page image → text.
//!
//! The page loop depends only on the [`Recognizer`] trait. Two
//! implementations exist, selected once at startup:
//!
//! * [`local::LocalRecognizer`]: a stateful OCR engine (Tesseract) that is
//!   configured once and fed one image at a time. The engine keeps the current
//!   image and its result internally, so every recognition runs as a single
//!   critical section behind a mutex.
//! * [`cloud::CloudRecognizer`]: a stateless text-detection service
//!   (Textract). Each call is independent and safe to run concurrently.

pub mod cloud;
pub mod local;

use crate::config::{ExtractionConfig, RecognitionBackendKind};
use crate::error::ExtractError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Granularity of a recognised piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Line,
    Word,
}

/// One recognised piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl TextFragment {
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Line,
            text: text.into(),
        }
    }

    pub fn word(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Word,
            text: text.into(),
        }
    }
}

/// Ordered fragments recognised on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub fragments: Vec<TextFragment>,
}

impl RecognitionResult {
    pub fn new(fragments: Vec<TextFragment>) -> Self {
        Self { fragments }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.text.trim().is_empty())
    }

    /// Flatten into plain text: a line fragment ends with a newline, word
    /// fragments are separated by a space.
    pub fn into_text(self) -> String {
        let mut out = String::new();
        for fragment in self.fragments {
            let text = fragment.text.trim();
            if text.is_empty() {
                continue;
            }
            match fragment.kind {
                FragmentKind::Line => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(text);
                    out.push('\n');
                }
                FragmentKind::Word => {
                    if !out.is_empty() && !out.ends_with(['\n', ' ']) {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
            }
        }
        out.trim_end().to_string()
    }
}

/// Turns one encoded page image into text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short backend identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Recognise the text on one page.
    ///
    /// Failures are reported as [`ExtractError::RecognitionFailure`] naming
    /// the page.
    async fn recognize(&self, image: EncodedImage) -> Result<RecognitionResult, ExtractError>;
}

/// Build the recognizer selected by `config.backend`.
///
/// Returns [`ExtractError::BackendUnavailable`] when the backend was not
/// compiled in or fails to initialise.
pub async fn build_recognizer(
    config: &ExtractionConfig,
) -> Result<Arc<dyn Recognizer>, ExtractError> {
    match config.backend {
        RecognitionBackendKind::Tesseract => build_tesseract(config),
        RecognitionBackendKind::Textract => build_textract(config).await,
    }
}

#[cfg(feature = "tesseract")]
fn build_tesseract(config: &ExtractionConfig) -> Result<Arc<dyn Recognizer>, ExtractError> {
    let engine = local::TesseractEngine::new(&config.languages, config.page_seg_mode)?;
    Ok(Arc::new(local::LocalRecognizer::new("tesseract", engine)))
}

#[cfg(not(feature = "tesseract"))]
fn build_tesseract(_config: &ExtractionConfig) -> Result<Arc<dyn Recognizer>, ExtractError> {
    Err(ExtractError::BackendUnavailable {
        backend: "tesseract".to_string(),
        reason: "built without the `tesseract` feature".to_string(),
    })
}

#[cfg(feature = "textract")]
async fn build_textract(config: &ExtractionConfig) -> Result<Arc<dyn Recognizer>, ExtractError> {
    let client = cloud::TextractClient::from_env(config.aws_region.clone()).await;
    Ok(Arc::new(cloud::CloudRecognizer::new(
        "textract",
        client,
        config.granularity,
    )))
}

#[cfg(not(feature = "textract"))]
async fn build_textract(_config: &ExtractionConfig) -> Result<Arc<dyn Recognizer>, ExtractError> {
    Err(ExtractError::BackendUnavailable {
        backend: "textract".to_string(),
        reason: "built without the `textract` feature".to_string(),
    })
}
