//! Error types for the edgequake-docext library.
//!
//! Extraction is fail-fast: the first page that fails to render, encode or
//! recognise aborts the whole document, so there is a single error type,
//! [`ExtractError`], rather than a fatal/per-page split. Partial text is never
//! returned alongside an error.
//!
//! Each variant belongs to an [`ErrorClass`] so that outer layers (the HTTP
//! server, the CLI) can decide how to surface it without matching on every
//! variant:
//!
//! * [`ErrorClass::Client`]: the upload itself is at fault (malformed PDF,
//!   unsupported file type). Maps to a 4xx response.
//! * [`ErrorClass::Server`]: an engine or recognition backend failed. 5xx.
//! * [`ErrorClass::Transient`]: the engine pool was busy or the request
//!   deadline ran out. Worth retrying later.

use std::path::PathBuf;
use thiserror::Error;

/// Broad category of an [`ExtractError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Server,
    Transient,
}

/// All errors returned by the edgequake-docext library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Bytes could not be parsed as a document of the declared type.
    #[error("Invalid document: {detail}")]
    InvalidDocument { detail: String },

    /// Filename suffix matches no known extraction strategy.
    #[error("Unsupported file type: '{filename}'\nSupported extensions: .pdf, .html, .htm")]
    UnsupportedType { filename: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The rendering engine failed outside of a specific page.
    #[error("Rendering engine failure: {detail}")]
    EngineFailure { detail: String },

    /// Rasterising one page failed. `page` is 1-indexed.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailure { page: usize, detail: String },

    /// PNG serialisation of a rendered page failed. `page` is 1-indexed.
    #[error("Image encoding failed for page {page}: {detail}")]
    EncodeFailure { page: usize, detail: String },

    /// No engine instance became free within the acquisition timeout.
    #[error("Rendering engine busy: no instance available after {waited_ms}ms")]
    EngineBusy { waited_ms: u64 },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set DOCEXT_PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Recognition errors ────────────────────────────────────────────────
    /// OCR engine or text-detection call failed. `page` is 1-indexed.
    #[error("Recognition failed on page {page} ({backend}): {detail}")]
    RecognitionFailure {
        page: usize,
        backend: String,
        detail: String,
    },

    /// The configured recognition backend could not be initialised.
    #[error("Recognition backend '{backend}' is unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// The per-request deadline elapsed before page `page` (1-indexed) finished.
    #[error("Extraction deadline of {secs}s exceeded at page {page}")]
    DeadlineExceeded { page: usize, secs: u64 },

    // ── Structuring errors ────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call failed or its reply did not contain a usable invoice.
    #[error("Invoice structuring failed: {detail}")]
    StructuringFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Which side of the request is at fault.
    pub fn class(&self) -> ErrorClass {
        match self {
            ExtractError::InvalidDocument { .. }
            | ExtractError::UnsupportedType { .. }
            | ExtractError::FileNotFound { .. }
            | ExtractError::DownloadFailed { .. }
            | ExtractError::DownloadTimeout { .. } => ErrorClass::Client,
            ExtractError::EngineBusy { .. } | ExtractError::DeadlineExceeded { .. } => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Server,
        }
    }

    /// HTTP status code the server layer reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ExtractError::EngineBusy { .. } => 503,
            ExtractError::DeadlineExceeded { .. } => 504,
            ExtractError::RecognitionFailure { .. } | ExtractError::StructuringFailed { .. } => {
                502
            }
            _ => match self.class() {
                ErrorClass::Client => 400,
                ErrorClass::Server | ErrorClass::Transient => 500,
            },
        }
    }

    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_is_client_fault() {
        let e = ExtractError::UnsupportedType {
            filename: "notes.txt".into(),
        };
        assert_eq!(e.class(), ErrorClass::Client);
        assert_eq!(e.http_status(), 400);
        assert!(e.to_string().contains("notes.txt"));
    }

    #[test]
    fn invalid_document_is_client_fault() {
        let e = ExtractError::InvalidDocument {
            detail: "bad xref".into(),
        };
        assert_eq!(e.http_status(), 400);
        assert!(!e.is_retryable());
    }

    #[test]
    fn recognition_failure_display() {
        let e = ExtractError::RecognitionFailure {
            page: 3,
            backend: "textract".into(),
            detail: "throttled".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("textract"));
        assert_eq!(e.class(), ErrorClass::Server);
        assert_eq!(e.http_status(), 502);
    }

    #[test]
    fn engine_busy_is_transient() {
        let e = ExtractError::EngineBusy { waited_ms: 10_000 };
        assert!(e.is_retryable());
        assert_eq!(e.http_status(), 503);
        assert!(e.to_string().contains("10000ms"));
    }

    #[test]
    fn deadline_exceeded_maps_to_gateway_timeout() {
        let e = ExtractError::DeadlineExceeded { page: 7, secs: 120 };
        assert_eq!(e.http_status(), 504);
        assert!(e.to_string().contains("page 7"));
    }

    #[test]
    fn render_failure_is_server_fault() {
        let e = ExtractError::RenderFailure {
            page: 1,
            detail: "out of memory".into(),
        };
        assert_eq!(e.class(), ErrorClass::Server);
        assert_eq!(e.http_status(), 500);
    }
}
