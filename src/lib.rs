//! # edgequake-docext
//!
//! Extract plain text from uploaded PDF and HTML documents, and optionally
//! structure it into an invoice record with an LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DocumentBlob (bytes + filename)
//!  │
//!  ├─ .pdf  1. Render     rasterise every page via pdfium (spawn_blocking)
//!  │        2. Encode     PNG, lossless
//!  │        3. Recognise  Tesseract (local) or Textract (cloud)
//!  │        4. Join       pages in order, fail-fast on the first bad page
//!  │
//!  ├─ .html    text nodes, space-joined
//!  │
//!  └─ (optional) Invoice  LLM fills a fixed JSON template
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docext::{DocumentBlob, ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = Extractor::from_config(ExtractionConfig::default()).await?;
//!     let doc = DocumentBlob::new(std::fs::read("invoice.pdf")?, "invoice.pdf");
//!     println!("{}", extractor.extract(&doc).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | The `docext` binary (clap + anyhow + tracing-subscriber) |
//! | `tesseract` | on      | Local OCR through libtesseract (`leptess`) |
//! | `textract`  | on      | AWS Textract `DetectDocumentText` |
//! | `server`    | off     | The `docext-server` HTTP binary (axum) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod invoice;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    BlockGranularity, ExtractionConfig, ExtractionConfigBuilder, PageSeparator,
    RecognitionBackendKind, StructuringConfig,
};
pub use document::{DocumentBlob, DocumentKind};
pub use error::{ErrorClass, ExtractError};
pub use extract::Extractor;
pub use invoice::{Invoice, InvoiceExtractor, LineItem, Party};
pub use pipeline::encode::EncodedImage;
pub use pipeline::input::resolve_input;
pub use pipeline::ocr::{RecognitionResult, Recognizer, TextFragment};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
