//! Pipeline stages for document-to-text extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//!           ┌─ .pdf ─▶ pool ─▶ pages: render ─▶ encode ─▶ ocr ─┐
//! input ────┤                     (pdfium)   (PNG)   (local/cloud) ├─▶ postprocess ─▶ text
//! (path/URL)└─ .html ─▶ html ─────────────────────────────────────┘
//! ```
//!
//! 1. [`input`]: load the user-supplied path or URL into a `DocumentBlob`
//! 2. [`pool`]: bounded-wait access to the process-wide rendering engine
//! 3. [`pages`]: the per-page loop; runs in `spawn_blocking` because pdfium
//!    is not async-safe
//! 4. [`render`]: rasterise one page at a given DPI
//! 5. [`encode`]: PNG-encode each `DynamicImage`
//! 6. [`ocr`]: recognise text with Tesseract or Textract
//! 7. [`html`]: text nodes of an HTML document
//! 8. [`postprocess`]: deterministic text cleanup

pub mod encode;
pub mod html;
pub mod input;
pub mod ocr;
pub mod pages;
pub mod pool;
pub mod postprocess;
pub mod render;
