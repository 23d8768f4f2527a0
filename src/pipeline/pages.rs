//! Page iteration: open → for each page (render → encode → recognise) → close.
//!
//! This is synchronous code meant to run inside `spawn_blocking`: pdfium
//! calls block, and the document handle borrows the engine so it cannot cross
//! an `.await`. Recognition is async, so each page's recognition future is
//! driven to completion on the caller's runtime through a [`Handle`].
//!
//! The loop is fail-fast. The first failing page aborts the document and no
//! partial text is returned. The document handle is a local `Box` and is
//! dropped on every exit path, closing the document exactly once.

use crate::config::PageSeparator;
use crate::error::ExtractError;
use crate::pipeline::encode::{encode_page, EncodedImage};
use crate::pipeline::ocr::Recognizer;
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::render::{DocumentHandle, RenderEngine};
use crate::progress::ProgressCallback;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-document knobs for [`extract_pages`].
#[derive(Clone, Default)]
pub struct PageLoopOptions {
    pub dpi: u32,
    pub separator: PageSeparator,
    /// Absolute time by which the whole document must be done.
    pub deadline: Option<Instant>,
    /// Deadline length, reported in [`ExtractError::DeadlineExceeded`].
    pub deadline_secs: u64,
    pub progress: Option<ProgressCallback>,
}

/// Extract the text of every page of the PDF in `bytes`, in page order.
///
/// A document with zero pages yields an empty string. Must not be called from
/// an async context: it blocks on `rt` for each recognition.
pub fn extract_pages(
    engine: &dyn RenderEngine,
    bytes: &[u8],
    recognizer: &dyn Recognizer,
    rt: &Handle,
    opts: &PageLoopOptions,
) -> Result<String, ExtractError> {
    let document = engine.open_document(bytes)?;
    let total = document.page_count()?;
    info!(
        "Extracting {} page(s) at {} DPI with {}",
        total,
        opts.dpi,
        recognizer.name()
    );

    if let Some(cb) = &opts.progress {
        cb.on_document_start(total);
    }

    let mut output = String::new();
    for index in 0..total {
        let page_num = index + 1;
        if let Some(cb) = &opts.progress {
            cb.on_page_start(page_num, total);
        }

        let result = process_page(document.as_ref(), index, recognizer, rt, opts);
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!("Page {}/{} failed: {}", page_num, total, e);
                if let Some(cb) = &opts.progress {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
                return Err(e);
            }
        };

        if index > 0 {
            output.push_str(&opts.separator.render(page_num));
        }
        output.push_str(&text);

        if let Some(cb) = &opts.progress {
            cb.on_page_complete(page_num, total, text.len());
        }
    }

    if let Some(cb) = &opts.progress {
        cb.on_document_complete(total, output.len());
    }
    debug!("Document done: {} chars from {} page(s)", output.len(), total);
    Ok(output)
}

fn process_page(
    document: &dyn DocumentHandle,
    index: usize,
    recognizer: &dyn Recognizer,
    rt: &Handle,
    opts: &PageLoopOptions,
) -> Result<String, ExtractError> {
    let page_num = index + 1;
    let expired = || ExtractError::DeadlineExceeded {
        page: page_num,
        secs: opts.deadline_secs,
    };

    if opts.deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(expired());
    }

    let image = document.render_page(index, opts.dpi)?;
    let encoded = encode_page(index, &image)?;
    drop(image);

    let recognised = match opts.deadline {
        Some(deadline) => rt
            .block_on(tokio::time::timeout_at(
                deadline,
                recognizer.recognize(encoded),
            ))
            .map_err(|_| expired())??,
        None => rt.block_on(recognizer.recognize(encoded))?,
    };

    Ok(clean_text(&recognised.into_text()))
}

/// Render the first page at `dpi` as PNG, for previews.
///
/// Fails with [`ExtractError::InvalidDocument`] when the document has no pages.
pub fn render_first_page(
    engine: &dyn RenderEngine,
    bytes: &[u8],
    dpi: u32,
) -> Result<EncodedImage, ExtractError> {
    let document = engine.open_document(bytes)?;
    if document.page_count()? == 0 {
        return Err(ExtractError::InvalidDocument {
            detail: "document has no pages".to_string(),
        });
    }
    let image = document.render_page(0, dpi)?;
    encode_page(0, &image)
}
