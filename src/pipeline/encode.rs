//! Image encoding: `DynamicImage` → PNG bytes for the recognition backend.
//!
//! PNG is lossless: JPEG artefacts around glyph edges measurably hurt
//! Tesseract and Textract accuracy on rendered text. Both backends accept PNG
//! directly, so no further wrapping is needed.

use crate::error::ExtractError;
use image::DynamicImage;
use std::fmt;
use std::io::Cursor;
use tracing::debug;

/// A rendered page serialised as PNG.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Zero-based page index the image was rendered from.
    pub page: usize,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// One-based page number, for logs and errors.
    pub fn page_num(&self) -> usize {
        self.page + 1
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("page", &self.page)
            .field("bytes", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Encode the rendered page at zero-based `page` as PNG.
pub fn encode_page(page: usize, img: &DynamicImage) -> Result<EncodedImage, ExtractError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ExtractError::EncodeFailure {
            page: page + 1,
            detail: e.to_string(),
        })?;

    debug!("Encoded page {} → {} bytes PNG", page + 1, buf.len());

    Ok(EncodedImage {
        page,
        png: buf,
        width: img.width(),
        height: img.height(),
    })
}
