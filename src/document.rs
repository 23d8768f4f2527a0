//! Uploaded documents and suffix-based type detection.

use crate::error::ExtractError;
use serde::Serialize;
use std::fmt;

/// Raw bytes of an uploaded document plus the filename it was declared with.
#[derive(Clone)]
pub struct DocumentBlob {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl DocumentBlob {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    /// Strategy for this blob, decided from the filename suffix alone.
    pub fn kind(&self) -> Result<DocumentKind, ExtractError> {
        DocumentKind::from_filename(&self.filename)
    }
}

impl fmt::Debug for DocumentBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentBlob")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Extraction strategy chosen for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Rasterise and OCR every page.
    Pdf,
    /// Walk the text nodes of the parsed tree.
    Html,
}

impl DocumentKind {
    /// Match the filename suffix, ignoring ASCII case.
    ///
    /// The content is never inspected: a PDF uploaded as `scan.bin` is
    /// rejected, and an HTML page named `page.pdf` goes to the PDF engine
    /// (which then reports [`ExtractError::InvalidDocument`]).
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Ok(DocumentKind::Pdf)
        } else if lower.ends_with(".html") || lower.ends_with(".htm") {
            Ok(DocumentKind::Html)
        } else {
            Err(ExtractError::UnsupportedType {
                filename: filename.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_suffix_any_case() {
        assert_eq!(DocumentKind::from_filename("a.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("x.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("Invoice.Pdf").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn html_suffixes() {
        assert_eq!(DocumentKind::from_filename("mail.html").unwrap(), DocumentKind::Html);
        assert_eq!(DocumentKind::from_filename("MAIL.HTM").unwrap(), DocumentKind::Html);
    }

    #[test]
    fn other_suffixes_are_unsupported() {
        for name in ["x.txt", "pdf", "scan.pdf.bak", "", "report.pdfx"] {
            let err = DocumentKind::from_filename(name).unwrap_err();
            assert!(
                matches!(err, ExtractError::UnsupportedType { ref filename } if filename == name),
                "{name}: {err:?}"
            );
        }
    }

    #[test]
    fn debug_hides_bytes() {
        let blob = DocumentBlob::new(vec![0u8; 2048], "big.pdf");
        let dbg = format!("{blob:?}");
        assert!(dbg.contains("big.pdf"));
        assert!(dbg.contains("2048"));
    }
}
