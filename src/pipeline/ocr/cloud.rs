//! Cloud text detection: one stateless remote call per page image.
//!
//! Detection services report typed blocks. Textract in particular returns
//! every piece of text at both LINE and WORD granularity; concatenating both
//! would print each page twice. [`CloudRecognizer`] keeps only the blocks of
//! the configured [`BlockGranularity`].

use crate::config::BlockGranularity;
use crate::error::ExtractError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::ocr::{FragmentKind, RecognitionResult, Recognizer, TextFragment};
use async_trait::async_trait;
use tracing::debug;

/// Block type reported by a detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Line,
    Word,
    /// Page, table, key-value and other non-text blocks.
    Other,
}

/// One block returned by a detection call, in service order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub text: Option<String>,
}

/// A remote text-detection API.
#[async_trait]
pub trait TextDetectionClient: Send + Sync {
    async fn detect_text(&self, png: Vec<u8>) -> Result<Vec<TextBlock>, String>;
}

/// [`Recognizer`] over a stateless [`TextDetectionClient`].
pub struct CloudRecognizer<C: TextDetectionClient> {
    name: String,
    client: C,
    granularity: BlockGranularity,
}

impl<C: TextDetectionClient> CloudRecognizer<C> {
    pub fn new(name: impl Into<String>, client: C, granularity: BlockGranularity) -> Self {
        Self {
            name: name.into(),
            client,
            granularity,
        }
    }

    fn wanted(&self) -> (BlockKind, FragmentKind) {
        match self.granularity {
            BlockGranularity::Line => (BlockKind::Line, FragmentKind::Line),
            BlockGranularity::Word => (BlockKind::Word, FragmentKind::Word),
        }
    }
}

#[async_trait]
impl<C: TextDetectionClient> Recognizer for CloudRecognizer<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, image: EncodedImage) -> Result<RecognitionResult, ExtractError> {
        let page_num = image.page_num();
        let blocks = self
            .client
            .detect_text(image.png)
            .await
            .map_err(|detail| ExtractError::RecognitionFailure {
                page: page_num,
                backend: self.name.clone(),
                detail,
            })?;

        let (block_kind, fragment_kind) = self.wanted();
        let fragments: Vec<TextFragment> = blocks
            .into_iter()
            .filter(|b| b.kind == block_kind)
            .filter_map(|b| b.text)
            .map(|text| TextFragment {
                kind: fragment_kind,
                text,
            })
            .collect();

        debug!(
            "Page {}: {} returned {} {:?} blocks",
            page_num,
            self.name,
            fragments.len(),
            block_kind
        );
        Ok(RecognitionResult::new(fragments))
    }
}

// ── AWS Textract ─────────────────────────────────────────────────────────

/// [`TextDetectionClient`] calling AWS Textract `DetectDocumentText`.
#[cfg(feature = "textract")]
#[derive(Clone, Debug)]
pub struct TextractClient {
    client: aws_sdk_textract::Client,
}

#[cfg(feature = "textract")]
impl TextractClient {
    /// Load credentials and region from the default AWS provider chain,
    /// overriding the region when one is given.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        tracing::info!(
            region = ?sdk_config.region(),
            "Textract client initialized"
        );
        Self {
            client: aws_sdk_textract::Client::new(&sdk_config),
        }
    }
}

#[cfg(feature = "textract")]
#[async_trait]
impl TextDetectionClient for TextractClient {
    async fn detect_text(&self, png: Vec<u8>) -> Result<Vec<TextBlock>, String> {
        use aws_sdk_textract::error::DisplayErrorContext;
        use aws_sdk_textract::primitives::Blob;
        use aws_sdk_textract::types::{BlockType, Document};

        let output = self
            .client
            .detect_document_text()
            .document(Document::builder().bytes(Blob::new(png)).build())
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        Ok(output
            .blocks()
            .iter()
            .map(|block| TextBlock {
                kind: match block.block_type() {
                    Some(BlockType::Line) => BlockKind::Line,
                    Some(BlockType::Word) => BlockKind::Word,
                    _ => BlockKind::Other,
                },
                text: block.text().map(str::to_string),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Textract-shaped reply: a PAGE block, then each line followed by its words.
    struct ScriptedClient;

    #[async_trait]
    impl TextDetectionClient for ScriptedClient {
        async fn detect_text(&self, _png: Vec<u8>) -> Result<Vec<TextBlock>, String> {
            let block = |kind, text: Option<&str>| TextBlock {
                kind,
                text: text.map(str::to_string),
            };
            Ok(vec![
                block(BlockKind::Other, None),
                block(BlockKind::Line, Some("Invoice 42")),
                block(BlockKind::Word, Some("Invoice")),
                block(BlockKind::Word, Some("42")),
                block(BlockKind::Line, Some("Total 9.99")),
                block(BlockKind::Word, Some("Total")),
                block(BlockKind::Word, Some("9.99")),
            ])
        }
    }

    struct FailingClient;

    #[async_trait]
    impl TextDetectionClient for FailingClient {
        async fn detect_text(&self, _png: Vec<u8>) -> Result<Vec<TextBlock>, String> {
            Err("ThrottlingException".to_string())
        }
    }

    fn image() -> EncodedImage {
        EncodedImage {
            page: 1,
            png: vec![1, 2, 3],
            width: 1,
            height: 1,
        }
    }

    #[tokio::test]
    async fn line_granularity_does_not_duplicate_words() {
        let r = CloudRecognizer::new("textract", ScriptedClient, BlockGranularity::Line);
        let text = r.recognize(image()).await.unwrap().into_text();
        assert_eq!(text, "Invoice 42\nTotal 9.99");
    }

    #[tokio::test]
    async fn word_granularity_keeps_only_words() {
        let r = CloudRecognizer::new("textract", ScriptedClient, BlockGranularity::Word);
        let result = r.recognize(image()).await.unwrap();
        assert_eq!(result.fragments.len(), 4);
        assert!(result.fragments.iter().all(|f| f.kind == FragmentKind::Word));
        assert_eq!(result.into_text(), "Invoice 42 Total 9.99");
    }

    #[tokio::test]
    async fn client_error_becomes_recognition_failure() {
        let r = CloudRecognizer::new("textract", FailingClient, BlockGranularity::Line);
        let err = r.recognize(image()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractError::RecognitionFailure { page: 2, ref detail, .. } if detail == "ThrottlingException"
        ));
    }
}
