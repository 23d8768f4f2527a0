//! HTTP upload endpoint.
//!
//! | Method | Path            | Body                          | Response |
//! |--------|-----------------|-------------------------------|----------|
//! | POST   | `/extract-text` | multipart, file in field `file` | invoice JSON, or `{"filename","text"}` with `?raw=true` or no text |
//! | GET    | `/health`       |                               | `ok`     |
//!
//! Errors are `{"error": message}` with the status from
//! [`ExtractError::http_status`].

use crate::document::DocumentBlob;
use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::invoice::InvoiceExtractor;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
    /// `None` when no LLM provider is configured; responses are then raw text.
    pub invoices: Option<Arc<InvoiceExtractor>>,
}

impl AppState {
    pub fn new(extractor: Extractor, invoices: Option<InvoiceExtractor>) -> Self {
        Self {
            extractor: Arc::new(extractor),
            invoices: invoices.map(Arc::new),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/extract-text", post(extract_text))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractParams {
    #[serde(default)]
    pub raw: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RawTextResponse {
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler error: either a malformed upload or a pipeline failure.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Extract(ExtractError),
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        ApiError::Extract(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Extract(e) => (
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                e.to_string(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn extract_text(
    State(state): State<AppState>,
    Query(params): Query<ExtractParams>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload: Option<DocumentBlob> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some(DocumentBlob::new(bytes.to_vec(), filename));
        break;
    }

    let doc = upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".into()))?;
    info!("Upload '{}' ({} bytes)", doc.filename, doc.bytes.len());

    let text = state.extractor.extract(&doc).await.inspect_err(|e| {
        warn!("Extraction of '{}' failed: {}", doc.filename, e);
    })?;

    match (&state.invoices, params.raw) {
        (Some(invoices), false) if !text.trim().is_empty() => {
            let invoice = invoices.structure(&text).await?;
            Ok(Json(invoice).into_response())
        }
        _ => Ok(Json(RawTextResponse {
            filename: doc.filename,
            text,
        })
        .into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionConfig, StructuringConfig};
    use crate::pipeline::encode::EncodedImage;
    use crate::pipeline::ocr::{RecognitionResult, Recognizer};
    use crate::pipeline::pool::EnginePool;
    use crate::pipeline::render::{DocumentHandle, RenderEngine};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct RejectingEngine;

    impl RenderEngine for RejectingEngine {
        fn open_document<'a>(
            &'a self,
            _bytes: &'a [u8],
        ) -> Result<Box<dyn DocumentHandle + 'a>, ExtractError> {
            Err(ExtractError::InvalidDocument {
                detail: "not a PDF".into(),
            })
        }
    }

    struct SilentRecognizer;

    #[async_trait]
    impl Recognizer for SilentRecognizer {
        fn name(&self) -> &str {
            "silent"
        }

        async fn recognize(&self, _image: EncodedImage) -> Result<RecognitionResult, ExtractError> {
            Ok(RecognitionResult::default())
        }
    }

    fn extractor() -> Extractor {
        let pool = EnginePool::new(Arc::new(RejectingEngine), 1, Duration::from_millis(50));
        Extractor::new(pool, Arc::new(SilentRecognizer), ExtractionConfig::default())
    }

    fn app() -> Router {
        create_router(AppState::new(extractor(), None))
    }

    fn app_with_invoices(provider: edgequake_llm::MockProvider) -> Router {
        let invoices = InvoiceExtractor::new(Arc::new(provider), StructuringConfig::default());
        create_router(AppState::new(extractor(), Some(invoices)))
    }

    const BOUNDARY: &str = "docext-test-boundary";

    fn upload(uri: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn html_upload_returns_raw_text() {
        let response = app()
            .oneshot(upload(
                "/extract-text?raw=true",
                "file",
                "bill.HTML",
                b"<p>Invoice</p><p>42</p>",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["filename"], "bill.HTML");
        assert_eq!(json["text"], "Invoice 42");
    }

    #[tokio::test]
    async fn unsupported_type_is_bad_request() {
        let response = app()
            .oneshot(upload("/extract-text", "file", "notes.txt", b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("notes.txt"));
    }

    #[tokio::test]
    async fn malformed_pdf_is_bad_request() {
        let response = app()
            .oneshot(upload("/extract-text", "file", "scan.pdf", b"garbage"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let response = app()
            .oneshot(upload("/extract-text", "document", "scan.pdf", b"%PDF"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("'file'"));
    }

    #[tokio::test]
    async fn text_is_structured_into_invoice() {
        let provider = edgequake_llm::MockProvider::new();
        provider
            .add_response(r#"{"invoice_number": "INV-9", "total_amount": 99.5}"#)
            .await;

        let response = app_with_invoices(provider)
            .oneshot(upload("/extract-text", "file", "bill.html", b"<p>INV-9 total 99.50</p>"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["invoice_number"], "INV-9");
        assert_eq!(json["total_amount"], "99.5");
    }

    #[tokio::test]
    async fn document_without_text_skips_structuring() {
        let response = app_with_invoices(edgequake_llm::MockProvider::new())
            .oneshot(upload("/extract-text", "file", "blank.html", b"<html></html>"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["filename"], "blank.html");
        assert_eq!(json["text"], "");
    }
}
