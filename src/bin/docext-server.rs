//! HTTP server binary for edgequake-docext.
//!
//! Builds the extractor once at startup (pdfium binding, engine warm-up and
//! OCR backend initialisation are all fatal) and serves the upload endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docext::server::{create_router, AppState};
use edgequake_docext::{
    BlockGranularity, ExtractionConfig, Extractor, InvoiceExtractor, RecognitionBackendKind,
    StructuringConfig,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Serve POST /extract-text for PDF and HTML uploads.
#[derive(Parser, Debug)]
#[command(name = "docext-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "DOCEXT_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Recognition backend.
    #[arg(long, env = "DOCEXT_BACKEND", value_enum, default_value = "tesseract")]
    backend: RecognitionBackendKind,

    /// Rendering DPI (72–600).
    #[arg(long, env = "DOCEXT_DPI", default_value_t = 300)]
    dpi: u32,

    /// Tesseract languages, '+'-separated.
    #[arg(long, env = "DOCEXT_LANGUAGES", default_value = "eng")]
    languages: String,

    /// Textract block granularity.
    #[arg(long, env = "DOCEXT_GRANULARITY", value_enum, default_value = "line")]
    granularity: BlockGranularity,

    /// AWS region for Textract.
    #[arg(long, env = "DOCEXT_AWS_REGION")]
    aws_region: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "DOCEXT_PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Number of requests that may render at the same time.
    #[arg(long, env = "DOCEXT_POOL_SIZE", default_value_t = 1)]
    pool_size: usize,

    /// Seconds a request waits for a free rendering engine.
    #[arg(long, env = "DOCEXT_ACQUIRE_TIMEOUT", default_value_t = 10)]
    acquire_timeout: u64,

    /// Whole-document deadline in seconds (0 disables it).
    #[arg(long, env = "DOCEXT_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Disable invoice structuring; every response is raw text.
    #[arg(long, env = "DOCEXT_NO_INVOICE")]
    no_invoice: bool,

    /// LLM provider for invoice structuring.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for invoice structuring.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("edgequake_docext=info,tower_http=info")),
        )
        .init();

    let mut builder = ExtractionConfig::builder()
        .dpi(args.dpi)
        .backend(args.backend)
        .languages(args.languages.clone())
        .granularity(args.granularity)
        .pool_size(args.pool_size)
        .acquire_timeout_secs(args.acquire_timeout)
        .request_timeout_secs((args.timeout > 0).then_some(args.timeout));
    if let Some(ref region) = args.aws_region {
        builder = builder.aws_region(region.clone());
    }
    if let Some(ref path) = args.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    let extractor = Extractor::from_config(config)
        .await
        .context("Failed to initialise extractor")?;

    let invoices = if args.no_invoice {
        None
    } else {
        let structuring = StructuringConfig {
            model: args.model.clone(),
            provider_name: args.provider.clone(),
            ..Default::default()
        };
        match InvoiceExtractor::from_config(structuring) {
            Ok(invoices) => Some(invoices),
            Err(e) => {
                warn!("Invoice structuring disabled: {}", e);
                None
            }
        }
    };

    let app = create_router(AppState::new(extractor, invoices));

    info!("docext-server listening on http://{}", args.bind);
    info!("  POST http://{}/extract-text", args.bind);
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
