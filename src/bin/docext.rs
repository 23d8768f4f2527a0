//! CLI binary for edgequake-docext.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `StructuringConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docext::pipeline::input::default_output_path;
use edgequake_docext::{
    resolve_input, BlockGranularity, ExtractionConfig, ExtractionProgressCallback, Extractor,
    InvoiceExtractor, PageSeparator, ProgressCallback, RecognitionBackendKind, StructuringConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page currently being processed. Pages run one at a time.
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting text from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let elapsed = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed();
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.finish_and_clear();
    }

    fn on_document_complete(&self, total_pages: usize, text_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages, {} chars extracted",
            green("✔"),
            bold(&total_pages.to_string()),
            text_len
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text with local Tesseract (stdout)
  docext invoice.pdf

  # Cloud OCR, write to file
  docext --backend textract --aws-region eu-west-1 scan.pdf -o scan.txt

  # HTML invoice from a URL, structured as JSON
  docext --invoice https://example.com/bill.html

  # Render the first page at 200 DPI
  docext --preview invoice.pdf -o page1.png

ENVIRONMENT VARIABLES:
  DOCEXT_PDFIUM_LIB_PATH  Directory containing libpdfium
  DOCEXT_BACKEND          tesseract | textract
  TESSDATA_PREFIX         Tesseract language data directory
  AWS_REGION / AWS_PROFILE / AWS_ACCESS_KEY_ID  Textract credentials
  OPENAI_API_KEY          LLM key for --invoice (or ANTHROPIC_API_KEY, …)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Extract text from PDF and HTML documents.
#[derive(Parser, Debug)]
#[command(
    name = "docext",
    version,
    about = "Extract text from PDF and HTML documents (OCR via Tesseract or AWS Textract)",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL (.pdf, .html, .htm).
    input: String,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "DOCEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Write output to ./<input name>.txt (or .json with --json/--invoice).
    #[arg(long, conflicts_with = "output")]
    auto_output: bool,

    /// Recognition backend.
    #[arg(long, env = "DOCEXT_BACKEND", value_enum, default_value = "tesseract")]
    backend: RecognitionBackendKind,

    /// Rendering DPI (72–600).
    #[arg(long, env = "DOCEXT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract languages, '+'-separated.
    #[arg(long, env = "DOCEXT_LANGUAGES", default_value = "eng")]
    languages: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "DOCEXT_PSM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Textract block granularity.
    #[arg(long, env = "DOCEXT_GRANULARITY", value_enum, default_value = "line")]
    granularity: BlockGranularity,

    /// AWS region for Textract.
    #[arg(long, env = "DOCEXT_AWS_REGION")]
    aws_region: Option<String>,

    /// Page separator: blank, space, formfeed, marker, or a custom string.
    #[arg(long, env = "DOCEXT_SEPARATOR", default_value = "blank")]
    separator: String,

    /// Whole-document deadline in seconds (0 disables it).
    #[arg(long, env = "DOCEXT_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCEXT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "DOCEXT_PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Structure the text into an invoice record with an LLM.
    #[arg(long, env = "DOCEXT_INVOICE")]
    invoice: bool,

    /// LLM provider for --invoice: openai, anthropic, gemini, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for --invoice.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Output JSON ({"filename", "text"} or the invoice) instead of plain text.
    #[arg(long, env = "DOCEXT_JSON")]
    json: bool,

    /// Render the first PDF page as PNG instead of extracting text.
    #[arg(long)]
    preview: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCEXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.preview;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let doc = resolve_input(&cli.input, cli.download_timeout)
        .await
        .with_context(|| format!("Failed to load '{}'", cli.input))?;

    let extractor = Extractor::from_config(config)
        .await
        .context("Failed to initialise extractor")?;

    let output_path = match (&cli.output, cli.auto_output) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(default_output_path(&cli.input, cli.json || cli.invoice)),
        (None, false) => None,
    };

    // ── Preview mode ─────────────────────────────────────────────────────
    if cli.preview {
        let image = extractor
            .preview(&doc)
            .await
            .context("Preview failed")?;
        let path = output_path.unwrap_or_else(|| PathBuf::from("preview.png"));
        tokio::fs::write(&path, &image.png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{}  {}x{} px  →  {}",
                green("✔"),
                image.width,
                image.height,
                bold(&path.display().to_string())
            );
        }
        return Ok(());
    }

    // ── Extraction ───────────────────────────────────────────────────────
    let start = Instant::now();
    let text = extractor
        .extract(&doc)
        .await
        .context("Extraction failed")?;

    let rendered = if cli.invoice {
        let structuring = StructuringConfig {
            model: cli.model.clone(),
            provider_name: cli.provider.clone(),
            ..Default::default()
        };
        let invoices =
            InvoiceExtractor::from_config(structuring).context("Failed to set up LLM provider")?;
        let invoice = invoices
            .structure(&text)
            .await
            .context("Invoice structuring failed")?;
        serde_json::to_string_pretty(&invoice).context("Failed to serialise invoice")?
    } else if cli.json {
        serde_json::to_string_pretty(&serde_json::json!({
            "filename": doc.filename,
            "text": text,
        }))
        .context("Failed to serialise output")?
    } else {
        text
    };

    match output_path {
        Some(path) => {
            tokio::fs::write(&path, rendered.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} chars  {}ms  →  {}",
                    green("✔"),
                    rendered.len(),
                    start.elapsed().as_millis(),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            if !cli.quiet && !show_progress {
                eprintln!(
                    "Extracted {} chars in {}ms",
                    rendered.len(),
                    start.elapsed().as_millis()
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .backend(cli.backend)
        .languages(cli.languages.clone())
        .page_seg_mode(cli.psm)
        .granularity(cli.granularity)
        .page_separator(parse_separator(&cli.separator))
        .request_timeout_secs((cli.timeout > 0).then_some(cli.timeout));

    if let Some(ref region) = cli.aws_region {
        builder = builder.aws_region(region.clone());
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "blank" => PageSeparator::Blank,
        "space" => PageSeparator::Space,
        "formfeed" | "ff" => PageSeparator::FormFeed,
        "marker" => PageSeparator::Marker,
        _ => PageSeparator::Custom(s.replace("\\n", "\n")),
    }
}
