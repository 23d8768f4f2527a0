//! Input resolution: turn a CLI path or URL into an in-memory [`DocumentBlob`].
//!
//! pdfium opens documents from a byte slice, so nothing is written to disk.
//! The blob's filename drives dispatch: for local files it is the final path
//! component, for URLs the last path segment, falling back to the response
//! `Content-Type` when the URL carries no extension.

use crate::document::DocumentBlob;
use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load `input` (a local path or an http(s) URL) into memory.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<DocumentBlob, ExtractError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<DocumentBlob, ExtractError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExtractError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ExtractError::Internal(format!("failed to read {}: {}", path.display(), e)),
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(DocumentBlob::new(bytes, filename))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<DocumentBlob, ExtractError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| ExtractError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(classify)?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = filename_for_url(url, content_type.as_deref());

    let bytes = response.bytes().await.map_err(classify)?;
    info!("Downloaded {} bytes as '{}'", bytes.len(), filename);
    Ok(DocumentBlob::new(bytes.to_vec(), filename))
}

/// Pick a dispatchable filename for a downloaded document.
fn filename_for_url(url: &str, content_type: Option<&str>) -> String {
    let last_segment = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    if let Some(last) = &last_segment {
        if last.contains('.') {
            return last.clone();
        }
    }

    let stem = last_segment
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "download".to_string());
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match essence.as_deref() {
        Some("text/html") | Some("application/xhtml+xml") => format!("{stem}.html"),
        Some("application/pdf") => format!("{stem}.pdf"),
        _ => stem,
    }
}

/// Default output path for `input`: same stem, `.txt` or `.json` extension.
pub fn default_output_path(input: &str, json: bool) -> PathBuf {
    let ext = if json { "json" } else { "txt" };
    let name = if is_url(input) {
        filename_for_url(input, None)
    } else {
        Path::new(input)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    };
    PathBuf::from(name).with_extension(ext)
}
