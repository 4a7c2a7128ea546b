//! Input resolution: normalise a user-supplied path, URL or byte buffer into
//! an in-memory PDF ready for upload.
//!
//! The OCR service needs the raw bytes and a file name, never a local path,
//! so every source ends up as a [`PdfSource`]. The `%PDF` magic bytes are
//! validated here so callers get a meaningful error before paying for an
//! upload the service would reject anyway.

use crate::error::Ocr2MdError;
use std::path::PathBuf;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF held in memory together with the name it will be uploaded under.
#[derive(Debug, Clone)]
pub struct PdfSource {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PdfSource {
    /// Wrap bytes received from elsewhere (e.g. a web form), validating them.
    ///
    /// Only the final path component of `file_name` is kept.
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Self, Ocr2MdError> {
        let file_name = sanitise_file_name(file_name);
        ensure_pdf(&file_name, &bytes)?;
        Ok(Self { file_name, bytes })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory PDF.
///
/// If the input is a URL, download it. If the input is a local file,
/// read it.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<PdfSource, Ocr2MdError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<PdfSource, Ocr2MdError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Ocr2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Ocr2MdError::FileNotFound { path }),
    };

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    PdfSource::from_bytes(path_str, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<PdfSource, Ocr2MdError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Ocr2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Ocr2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Ocr2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(Ocr2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?;
    info!("Downloaded {} bytes", bytes.len());

    PdfSource::from_bytes(&filename_from_url(url), bytes.to_vec())
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if last.to_ascii_lowercase().ends_with(".pdf") {
                    return last.to_string();
                }
                // arXiv-style ids such as `1706.03762` carry no extension.
                if !last.is_empty() {
                    return format!("{last}.pdf");
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// Keep only the final path component; fall back to `document.pdf`.
fn sanitise_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("document.pdf")
        .to_string()
}

fn ensure_pdf(name: &str, bytes: &[u8]) -> Result<(), Ocr2MdError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(Ocr2MdError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}
