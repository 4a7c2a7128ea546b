//! Error types for the edgequake-ocr2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Ocr2MdError`]: **Fatal**: the conversion cannot proceed at all
//!   (bad input file, missing API key, the OCR service rejected the request).
//!   Returned as `Err(Ocr2MdError)` from the top-level `convert*` functions.
//!
//! * [`AnnotationError`]: **Non-fatal**: one image annotation returned by the
//!   OCR service could not be decoded. The image marker is left in place and
//!   the rest of the document is unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr2md library.
#[derive(Debug, Error)]
pub enum Ocr2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but is not a PDF.
    #[error("'{name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── OCR service errors ────────────────────────────────────────────────
    /// No API key was configured and `MISTRAL_API_KEY` is unset.
    #[error("MISTRAL_API_KEY environment variable not set.\nExport it or put it in a .env file.")]
    MissingApiKey,

    /// The service rejected the API key (HTTP 401/403). Retrying will not help.
    #[error("Authentication error from the OCR service: {detail}")]
    AuthError { detail: String },

    /// HTTP 429 persisted after every retry.
    #[error("Rate limit exceeded by the OCR service after {retries} retries")]
    RateLimitExceeded { retries: u32 },

    /// The service returned a non-retryable error status.
    #[error("OCR service error during {operation} (HTTP {status}): {message}")]
    ApiError {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// A call timed out on every attempt.
    #[error("OCR service call '{operation}' timed out after {secs}s")]
    ApiTimeout { operation: &'static str, secs: u64 },

    /// The request never reached the service (DNS, TLS, connection reset).
    #[error("Could not reach the OCR service during {operation}: {reason}")]
    Transport {
        operation: &'static str,
        reason: String,
    },

    /// The service answered 2xx but the body did not have the expected shape.
    #[error("Unexpected response from the OCR service during {operation}: {detail}")]
    InvalidResponse {
        operation: &'static str,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Ocr2MdError {
    /// Whether a caller may reasonably try the same request again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Ocr2MdError::RateLimitExceeded { .. }
                | Ocr2MdError::ApiTimeout { .. }
                | Ocr2MdError::Transport { .. }
                | Ocr2MdError::DownloadTimeout { .. }
        ) || matches!(self, Ocr2MdError::ApiError { status, .. } if *status >= 500)
    }
}

/// A non-fatal error for a single image annotation.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum AnnotationError {
    /// The annotation string is not valid JSON.
    #[error("Page {page}, image {image}: annotation is not valid JSON: {detail}")]
    Malformed {
        page: usize,
        image: usize,
        detail: String,
    },
}
