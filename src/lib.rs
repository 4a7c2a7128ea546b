//! # edgequake-ocr2md
//!
//! Convert PDF documents to Markdown with the Mistral OCR API, from a small
//! web UI, the command line, or as a library.
//!
//! ## Why this crate?
//!
//! Hosted OCR models read scanned pages, tables and figures far better than
//! local text extraction, but driving them takes a few chores: upload the
//! file, obtain a signed URL, call the OCR endpoint, and stitch the per-page
//! results back together. This crate does exactly those chores and nothing
//! else. It performs no OCR or PDF parsing of its own.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL, or in-memory upload; check %PDF
//!  ├─ 2. Upload    POST /v1/files (purpose=ocr)            progress 0.0
//!  ├─ 3. Sign      GET  /v1/files/{id}/url
//!  ├─ 4. OCR       POST /v1/ocr  (+ image-description schema) progress 0.3
//!  ├─ 5. Annotate  swap image markers for descriptions      progress 0.7
//!  └─ 6. Output    "<!-- Page N -->" + page Markdown, per page  progress 1.0
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from MISTRAL_API_KEY
//!     let config = ConversionConfig::default();
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{}", output.status_message());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `ocr2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables the axum web UI in [`server`] |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-ocr2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{MistralClient, OcrClient};
pub use config::{ConversionConfig, ConversionConfigBuilder, PageMarker, ServerConfig};
pub use convert::{
    assemble_document, convert, convert_from_bytes, convert_sync, convert_to_file,
    write_temp_markdown,
};
pub use error::{AnnotationError, Ocr2MdError};
pub use output::{status_for_error, ConversionOutput, ConversionStats, PageResult};
pub use progress::{
    ConversionProgressCallback, ConversionStage, NoopProgressCallback, ProgressCallback,
};
