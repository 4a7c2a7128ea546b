//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one step; the network calls themselves
//! live behind [`crate::client::OcrClient`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ upload ──▶ signed URL ──▶ ocr ──▶ annotate ──▶ assemble
//! (path/URL/bytes)                  (request)  (image descriptions)
//! ```
//!
//! 1. [`input`]: turn a path, URL or byte buffer into a validated in-memory PDF
//! 2. [`ocr`]: build the OCR request, optionally with the image-description schema
//! 3. [`annotate`]: substitute image descriptions for image markers, page by page

pub mod annotate;
pub mod input;
pub mod ocr;
