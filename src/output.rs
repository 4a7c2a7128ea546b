//! Conversion results.

use crate::error::{AnnotationError, Ocr2MdError};
use serde::{Deserialize, Serialize};

/// Everything produced by one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The assembled document: page markers and page Markdown, concatenated.
    pub markdown: String,
    /// Per-page results in document order.
    pub pages: Vec<PageResult>,
    /// Name the PDF was uploaded under.
    pub source_name: String,
    /// Model that served the request, as reported by the service.
    pub model: Option<String>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// One-line summary suitable for a status widget.
    pub fn status_message(&self) -> String {
        format!("✓ Successfully processed {} page(s)", self.pages.len())
    }

    /// Suggested download name: the source's stem with a `.md` extension.
    pub fn markdown_file_name(&self) -> String {
        let stem = std::path::Path::new(&self.source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document");
        format!("{stem}.md")
    }
}

/// Status line shown in place of [`ConversionOutput::status_message`] on failure.
pub fn status_for_error(error: &Ocr2MdError) -> String {
    format!("✗ Error processing PDF: {error}")
}

/// Result for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position in the response.
    pub page_num: usize,
    /// Page Markdown after image descriptions were applied.
    pub markdown: String,
    /// Images the service extracted from this page.
    pub image_count: usize,
    /// Image markers replaced by a description.
    pub described_images: usize,
    /// Annotations that could not be decoded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotation_errors: Vec<AnnotationError>,
}

/// Aggregate numbers for a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_images: usize,
    pub described_images: usize,
    /// Size of the uploaded PDF.
    pub source_bytes: usize,
    /// Pages billed by the service, when reported.
    pub pages_processed: Option<u32>,
    /// Upload plus signed-URL request.
    pub upload_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}
