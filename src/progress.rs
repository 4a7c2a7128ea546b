//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through upload, OCR and assembly.
//!
//! The web front-end forwards these events into its job registry so the page
//! can poll them; the CLI drives an indicatif bar from the same trait.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastStage(Mutex<String>);
//!
//! impl ConversionProgressCallback for LastStage {
//!     fn on_progress(&self, fraction: f32, description: &str) {
//!         *self.0.lock().unwrap() = format!("{:.0}% {}", fraction * 100.0, description);
//!     }
//! }
//!
//! let cb = Arc::new(LastStage(Mutex::new(String::new())));
//! let config = ConversionConfig::builder()
//!     .progress_callback(cb as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coarse stages of a conversion, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStage {
    /// The PDF is being uploaded and a signed URL requested.
    Uploading,
    /// The OCR service is processing the document.
    Processing,
    /// Page results are being stitched into one Markdown document.
    Generating,
    /// Finished successfully.
    Complete,
}

impl ConversionStage {
    /// Fraction of the overall work done when this stage begins.
    pub fn fraction(self) -> f32 {
        match self {
            ConversionStage::Uploading => 0.0,
            ConversionStage::Processing => 0.3,
            ConversionStage::Generating => 0.7,
            ConversionStage::Complete => 1.0,
        }
    }

    /// Human-readable label shown next to the progress bar.
    pub fn description(self) -> &'static str {
        match self {
            ConversionStage::Uploading => "Uploading PDF to Mistral...",
            ConversionStage::Processing => "Processing OCR...",
            ConversionStage::Generating => "Generating markdown...",
            ConversionStage::Complete => "Complete!",
        }
    }
}

/// Called by the conversion pipeline as it progresses.
///
/// Implementations must be `Send + Sync`: the web front-end runs conversions
/// on spawned tasks. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Generic progress update.
    ///
    /// # Arguments
    /// * `fraction`: 0.0 to 1.0
    /// * `description`: short label for the current step
    fn on_progress(&self, fraction: f32, description: &str) {
        let _ = (fraction, description);
    }

    /// Called when the pipeline enters a new stage.
    ///
    /// The default forwards to [`Self::on_progress`].
    fn on_stage(&self, stage: ConversionStage) {
        self.on_progress(stage.fraction(), stage.description());
    }

    /// Called after each page has been appended to the output.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages returned by the OCR service
    /// * `markdown_len`: byte length of the page's Markdown
    fn on_page_assembled(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        let _ = (page_num, total_pages, markdown_len);
    }

    /// Called once after a successful conversion.
    fn on_conversion_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called once when the conversion fails with a fatal error.
    fn on_conversion_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
