//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a base config across web requests and override a single
//! field (such as the image-description toggle) per request.

use crate::client::OcrClient;
use crate::error::Ocr2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OCR model identifier.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Default API root of the OCR service.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Environment variable consulted when no API key is configured explicitly.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ocr2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .api_key("sk-test")
///     .include_image_descriptions(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "mistral-ocr-latest");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// API key for the OCR service. If None, read from `MISTRAL_API_KEY`.
    pub api_key: Option<String>,

    /// API root, without the `/v1` suffix. Default: `https://api.mistral.ai`.
    ///
    /// Override to point at a proxy or a mock server in tests.
    pub base_url: String,

    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub model: String,

    /// Ask the service to annotate every extracted image with a description,
    /// then substitute the descriptions for the image markers. Default: true.
    pub include_image_descriptions: bool,

    /// Marker written before each page in the assembled Markdown.
    /// Default: [`PageMarker::Comment`].
    pub page_marker: PageMarker,

    /// Lifetime of the signed URL handed to the OCR endpoint, in hours. Default: 24.
    pub signed_url_expiry_hours: u32,

    /// Maximum retry attempts on a transient API failure. Default: 3.
    ///
    /// Only 429, 5xx, timeouts and connection errors are retried. Permanent
    /// errors (bad API key, 400) surface immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-request timeout for OCR service calls in seconds. Default: 300.
    ///
    /// The OCR call processes the whole document server-side, so a long
    /// scanned book legitimately takes minutes.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Delete the uploaded file from remote storage once OCR is done. Default: false.
    pub delete_after_processing: bool,

    /// Pre-constructed OCR client. Takes precedence over `api_key`/`base_url`.
    pub client: Option<Arc<dyn OcrClient>>,

    /// Receives stage and page events while the conversion runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            include_image_descriptions: true,
            page_marker: PageMarker::default(),
            signed_url_expiry_hours: 24,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 300,
            download_timeout_secs: 120,
            delete_after_processing: false,
            client: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("include_image_descriptions", &self.include_image_descriptions)
            .field("page_marker", &self.page_marker)
            .field("signed_url_expiry_hours", &self.signed_url_expiry_hours)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("delete_after_processing", &self.delete_after_processing)
            .field("client", &self.client.as_ref().map(|_| "<dyn OcrClient>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured API key, falling back to `MISTRAL_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String, Ocr2MdError> {
        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(Ocr2MdError::MissingApiKey),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn include_image_descriptions(mut self, v: bool) -> Self {
        self.config.include_image_descriptions = v;
        self
    }

    pub fn page_marker(mut self, marker: PageMarker) -> Self {
        self.config.page_marker = marker;
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn delete_after_processing(mut self, v: bool) -> Self {
        self.config.delete_after_processing = v;
        self
    }

    pub fn client(mut self, client: Arc<dyn OcrClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The API key is deliberately not checked here: it may come from the
    /// environment at conversion time, or not be needed at all when a
    /// pre-built client is injected.
    pub fn build(self) -> Result<ConversionConfig, Ocr2MdError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.model.trim().is_empty() {
            return Err(Ocr2MdError::InvalidConfig("model must not be empty".into()));
        }
        if c.signed_url_expiry_hours == 0 {
            return Err(Ocr2MdError::InvalidConfig(
                "signed URL expiry must be at least 1 hour".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Marker written at the top of each page in the assembled Markdown.
///
/// Every page's Markdown is followed by a blank line regardless of the marker,
/// so [`PageMarker::None`] still keeps pages apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageMarker {
    /// HTML comment with the page number: `<!-- Page N -->`. (default)
    #[default]
    Comment,
    /// No marker; pages are only separated by a blank line.
    None,
    /// Horizontal rule: `---`.
    HorizontalRule,
    /// Custom line; `{n}` is replaced by the 1-indexed page number.
    Custom(String),
}

impl PageMarker {
    /// Render the marker (including its trailing blank line) for `page_num`.
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageMarker::Comment => format!("<!-- Page {} -->\n\n", page_num),
            PageMarker::None => String::new(),
            PageMarker::HorizontalRule => "---\n\n".to_string(),
            PageMarker::Custom(s) => format!("{}\n\n", s.replace("{n}", &page_num.to_string())),
        }
    }

    /// Parse a CLI-style name: `comment`, `none`, `hr`/`---`, or a custom string.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "comment" => PageMarker::Comment,
            "none" => PageMarker::None,
            "hr" | "---" => PageMarker::HorizontalRule,
            _ => PageMarker::Custom(s.to_string()),
        }
    }
}

/// Settings for the web front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind. Default: `localhost`; use `0.0.0.0` in containers.
    pub host: String,
    /// TCP port. Default: 7860.
    pub port: u16,
    /// Largest accepted upload in bytes. Default: 50 MiB, the service's own limit.
    pub max_upload_bytes: usize,
    /// Number of conversion jobs kept in memory. Default: 64.
    pub max_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7860,
            max_upload_bytes: 50 * 1024 * 1024,
            max_jobs: 64,
        }
    }
}

impl ServerConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
