//! Conversion entry points.
//!
//! Every entry point funnels into the same sequence: upload the PDF to the
//! service's file storage, exchange the file id for a signed URL, run OCR on
//! that URL, then stitch the returned pages into one Markdown document.
//! Progress is reported through the configured
//! [`crate::progress::ConversionProgressCallback`] at each stage.

use crate::client::{MistralClient, OcrClient, OcrPage};
use crate::config::{ConversionConfig, PageMarker};
use crate::error::Ocr2MdError;
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::input::{self, PdfSource};
use crate::pipeline::{annotate, ocr};
use crate::progress::ConversionStage;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str`: Local file path or HTTP/HTTPS URL to a PDF
/// * `config`: Conversion configuration
///
/// # Errors
/// Every failure is fatal: unreadable input, missing API key, or any
/// OCR service error that survived the retries.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Ocr2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    notify_stage(config, ConversionStage::Uploading);

    let result = match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(source) => run(source, config).await,
        Err(e) => Err(e),
    };

    finish(config, result)
}

/// Convert PDF bytes in memory to Markdown.
///
/// This is what the web front-end uses: the uploaded form field never touches
/// the local disk. `file_name` is the name the PDF is uploaded under.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocr2md::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes("document.pdf", bytes, &config).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Ocr2MdError> {
    info!("Starting conversion: {} ({} bytes)", file_name, bytes.len());
    notify_stage(config, ConversionStage::Uploading);

    let result = match PdfSource::from_bytes(file_name, bytes) {
        Ok(source) => run(source, config).await,
        Err(e) => Err(e),
    };

    finish(config, result)
}

/// Convert a PDF and write output directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Ocr2MdError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Ocr2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &output.markdown)
        .await
        .map_err(|e| Ocr2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Ocr2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Ocr2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Ocr2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Write `markdown` to a fresh `.md` file in the system temp directory.
///
/// The file lives as long as the returned [`TempPath`]; dropping it deletes
/// the file. Call [`TempPath::keep`] to retain it.
pub async fn write_temp_markdown(markdown: &str) -> Result<TempPath, Ocr2MdError> {
    let markdown = markdown.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut file = tempfile::Builder::new()
            .prefix("ocr2md-")
            .suffix(".md")
            .tempfile()?;
        file.write_all(markdown.as_bytes())?;
        file.flush()?;
        Ok::<_, std::io::Error>(file.into_temp_path())
    })
    .await
    .map_err(|e| Ocr2MdError::Internal(format!("temp file task failed: {e}")))?
    .map_err(|e| Ocr2MdError::OutputWriteFailed {
        path: std::env::temp_dir(),
        source: e,
    })
}

/// Concatenate pages: for each page its marker, its Markdown, then a blank line.
pub fn assemble_document(pages: &[PageResult], marker: &PageMarker) -> String {
    let capacity = pages.iter().map(|p| p.markdown.len() + 32).sum();
    let mut markdown = String::with_capacity(capacity);
    for page in pages {
        markdown.push_str(&marker.render(page.page_num));
        markdown.push_str(&page.markdown);
        markdown.push_str("\n\n");
    }
    markdown
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the injected client if any, else build a [`MistralClient`] from `config`.
fn resolve_client(config: &ConversionConfig) -> Result<Arc<dyn OcrClient>, Ocr2MdError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }
    Ok(Arc::new(MistralClient::from_config(config)?))
}

fn notify_stage(config: &ConversionConfig, stage: ConversionStage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

/// Fire the terminal callbacks and pass the result through.
fn finish(
    config: &ConversionConfig,
    result: Result<ConversionOutput, Ocr2MdError>,
) -> Result<ConversionOutput, Ocr2MdError> {
    match &result {
        Ok(output) => {
            notify_stage(config, ConversionStage::Complete);
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_complete(output.pages.len());
            }
            info!(
                "Conversion complete: {} pages, {}ms total",
                output.stats.total_pages, output.stats.total_duration_ms
            );
        }
        Err(e) => {
            warn!("Conversion failed: {}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_error(&e.to_string());
            }
        }
    }
    result
}

async fn run(source: PdfSource, config: &ConversionConfig) -> Result<ConversionOutput, Ocr2MdError> {
    let total_start = Instant::now();
    let client = resolve_client(config)?;

    // ── Step 1: Upload ───────────────────────────────────────────────────
    let upload_start = Instant::now();
    let uploaded = client.upload(&source.file_name, &source.bytes).await?;
    info!("Uploaded '{}' as {}", source.file_name, uploaded.id);

    let result = process_uploaded(client.as_ref(), &uploaded.id, &source, config, upload_start).await;

    // ── Optional clean-up of remote storage ──────────────────────────────
    if config.delete_after_processing {
        match client.delete_file(&uploaded.id).await {
            Ok(()) => debug!("Deleted remote file {}", uploaded.id),
            Err(e) => warn!("Could not delete remote file {}: {}", uploaded.id, e),
        }
    }

    let mut output = result?;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

async fn process_uploaded(
    client: &dyn OcrClient,
    file_id: &str,
    source: &PdfSource,
    config: &ConversionConfig,
    upload_start: Instant,
) -> Result<ConversionOutput, Ocr2MdError> {
    // ── Step 2: Signed URL ───────────────────────────────────────────────
    let signed = client.get_signed_url(file_id).await?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;
    debug!("Signed URL obtained for {}", file_id);

    // ── Step 3: OCR ──────────────────────────────────────────────────────
    notify_stage(config, ConversionStage::Processing);
    let request = ocr::build_request(&signed.url, config);
    let ocr_start = Instant::now();
    let response = client.process(&request).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    info!(
        "OCR returned {} pages in {}ms",
        response.pages.len(),
        ocr_duration_ms
    );

    if response.pages.is_empty() {
        warn!("OCR returned no pages for '{}'", source.file_name);
    }

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    notify_stage(config, ConversionStage::Generating);
    let total_pages = response.pages.len();
    let pages: Vec<PageResult> = response
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let result = build_page(i + 1, page, config);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_assembled(result.page_num, total_pages, result.markdown.len());
            }
            result
        })
        .collect();

    let total_images: usize = pages.iter().map(|p| p.image_count).sum();
    let described_images: usize = pages.iter().map(|p| p.described_images).sum();
    if config.include_image_descriptions {
        info!(
            "Image descriptions: {} images with annotations, {} markers replaced",
            total_images, described_images
        );
    }

    let markdown = assemble_document(&pages, &config.page_marker);

    let stats = ConversionStats {
        total_pages,
        total_images,
        described_images,
        source_bytes: source.bytes.len(),
        pages_processed: response.usage_info.map(|u| u.pages_processed),
        upload_duration_ms,
        ocr_duration_ms,
        total_duration_ms: 0,
    };

    Ok(ConversionOutput {
        markdown,
        pages,
        source_name: source.file_name.clone(),
        model: response.model,
        stats,
    })
}

fn build_page(page_num: usize, page: &OcrPage, config: &ConversionConfig) -> PageResult {
    if config.include_image_descriptions && !page.images.is_empty() {
        let described = annotate::describe_images(page_num, &page.markdown, &page.images);
        let remaining = annotate::count_markers(&described.markdown);
        if remaining > 0 {
            debug!(
                "Page {}: {} image marker(s) left without a description",
                page_num, remaining
            );
        }
        PageResult {
            page_num,
            markdown: described.markdown,
            image_count: page.images.len(),
            described_images: described.replaced,
            annotation_errors: described.errors,
        }
    } else {
        PageResult {
            page_num,
            markdown: page.markdown.clone(),
            image_count: page.images.len(),
            described_images: 0,
            annotation_errors: Vec::new(),
        }
    }
}
