//! Image-description substitution.
//!
//! With image annotations enabled, the OCR service returns, for every image it
//! cut out of a page, a JSON string such as `{"description": "A bar chart…"}`.
//! The page Markdown still references the image as `![img-0.jpeg](img-0.jpeg)`,
//! which is useless once the Markdown leaves the service. This stage swaps each
//! such marker for the description text so the output stays self-contained.

use crate::client::OcrImage;
use crate::error::AnnotationError;
use crate::pipeline::ocr::DESCRIPTION_FIELD;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use tracing::{debug, warn};

/// `![alt](target)` on a single line, non-greedy; group 1 is the target.
static RE_IMAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());

/// Result of substituting descriptions into one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribedPage {
    pub markdown: String,
    /// Number of image markers replaced by a description.
    pub replaced: usize,
    /// Annotations that could not be decoded; their markers are left in place.
    pub errors: Vec<AnnotationError>,
}

/// Replace image markers in `markdown` with the descriptions carried by `images`.
///
/// Images are visited in order. An image contributes only when its annotation
/// decodes to a JSON object with a non-empty `description` string. The marker
/// replaced is the one pointing at the image's `id`; when the service emitted
/// no such marker, the first marker still present on the page is used instead.
pub fn describe_images(page_num: usize, markdown: &str, images: &[OcrImage]) -> DescribedPage {
    let mut page = DescribedPage {
        markdown: markdown.to_string(),
        ..Default::default()
    };

    for (img_idx, image) in images.iter().enumerate() {
        let annotation = match image.image_annotation.as_deref() {
            Some(a) if !a.trim().is_empty() => a,
            _ => continue,
        };

        let description = match parse_description(annotation) {
            Ok(Some(d)) => d,
            Ok(None) => continue,
            Err(detail) => {
                let err = AnnotationError::Malformed {
                    page: page_num,
                    image: img_idx,
                    detail,
                };
                warn!("{}", err);
                page.errors.push(err);
                continue;
            }
        };

        if let Some(range) = find_marker(&page.markdown, &image.id) {
            debug!(
                "Page {}, image {}: replacing image marker with description ({} chars)",
                page_num,
                img_idx,
                description.len()
            );
            // `replace_range` inserts the text verbatim, so a `$` in the
            // description is never read as a capture reference.
            page.markdown.replace_range(range, &description);
            page.replaced += 1;
        }
    }

    page
}

/// Decode an annotation; `Ok(None)` when it is valid JSON without a usable description.
fn parse_description(annotation: &str) -> Result<Option<String>, String> {
    let value: serde_json::Value = serde_json::from_str(annotation).map_err(|e| e.to_string())?;
    Ok(value
        .get(DESCRIPTION_FIELD)
        .and_then(|v| v.as_str())
        .filter(|d| !d.is_empty())
        .map(str::to_string))
}

/// Byte range of the marker to replace for `image_id`.
fn find_marker(markdown: &str, image_id: &str) -> Option<Range<usize>> {
    let mut first: Option<Range<usize>> = None;
    for caps in RE_IMAGE_MARKER.captures_iter(markdown) {
        let Some(whole) = caps.get(0) else { continue };
        if caps.get(1).map(|t| t.as_str().trim()) == Some(image_id) {
            return Some(whole.range());
        }
        if first.is_none() {
            first = Some(whole.range());
        }
    }
    first
}

/// Count image markers remaining in `markdown`.
pub fn count_markers(markdown: &str) -> usize {
    RE_IMAGE_MARKER.find_iter(markdown).count()
}
