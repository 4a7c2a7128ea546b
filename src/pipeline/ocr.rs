//! OCR request construction.
//!
//! When image descriptions are requested, the service is given a JSON-schema
//! response format for each image bounding box. It then returns one JSON
//! string per image (`image_annotation`) that [`super::annotate`] decodes.

use crate::client::{DocumentSource, OcrRequest};
use crate::config::ConversionConfig;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Field in the annotation schema that carries the description text.
pub const DESCRIPTION_FIELD: &str = "description";

/// Structured-output format asking for one detailed description per image.
pub static IMAGE_DESCRIPTION_FORMAT: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "ImageDescription",
            "strict": true,
            "schema": {
                "type": "object",
                "title": "ImageDescription",
                "additionalProperties": false,
                "required": [DESCRIPTION_FIELD],
                "properties": {
                    DESCRIPTION_FIELD: {
                        "type": "string",
                        "title": "Description",
                        "description": "A detailed description of the image content"
                    }
                }
            }
        }
    })
});

/// Build the OCR request for a document reachable at `document_url`.
pub fn build_request(document_url: &str, config: &ConversionConfig) -> OcrRequest {
    OcrRequest {
        model: config.model.clone(),
        document: DocumentSource::DocumentUrl {
            document_url: document_url.to_string(),
        },
        bbox_annotation_format: config
            .include_image_descriptions
            .then(|| IMAGE_DESCRIPTION_FORMAT.clone()),
        include_image_base64: None,
    }
}
