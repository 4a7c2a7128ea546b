//! Wire types of the Mistral files and OCR endpoints.
//!
//! Only the fields this crate reads are required; everything else the service
//! returns is optional so new response fields never break deserialisation.

use serde::{Deserialize, Serialize};

/// Response of `POST /v1/files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub object: Option<String>,
    pub bytes: Option<u64>,
    pub created_at: Option<i64>,
    pub filename: Option<String>,
    pub purpose: Option<String>,
}

/// Response of `GET /v1/files/{id}/url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Body of `POST /v1/ocr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRequest {
    pub model: String,
    pub document: DocumentSource,
    /// Structured-output format applied to every extracted image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox_annotation_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_image_base64: Option<bool>,
}

/// Where the OCR service should fetch the document from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentSource {
    DocumentUrl { document_url: String },
    ImageUrl { image_url: String },
}

/// Response of `POST /v1/ocr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    pub pages: Vec<OcrPage>,
    pub model: Option<String>,
    pub usage_info: Option<UsageInfo>,
}

/// One page of OCR output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// 0-based index assigned by the service.
    pub index: usize,
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<OcrImage>,
    pub dimensions: Option<PageDimensions>,
}

/// An image the service cut out of a page.
///
/// The page Markdown references it as `![id](id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrImage {
    pub id: String,
    pub top_left_x: Option<u32>,
    pub top_left_y: Option<u32>,
    pub bottom_right_x: Option<u32>,
    pub bottom_right_y: Option<u32>,
    pub image_base64: Option<String>,
    /// JSON text matching the requested `bbox_annotation_format`.
    pub image_annotation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub dpi: u32,
    pub height: u32,
    pub width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub pages_processed: u32,
    pub doc_size_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_source_is_internally_tagged() {
        let v = serde_json::to_value(DocumentSource::DocumentUrl {
            document_url: "https://files.example/signed".into(),
        })
        .unwrap();
        assert_eq!(
            v,
            json!({"type": "document_url", "document_url": "https://files.example/signed"})
        );
    }

    #[test]
    fn request_omits_unset_options() {
        let req = OcrRequest {
            model: "mistral-ocr-latest".into(),
            document: DocumentSource::DocumentUrl {
                document_url: "u".into(),
            },
            bbox_annotation_format: None,
            include_image_base64: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("bbox_annotation_format").is_none());
        assert!(v.get("include_image_base64").is_none());
    }

    #[test]
    fn response_tolerates_missing_and_extra_fields() {
        let body = json!({
            "pages": [
                {"index": 0, "markdown": "# Title", "dimensions": {"dpi": 200, "height": 2200, "width": 1700}},
                {"index": 1, "markdown": "![img-0.jpeg](img-0.jpeg)", "images": [
                    {"id": "img-0.jpeg", "top_left_x": 10, "image_annotation": "{\"description\":\"A cat\"}",
                     "some_future_field": true}
                ]}
            ],
            "model": "mistral-ocr-2505",
            "document_annotation": null,
            "usage_info": {"pages_processed": 2, "doc_size_bytes": 1234}
        });
        let resp: OcrResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.pages.len(), 2);
        assert!(resp.pages[0].images.is_empty());
        assert_eq!(resp.pages[0].dimensions.unwrap().dpi, 200);
        assert_eq!(
            resp.pages[1].images[0].image_annotation.as_deref(),
            Some("{\"description\":\"A cat\"}")
        );
        assert_eq!(resp.usage_info.unwrap().pages_processed, 2);
    }

    #[test]
    fn uploaded_file_needs_only_id() {
        let f: UploadedFile = serde_json::from_value(json!({"id": "file-1"})).unwrap();
        assert_eq!(f.id, "file-1");
        assert!(f.filename.is_none());
    }
}
