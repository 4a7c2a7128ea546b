//! In-process OCR service double shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_ocr2md::client::{
    OcrClient, OcrImage, OcrPage, OcrRequest, OcrResponse, SignedUrl, UploadedFile, UsageInfo,
};
use edgequake_ocr2md::{ConversionProgressCallback, Ocr2MdError};
use std::sync::Mutex;
use std::time::Duration;

pub const SIGNED_URL: &str = "https://files.example.test/signed/file-1";

/// Minimal bytes that pass the `%PDF` check.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n".to_vec()
}

pub fn page(index: usize, markdown: &str, images: Vec<OcrImage>) -> OcrPage {
    OcrPage {
        index,
        markdown: markdown.to_string(),
        images,
        dimensions: None,
    }
}

pub fn image(id: &str, annotation: Option<&str>) -> OcrImage {
    OcrImage {
        id: id.to_string(),
        top_left_x: None,
        top_left_y: None,
        bottom_right_x: None,
        bottom_right_y: None,
        image_base64: None,
        image_annotation: annotation.map(str::to_string),
    }
}

/// Which call of [`FakeOcrClient`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Upload,
    SignedUrl,
    Process,
    Delete,
}

/// Records every call and answers with canned pages.
#[derive(Default)]
pub struct FakeOcrClient {
    pages: Vec<OcrPage>,
    fail_at: Option<FailAt>,
    process_delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<OcrRequest>>,
}

impl FakeOcrClient {
    pub fn with_pages(pages: Vec<OcrPage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn failing_at(mut self, at: FailAt) -> Self {
        self.fail_at = Some(at);
        self
    }

    pub fn with_process_delay(mut self, delay: Duration) -> Self {
        self.process_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<OcrRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, at: FailAt, operation: &'static str) -> Result<(), Ocr2MdError> {
        if self.fail_at == Some(at) {
            return Err(Ocr2MdError::ApiError {
                operation,
                status: 500,
                message: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OcrClient for FakeOcrClient {
    async fn upload(&self, file_name: &str, content: &[u8]) -> Result<UploadedFile, Ocr2MdError> {
        self.record(format!("upload {} {}", file_name, content.len()));
        self.check(FailAt::Upload, "upload")?;
        Ok(UploadedFile {
            id: "file-1".to_string(),
            object: Some("file".to_string()),
            bytes: Some(content.len() as u64),
            created_at: None,
            filename: Some(file_name.to_string()),
            purpose: Some("ocr".to_string()),
        })
    }

    async fn get_signed_url(&self, file_id: &str) -> Result<SignedUrl, Ocr2MdError> {
        self.record(format!("sign {file_id}"));
        self.check(FailAt::SignedUrl, "get_signed_url")?;
        Ok(SignedUrl {
            url: SIGNED_URL.to_string(),
        })
    }

    async fn process(&self, request: &OcrRequest) -> Result<OcrResponse, Ocr2MdError> {
        self.record("process".to_string());
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.process_delay {
            tokio::time::sleep(delay).await;
        }
        self.check(FailAt::Process, "ocr")?;
        Ok(OcrResponse {
            pages: self.pages.clone(),
            model: Some(request.model.clone()),
            usage_info: Some(UsageInfo {
                pages_processed: self.pages.len() as u32,
                doc_size_bytes: None,
            }),
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), Ocr2MdError> {
        self.record(format!("delete {file_id}"));
        self.check(FailAt::Delete, "delete_file")
    }
}

/// Progress callback that logs every event as a line of text.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConversionProgressCallback for RecordingProgress {
    fn on_progress(&self, fraction: f32, description: &str) {
        self.push(format!("{fraction:.1} {description}"));
    }

    fn on_page_assembled(&self, page_num: usize, total_pages: usize, _markdown_len: usize) {
        self.push(format!("page {page_num}/{total_pages}"));
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.push(format!("complete {total_pages}"));
    }

    fn on_conversion_error(&self, _error: &str) {
        self.push("error".to_string());
    }
}
