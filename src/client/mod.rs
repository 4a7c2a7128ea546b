//! OCR service client.
//!
//! [`OcrClient`] is the seam between the conversion pipeline and the vendor
//! API: the pipeline only ever calls the four trait methods, so tests and
//! callers with custom middleware can inject their own implementation through
//! [`crate::config::ConversionConfigBuilder::client`].
//!
//! [`MistralClient`] is the production implementation on top of `reqwest`.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx responses, timeouts and connection failures are transient
//! (see [`Ocr2MdError::is_transient`]). Each request is retried up to
//! `max_retries` times; retry `n` waits `retry_backoff_ms * 2^(n-1)`, so with
//! 500 ms base and 3 retries the waits are 500 ms → 1 s → 2 s. Authentication
//! failures and other 4xx responses are returned immediately.

pub mod types;

use crate::config::ConversionConfig;
use crate::error::Ocr2MdError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

pub use types::{
    DocumentSource, OcrImage, OcrPage, OcrRequest, OcrResponse, PageDimensions, SignedUrl,
    UploadedFile, UsageInfo,
};

/// Longest slice of an error body kept in [`Ocr2MdError::ApiError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Operations the pipeline needs from the OCR service.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Upload a document to the service's file storage with purpose `ocr`.
    async fn upload(&self, file_name: &str, content: &[u8]) -> Result<UploadedFile, Ocr2MdError>;

    /// Obtain a time-limited URL the OCR endpoint can fetch the file from.
    async fn get_signed_url(&self, file_id: &str) -> Result<SignedUrl, Ocr2MdError>;

    /// Run OCR on the document referenced by `request`.
    async fn process(&self, request: &OcrRequest) -> Result<OcrResponse, Ocr2MdError>;

    /// Remove an uploaded file from remote storage.
    async fn delete_file(&self, file_id: &str) -> Result<(), Ocr2MdError>;
}

/// `reqwest`-backed client for the Mistral API.
pub struct MistralClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    signed_url_expiry_hours: u32,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl fmt::Debug for MistralClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MistralClient {
    /// Build a client from the API key, endpoint and retry settings in `config`.
    ///
    /// Fails with [`Ocr2MdError::MissingApiKey`] when neither
    /// `config.api_key` nor `MISTRAL_API_KEY` is set.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Ocr2MdError> {
        let api_key = config.resolve_api_key()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| Ocr2MdError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            signed_url_expiry_hours: config.signed_url_expiry_hours,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    /// Send the request produced by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt because multipart bodies cannot be
    /// cloned.
    async fn send_with_retry<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> Result<Response, Ocr2MdError>
    where
        F: Fn() -> Result<RequestBuilder, Ocr2MdError>,
    {
        let mut last_err: Option<Ocr2MdError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self
                    .retry_backoff_ms
                    .saturating_mul(1u64 << (attempt - 1).min(16));
                warn!(
                    "{}: retry {}/{} after {}ms",
                    operation, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let request = build()?.bearer_auth(&self.api_key);
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!("{}: HTTP {} on attempt {}", operation, status, attempt + 1);
                        return Ok(response);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = self.status_error(operation, status, body);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    warn!("{}: attempt {} failed: {}", operation, attempt + 1, err);
                    last_err = Some(err);
                }
                Err(e) if e.is_builder() => {
                    return Err(Ocr2MdError::Internal(format!(
                        "Failed to build {operation} request: {e}"
                    )));
                }
                Err(e) => {
                    let err = if e.is_timeout() {
                        Ocr2MdError::ApiTimeout {
                            operation,
                            secs: self.timeout_secs,
                        }
                    } else {
                        Ocr2MdError::Transport {
                            operation,
                            reason: e.to_string(),
                        }
                    };
                    warn!("{}: attempt {} failed: {}", operation, attempt + 1, err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Ocr2MdError::Internal(format!("{operation}: no attempt was made"))))
    }

    fn status_error(&self, operation: &'static str, status: StatusCode, body: String) -> Ocr2MdError {
        let message: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ocr2MdError::AuthError {
                detail: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            },
            StatusCode::TOO_MANY_REQUESTS => Ocr2MdError::RateLimitExceeded {
                retries: self.max_retries,
            },
            _ => Ocr2MdError::ApiError {
                operation,
                status: status.as_u16(),
                message,
            },
        }
    }
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, Ocr2MdError> {
    response
        .json::<T>()
        .await
        .map_err(|e| Ocr2MdError::InvalidResponse {
            operation,
            detail: e.to_string(),
        })
}

#[async_trait]
impl OcrClient for MistralClient {
    async fn upload(&self, file_name: &str, content: &[u8]) -> Result<UploadedFile, Ocr2MdError> {
        let url = self.url("files");
        debug!("Uploading '{}' ({} bytes)", file_name, content.len());

        let response = self
            .send_with_retry("upload", || {
                let part = Part::bytes(content.to_vec())
                    .file_name(file_name.to_string())
                    .mime_str("application/pdf")
                    .map_err(|e| Ocr2MdError::Internal(format!("multipart: {e}")))?;
                let form = Form::new().text("purpose", "ocr").part("file", part);
                Ok(self.http.post(&url).multipart(form))
            })
            .await?;

        decode("upload", response).await
    }

    async fn get_signed_url(&self, file_id: &str) -> Result<SignedUrl, Ocr2MdError> {
        let url = self.url(&format!("files/{file_id}/url"));
        let expiry = self.signed_url_expiry_hours;

        let response = self
            .send_with_retry("get_signed_url", || {
                Ok(self.http.get(&url).query(&[("expiry", expiry)]))
            })
            .await?;

        decode("get_signed_url", response).await
    }

    async fn process(&self, request: &OcrRequest) -> Result<OcrResponse, Ocr2MdError> {
        let url = self.url("ocr");

        let response = self
            .send_with_retry("ocr", || Ok(self.http.post(&url).json(request)))
            .await?;

        decode("ocr", response).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), Ocr2MdError> {
        let url = self.url(&format!("files/{file_id}"));
        self.send_with_retry("delete_file", || Ok(self.http.delete(&url)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard, max_retries: u32) -> MistralClient {
        let config = ConversionConfig::builder()
            .api_key("sk-test")
            .base_url(server.url())
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        MistralClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn upload_sends_multipart_with_purpose() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/files")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="purpose""#.into()),
                Matcher::Regex(r#"filename="report.pdf""#.into()),
                Matcher::Regex("ocr".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"file-123","object":"file","bytes":8,"filename":"report.pdf","purpose":"ocr"}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let uploaded = client.upload("report.pdf", b"%PDF-1.4").await.unwrap();

        assert_eq!(uploaded.id, "file-123");
        assert_eq!(uploaded.purpose.as_deref(), Some("ocr"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn signed_url_passes_expiry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/files/file-123/url".into()))
            .match_query(Matcher::UrlEncoded("expiry".into(), "24".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"url":"https://storage.example/signed?sig=abc"}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let signed = client.get_signed_url("file-123").await.unwrap();

        assert_eq!(signed.url, "https://storage.example/signed?sig=abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn process_posts_json_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/ocr")
            .match_body(Matcher::PartialJson(json!({
                "model": "mistral-ocr-latest",
                "document": {"type": "document_url", "document_url": "https://signed"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "pages": [{"index": 0, "markdown": "Hello", "images": []}],
                    "model": "mistral-ocr-latest",
                    "usage_info": {"pages_processed": 1}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let request = OcrRequest {
            model: "mistral-ocr-latest".into(),
            document: DocumentSource::DocumentUrl {
                document_url: "https://signed".into(),
            },
            bbox_annotation_format: None,
            include_image_base64: None,
        };
        let response = client.process(&request).await.unwrap();

        assert_eq!(response.pages.len(), 1);
        assert_eq!(response.pages[0].markdown, "Hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/files")
            .with_status(401)
            .with_body(r#"{"message":"Unauthorized"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let err = client.upload("a.pdf", b"%PDF").await.unwrap_err();

        assert!(matches!(err, Ocr2MdError::AuthError { .. }), "got {err:?}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/ocr")
            .with_status(503)
            .with_body("upstream overloaded")
            .expect(3)
            .create_async()
            .await;

        let client = client_for(&server, 2);
        let request = OcrRequest {
            model: "m".into(),
            document: DocumentSource::DocumentUrl {
                document_url: "u".into(),
            },
            bbox_annotation_format: None,
            include_image_base64: None,
        };
        let err = client.process(&request).await.unwrap_err();

        match err {
            Ocr2MdError::ApiError {
                operation,
                status,
                message,
            } => {
                assert_eq!(operation, "ocr");
                assert_eq!(status, 503);
                assert_eq!(message, "upstream overloaded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn persistent_rate_limit_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/files/f/url".into()))
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server, 1);
        let err = client.get_signed_url("f").await.unwrap_err();

        assert!(matches!(err, Ocr2MdError::RateLimitExceeded { retries: 1 }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/ocr")
            .with_status(422)
            .with_body("invalid document_url")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let request = OcrRequest {
            model: "m".into(),
            document: DocumentSource::DocumentUrl {
                document_url: "u".into(),
            },
            bbox_annotation_format: None,
            include_image_base64: None,
        };
        let err = client.process(&request).await.unwrap_err();

        assert!(matches!(err, Ocr2MdError::ApiError { status: 422, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/files")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let err = client.upload("a.pdf", b"%PDF").await.unwrap_err();

        assert!(matches!(
            err,
            Ocr2MdError::InvalidResponse {
                operation: "upload",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn delete_file_hits_file_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/files/file-9")
            .with_status(200)
            .with_body(r#"{"id":"file-9","object":"file","deleted":true}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        client.delete_file("file-9").await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn missing_key_fails_construction() {
        let config = ConversionConfig::builder().api_key("   ").build().unwrap();
        // Only meaningful when the environment does not provide a key either.
        if std::env::var(crate::config::API_KEY_ENV).is_err() {
            let err = MistralClient::from_config(&config).unwrap_err();
            assert!(matches!(err, Ocr2MdError::MissingApiKey));
        }
    }

    #[test]
    fn debug_redacts_key() {
        let config = ConversionConfig::builder().api_key("sk-secret").build().unwrap();
        let client = MistralClient::from_config(&config).unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }
}
