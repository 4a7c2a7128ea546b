//! HTTP handlers.
//!
//! Conversion failures are not HTTP errors: they end up in the job as a
//! `failed` state with the error in its status line. [`ApiError`] is reserved
//! for problems with the request itself.

use super::jobs::{Download, DownloadLookup, JobProgress, JobView};
use super::page::INDEX_HTML;
use super::AppState;
use crate::convert::{convert_from_bytes, write_temp_markdown};
use crate::output::status_for_error;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// JSON body of every HTTP-level error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code
    pub code: String,
}

/// Request-level error rendered as `{error, code}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_form", message)
    }

    pub fn job_not_found(id: Uuid) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "job_not_found",
            format!("No job with id {id}"),
        )
    }

    pub fn not_ready(id: Uuid) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "download_not_ready",
            format!("Job {id} has no Markdown to download"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn payload_too_large(limit: UploadLimit) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            format!("Upload exceeds the maximum size of {limit}"),
        )
    }

    /// Map a multipart read failure; a body over the size limit becomes 413.
    fn multipart(err: MultipartError, limit: UploadLimit) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::payload_too_large(limit)
        } else {
            Self::bad_request(format!("Failed to read multipart: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, "{}", self.message);
        } else {
            warn!(code = self.code, "{}", self.message);
        }
        let body = ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Largest PDF the server accepts, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimit(pub usize);

impl std::fmt::Display for UploadLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const MB: usize = 1024 * 1024;
        if self.0 >= MB && self.0 % MB == 0 {
            write!(f, "{} MB", self.0 / MB)
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// Response of `POST /api/jobs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobCreated {
    pub id: Uuid,
}

/// A decoded upload form.
#[derive(Debug)]
pub struct ConversionForm {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// `None` when the form did not say; the server default applies.
    pub include_image_descriptions: Option<bool>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> &'static str {
    "ok"
}

/// `POST /api/jobs`: start a conversion in the background.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Extension(limit): Extension<UploadLimit>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<JobCreated>), ApiError> {
    let form = read_form(multipart, limit).await?;
    let id = state.jobs.create(&form.file_name);
    info!(job = %id, file = %form.file_name, bytes = form.bytes.len(), "Job accepted");

    tokio::spawn(run_job(Arc::clone(&state), id, form));

    Ok((StatusCode::ACCEPTED, Json(JobCreated { id })))
}

/// `POST /api/convert`: convert and answer with the finished job.
pub async fn convert_now(
    State(state): State<Arc<AppState>>,
    Extension(limit): Extension<UploadLimit>,
    multipart: Multipart,
) -> Result<Json<JobView>, ApiError> {
    let form = read_form(multipart, limit).await?;
    let id = state.jobs.create(&form.file_name);
    Ok(Json(run_job(Arc::clone(&state), id, form).await))
}

/// `GET /api/jobs/{id}`
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    state
        .jobs
        .view(id)
        .map(Json)
        .ok_or_else(|| ApiError::job_not_found(id))
}

/// `GET /api/jobs/{id}/download`
pub async fn download_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (file_name, path) = match state.jobs.download(id) {
        DownloadLookup::Ready { file_name, path } => (file_name, path),
        DownloadLookup::NotReady => return Err(ApiError::not_ready(id)),
        DownloadLookup::NotFound => return Err(ApiError::job_not_found(id)),
    };

    // The job may be evicted between the lookup and the read.
    let body = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ApiError::job_not_found(id),
        _ => ApiError::internal(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_file_name(&file_name)
    );
    let headers = [
        (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, body).into_response())
}

/// Run one conversion, record its outcome in the registry and return the
/// finished view.
async fn run_job(state: Arc<AppState>, id: Uuid, form: ConversionForm) -> JobView {
    let mut config = state.config.clone();
    if let Some(include) = form.include_image_descriptions {
        config.include_image_descriptions = include;
    }
    config.client = Some(Arc::clone(&state.client));
    config.progress_callback = Some(Arc::new(JobProgress::new(Arc::clone(&state.jobs), id)));

    match convert_from_bytes(&form.file_name, form.bytes, &config).await {
        Ok(output) => {
            let download = match write_temp_markdown(&output.markdown).await {
                Ok(path) => Some(Download {
                    file_name: output.markdown_file_name(),
                    path,
                }),
                Err(e) => {
                    warn!(job = %id, "Markdown file not available for download: {}", e);
                    None
                }
            };
            info!(job = %id, pages = output.pages.len(), "Job succeeded");
            state.jobs.succeed(id, &output, download)
        }
        Err(e) => {
            warn!(job = %id, "Job failed: {}", e);
            state.jobs.fail(id, status_for_error(&e))
        }
    }
}

/// Decode the `file` and `include_image_descriptions` fields.
pub async fn read_form(
    mut multipart: Multipart,
    limit: UploadLimit,
) -> Result<ConversionForm, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut include_image_descriptions = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::multipart(e, limit))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();
        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(ApiError::bad_request(
                        "Multiple file fields are not allowed; send exactly one field named 'file'",
                    ));
                }
                let name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "document.pdf".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::multipart(e, limit))?;
                file = Some((name, data.to_vec()));
            }
            "include_image_descriptions" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::multipart(e, limit))?;
                include_image_descriptions = Some(parse_flag(&value));
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    if !looks_like_pdf(&file_name, &bytes) {
        return Err(ApiError::bad_request(format!(
            "'{}' is not a PDF; upload a .pdf file",
            file_name
        )));
    }

    Ok(ConversionForm {
        file_name,
        bytes,
        include_image_descriptions,
    })
}

/// HTML checkbox and JSON-ish truthy values.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}

fn looks_like_pdf(file_name: &str, bytes: &[u8]) -> bool {
    file_name.to_ascii_lowercase().ends_with(".pdf") || bytes.starts_with(b"%PDF")
}

/// Keep a download name representable in a quoted header value.
fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}
