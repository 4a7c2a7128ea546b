//! HTTP tests for the web UI, driven through `axum-test` with an in-process
//! OCR service double.
//!
//! Run with:
//!   cargo test --test server

#![cfg(feature = "server")]

mod common;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use common::{image, page, pdf_bytes, FailAt, FakeOcrClient};
use edgequake_ocr2md::server::handlers::{ErrorResponse, JobCreated};
use edgequake_ocr2md::server::jobs::{JobState, JobView};
use edgequake_ocr2md::server::{router, AppState};
use edgequake_ocr2md::ConversionConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_UPLOAD: usize = 1024 * 1024;

fn fake_client() -> FakeOcrClient {
    FakeOcrClient::with_pages(vec![
        page(
            0,
            "Figure: ![img-0.jpeg](img-0.jpeg)",
            vec![image("img-0.jpeg", Some(r#"{"description": "A cat"}"#))],
        ),
        page(1, "Page two", vec![]),
    ])
}

fn server_with(client: FakeOcrClient) -> TestServer {
    server_limited(client, 8, MAX_UPLOAD)
}

fn server_limited(client: FakeOcrClient, max_jobs: usize, max_upload: usize) -> TestServer {
    let config = ConversionConfig::builder()
        .client(Arc::new(client))
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let state = AppState::new(config, max_jobs).unwrap();
    TestServer::new(router(Arc::new(state), max_upload)).unwrap()
}

fn pdf_form(name: &str, include: Option<&str>) -> MultipartForm {
    let part = Part::bytes(pdf_bytes())
        .file_name(name)
        .mime_type("application/pdf");
    let form = MultipartForm::new().add_part("file", part);
    match include {
        Some(v) => form.add_text("include_image_descriptions", v),
        None => form,
    }
}

async fn wait_until_finished(server: &TestServer, id: Uuid) -> JobView {
    for _ in 0..200 {
        let view: JobView = server.get(&format!("/api/jobs/{id}")).await.json();
        if view.state == JobState::Succeeded || view.state == JobState::Failed {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish");
}

#[tokio::test]
async fn index_and_health() {
    let server = server_with(fake_client());

    let page = server.get("/").await;
    assert_eq!(page.status_code(), 200);
    assert!(page.text().contains("Mistral OCR: PDF to Markdown Converter"));

    let health = server.get("/health").await;
    assert_eq!(health.status_code(), 200);
    assert_eq!(health.text(), "ok");
}

#[tokio::test]
async fn synchronous_convert_returns_finished_job() {
    let server = server_with(fake_client());

    let response = server
        .post("/api/convert")
        .multipart(pdf_form("paper.pdf", Some("true")))
        .await;
    assert_eq!(response.status_code(), 200);

    let view: JobView = response.json();
    assert_eq!(view.state, JobState::Succeeded);
    assert_eq!(view.progress, 1.0);
    assert_eq!(view.status, "✓ Successfully processed 2 page(s)");
    assert_eq!(view.page_count, Some(2));
    assert_eq!(
        view.markdown,
        "<!-- Page 1 -->\n\nFigure: A cat\n\n<!-- Page 2 -->\n\nPage two\n\n"
    );
    assert_eq!(view.file_name, "paper.pdf");
    assert!(view.download_url.is_some());
}

#[tokio::test]
async fn unchecked_box_keeps_image_markers() {
    let server = server_with(fake_client());

    let view: JobView = server
        .post("/api/convert")
        .multipart(pdf_form("paper.pdf", Some("false")))
        .await
        .json();

    assert_eq!(view.state, JobState::Succeeded);
    assert!(view.markdown.contains("![img-0.jpeg](img-0.jpeg)"));
}

#[tokio::test]
async fn background_job_reports_progress_then_downloads() {
    let server = server_with(fake_client().with_process_delay(Duration::from_millis(200)));

    let created = server
        .post("/api/jobs")
        .multipart(pdf_form("slides.pdf", None))
        .await;
    assert_eq!(created.status_code(), 202);
    let created: JobCreated = created.json();
    let id = created.id;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let running: JobView = server.get(&format!("/api/jobs/{id}")).await.json();
    assert_eq!(running.state, JobState::Running);
    assert_eq!(running.progress, 0.3);
    assert_eq!(running.description, "Processing OCR...");
    assert!(running.download_url.is_none());

    let early = server.get(&format!("/api/jobs/{id}/download")).await;
    assert_eq!(early.status_code(), 409);
    let err: ErrorResponse = early.json();
    assert_eq!(err.code, "download_not_ready");

    let done = wait_until_finished(&server, id).await;
    assert_eq!(done.state, JobState::Succeeded);
    let url = done.download_url.expect("succeeded job offers a download");

    let download = server.get(&url).await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(
        download.header("content-type").to_str().unwrap(),
        "text/markdown; charset=utf-8"
    );
    assert_eq!(
        download.header("content-disposition").to_str().unwrap(),
        "attachment; filename=\"slides.md\""
    );
    assert_eq!(download.text(), done.markdown);
}

#[tokio::test]
async fn failed_conversion_is_reported_in_the_job() {
    let server = server_with(fake_client().failing_at(FailAt::Process));

    let view: JobView = server
        .post("/api/convert")
        .multipart(pdf_form("broken.pdf", None))
        .await
        .json();

    assert_eq!(view.state, JobState::Failed);
    assert!(
        view.status.starts_with("✗ Error processing PDF: "),
        "{}",
        view.status
    );
    assert!(view.markdown.is_empty());
    assert!(view.download_url.is_none());

    let download = server
        .get(&format!("/api/jobs/{}/download", view.id))
        .await;
    assert_eq!(download.status_code(), 409);
}

#[tokio::test]
async fn pdf_named_upload_with_bad_content_fails_in_job() {
    let server = server_with(fake_client());
    let part = Part::bytes(b"not a pdf at all".to_vec())
        .file_name("fake.pdf")
        .mime_type("application/pdf");

    let view: JobView = server
        .post("/api/convert")
        .multipart(MultipartForm::new().add_part("file", part))
        .await
        .json();

    assert_eq!(view.state, JobState::Failed);
    assert!(view.status.contains("fake.pdf"), "{}", view.status);
}

#[tokio::test]
async fn form_errors_are_bad_requests() {
    let server = server_with(fake_client());

    let missing = server
        .post("/api/jobs")
        .multipart(MultipartForm::new().add_text("include_image_descriptions", "true"))
        .await;
    assert_eq!(missing.status_code(), 400);
    let err: ErrorResponse = missing.json();
    assert_eq!(err.code, "invalid_form");
    assert_eq!(err.error, "No file provided");

    let text_file = Part::bytes(b"hello".to_vec())
        .file_name("notes.txt")
        .mime_type("text/plain");
    let wrong_type = server
        .post("/api/jobs")
        .multipart(MultipartForm::new().add_part("file", text_file))
        .await;
    assert_eq!(wrong_type.status_code(), 400);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let server = server_with(fake_client());
    let id = Uuid::new_v4();

    let view = server.get(&format!("/api/jobs/{id}")).await;
    assert_eq!(view.status_code(), 404);
    let err: ErrorResponse = view.json();
    assert_eq!(err.code, "job_not_found");

    let download = server.get(&format!("/api/jobs/{id}/download")).await;
    assert_eq!(download.status_code(), 404);
}

#[tokio::test]
async fn full_registry_keeps_jobs_in_flight() {
    let server = server_limited(
        fake_client().with_process_delay(Duration::from_millis(300)),
        1,
        MAX_UPLOAD,
    );

    let sync_convert = async {
        server
            .post("/api/convert")
            .multipart(pdf_form("first.pdf", None))
            .await
    };
    let background = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        server
            .post("/api/jobs")
            .multipart(pdf_form("second.pdf", None))
            .await
    };
    let (converted, created) = tokio::join!(sync_convert, background);

    assert_eq!(converted.status_code(), 200);
    let view: JobView = converted.json();
    assert_eq!(view.state, JobState::Succeeded);
    assert_eq!(view.file_name, "first.pdf");
    assert_eq!(view.page_count, Some(2));

    assert_eq!(created.status_code(), 202);
    let created: JobCreated = created.json();
    let done = wait_until_finished(&server, created.id).await;
    assert_eq!(done.state, JobState::Succeeded);
    assert_eq!(done.file_name, "second.pdf");
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let server = server_limited(fake_client(), 8, 1024);
    let mut big = pdf_bytes();
    big.resize(200 * 1024, b' ');
    let part = Part::bytes(big)
        .file_name("big.pdf")
        .mime_type("application/pdf");

    let response = server
        .post("/api/jobs")
        .multipart(MultipartForm::new().add_part("file", part))
        .await;

    assert_eq!(response.status_code(), 413);
    let err: ErrorResponse = response.json();
    assert_eq!(err.code, "payload_too_large");
    assert!(err.error.contains("1024 bytes"), "{}", err.error);
}
