//! Browser front-end.
//!
//! A single HTML page posts the PDF to `/api/jobs`, then polls the job until
//! the conversion finishes. Conversions run on the tokio runtime in the
//! background; their progress lands in the [`jobs::JobRegistry`].
//!
//! ```text
//! GET  /                         upload page
//! GET  /health                   liveness probe
//! POST /api/jobs                 start a conversion, 202 {id}
//! POST /api/convert              convert and wait, 200 JobView
//! GET  /api/jobs/{id}            JobView
//! GET  /api/jobs/{id}/download   Markdown attachment
//! ```

pub mod handlers;
pub mod jobs;
mod page;

use crate::client::{MistralClient, OcrClient};
use crate::config::{ConversionConfig, ServerConfig};
use crate::error::Ocr2MdError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Router};
use handlers::UploadLimit;
use jobs::JobRegistry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Room for the multipart envelope around the PDF itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state of the web server.
pub struct AppState {
    /// Base settings; each job copies it and applies the form's options.
    pub config: ConversionConfig,
    pub client: Arc<dyn OcrClient>,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    /// Build the state, creating a [`MistralClient`] unless `config` already
    /// carries a client.
    ///
    /// Fails with [`Ocr2MdError::MissingApiKey`] when no key is available, so
    /// a misconfigured server refuses to start instead of failing every job.
    pub fn new(config: ConversionConfig, max_jobs: usize) -> Result<Self, Ocr2MdError> {
        let client: Arc<dyn OcrClient> = match config.client {
            Some(ref client) => Arc::clone(client),
            None => Arc::new(MistralClient::from_config(&config)?),
        };
        Ok(Self {
            config,
            client,
            jobs: Arc::new(JobRegistry::new(max_jobs)),
        })
    }
}

/// Assemble the router with tracing and upload-size limits.
///
/// An upload over the limit is answered with 413 `payload_too_large`.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let body_limit = max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/jobs", post(handlers::create_job))
        .route("/api/convert", post(handlers::convert_now))
        .route("/api/jobs/{id}", get(handlers::get_job))
        .route("/api/jobs/{id}/download", get(handlers::download_job))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(UploadLimit(max_upload_bytes)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `server.bind_addr()` and serve until Ctrl+C or SIGTERM.
pub async fn serve(server: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let addr = server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        model = %state.config.model,
        max_upload_mb = server.max_upload_bytes / 1024 / 1024,
        max_jobs = server.max_jobs,
        "Server ready and accepting connections"
    );

    let app = router(Arc::new(state), server.max_upload_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }

    info!("Shutting down gracefully...");
}
