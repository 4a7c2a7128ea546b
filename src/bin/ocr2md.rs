//! CLI binary for edgequake-ocr2md.
//!
//! `ocr2md serve` starts the web UI; `ocr2md convert` runs a single
//! conversion from the terminal. Both map flags onto `ConversionConfig`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_ocr2md::server::{self, AppState};
use edgequake_ocr2md::{
    convert, convert_to_file, ConversionConfig, ConversionProgressCallback, ConversionStage,
    PageMarker, ProgressCallback, ServerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the four conversion stages as a percentage bar and logs each
/// assembled page above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:42.green/238}] {percent:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_message(ConversionStage::Uploading.description());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_progress(&self, fraction: f32, description: &str) {
        self.bar.set_position((fraction.clamp(0.0, 1.0) * 100.0).round() as u64);
        self.bar.set_message(description.to_string());
    }

    fn on_page_assembled(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{markdown_len:>6} chars")),
        ));
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Successfully processed {} page(s)",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }

    fn on_conversion_error(&self, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the web UI on http://localhost:7860
  ocr2md serve

  # Web UI inside a container
  ocr2md serve --host 0.0.0.0 --port 8080

  # Convert a file (Markdown on stdout)
  ocr2md convert document.pdf

  # Convert to a file, without image descriptions
  ocr2md convert --no-image-descriptions document.pdf -o document.md

  # Convert from URL
  ocr2md convert https://arxiv.org/pdf/1706.03762 -o attention.md

  # JSON output with per-page details and timings
  ocr2md convert --json document.pdf > output.json

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY     Mistral API key (required)
  MISTRAL_OCR_MODEL   Override the OCR model
  MISTRAL_BASE_URL    Override the API base URL
  OCR2MD_HOST         Interface for `serve` (default: localhost)
  OCR2MD_PORT         Port for `serve` (default: 7860)

  A `.env` file in the working directory is loaded at startup.
"#;

/// Convert PDF documents to Markdown with the Mistral OCR API.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "Convert PDF documents to Markdown with the Mistral OCR API",
    long_about = "Convert PDF documents (local files, URLs, or browser uploads) to Markdown \
using the Mistral OCR API. Images can be replaced by model-generated descriptions.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web UI.
    Serve(ServeArgs),
    /// Convert one PDF from the command line.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Interface to bind (use 0.0.0.0 in containers).
    #[arg(long, env = "OCR2MD_HOST", default_value = "localhost")]
    host: String,

    /// TCP port.
    #[arg(long, env = "OCR2MD_PORT", default_value_t = 7860)]
    port: u16,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "OCR2MD_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Conversion jobs kept in memory; the oldest finished job is evicted first.
    #[arg(long, env = "OCR2MD_MAX_JOBS", default_value_t = 64)]
    max_jobs: usize,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "OCR2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Keep image markers instead of replacing them with descriptions.
    #[arg(long)]
    no_image_descriptions: bool,

    /// Output structured JSON (ConversionOutput) instead of Markdown.
    #[arg(long, env = "OCR2MD_JSON", conflicts_with = "output")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds, for URL inputs.
    #[arg(long, env = "OCR2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Mistral API key.
    #[arg(long, global = true, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR model ID.
    #[arg(long, global = true, env = "MISTRAL_OCR_MODEL", default_value = "mistral-ocr-latest")]
    model: String,

    /// API base URL.
    #[arg(long, global = true, env = "MISTRAL_BASE_URL", default_value = "https://api.mistral.ai")]
    base_url: String,

    /// Page marker: comment, none, hr, or a custom line ({n} = page number).
    #[arg(long, global = true, env = "OCR2MD_SEPARATOR", default_value = "comment")]
    separator: String,

    /// Retries on rate limits, server errors and timeouts.
    #[arg(long, global = true, env = "OCR2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-request API timeout in seconds.
    #[arg(long, global = true, env = "OCR2MD_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Delete the uploaded PDF from Mistral storage after OCR.
    #[arg(long, global = true, env = "OCR2MD_DELETE_AFTER")]
    delete_after: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCR2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; real variables always win over it.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = match cli.command {
        Command::Convert(ref args) => !cli.common.quiet && !args.no_progress && !args.json,
        Command::Serve(_) => false,
    };
    let filter = if cli.common.verbose {
        "debug"
    } else if cli.common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(ref args) => run_serve(&cli.common, args).await,
        Command::Convert(ref args) => run_convert(&cli.common, args, show_progress).await,
    }
}

async fn run_serve(common: &CommonArgs, args: &ServeArgs) -> Result<()> {
    let config = build_config(common, None)?;
    config
        .resolve_api_key()
        .context("Cannot start the web UI without an API key")?;

    let server_config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        max_jobs: args.max_jobs,
    };

    let state = AppState::new(config, server_config.max_jobs)
        .context("Failed to initialise the OCR client")?;

    if !common.quiet {
        eprintln!(
            "{} Listening on {}",
            green("◆"),
            bold(&format!("http://{}", server_config.bind_addr()))
        );
    }

    server::serve(&server_config, state)
        .await
        .with_context(|| format!("Server on {} failed", server_config.bind_addr()))
}

async fn run_convert(common: &CommonArgs, args: &ConvertArgs, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut config = build_config(common, progress_cb)?;
    config.include_image_descriptions = !args.no_image_descriptions;
    config.download_timeout_secs = args.download_timeout;
    config
        .resolve_api_key()
        .context("Cannot convert without an API key")?;

    if let Some(ref output_path) = args.output {
        let stats = convert_to_file(&args.input, output_path, &config)
            .await
            .context("Conversion failed")?;

        if !common.quiet {
            eprintln!(
                "{}  {} page(s)  {} image(s) described  {}ms  →  {}",
                green("✔"),
                stats.total_pages,
                stats.described_images,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let output = convert(&args.input, &config)
        .await
        .context("Conversion failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    // The progress callback already printed its own summary.
    if !common.quiet && !show_progress {
        eprintln!(
            "{}  {}ms",
            output.status_message(),
            output.stats.total_duration_ms
        );
    }

    Ok(())
}

/// Map shared CLI args to `ConversionConfig`.
fn build_config(common: &CommonArgs, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .model(common.model.clone())
        .base_url(common.base_url.clone())
        .page_marker(PageMarker::parse(&common.separator))
        .max_retries(common.max_retries)
        .api_timeout_secs(common.api_timeout)
        .delete_after_processing(common.delete_after);

    if let Some(ref key) = common.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
