//! In-memory registry of conversion jobs.
//!
//! A job is created per uploaded PDF. The conversion updates it through
//! [`JobProgress`] while it runs, and the browser polls the job's
//! [`JobView`] to drive its progress bar. The registry is bounded: when it is
//! full the oldest finished job is evicted, and dropping a job deletes its
//! temporary Markdown file. Unfinished jobs are never evicted, so the table
//! may exceed its bound while more than `max_jobs` conversions are in flight.

use crate::output::ConversionOutput;
use crate::progress::ConversionProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempPath;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// The Markdown file offered for download.
#[derive(Debug)]
pub struct Download {
    pub file_name: String,
    pub path: TempPath,
}

/// What the browser sees when it polls a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: Uuid,
    pub file_name: String,
    pub state: JobState,
    pub progress: f32,
    pub description: String,
    /// Status line: success summary or error message.
    pub status: String,
    pub markdown: String,
    pub page_count: Option<usize>,
    pub download_url: Option<String>,
}

impl JobView {
    /// View of a job that finished with `output`.
    pub fn succeeded(
        id: Uuid,
        file_name: &str,
        output: &ConversionOutput,
        downloadable: bool,
    ) -> Self {
        Self {
            id,
            file_name: file_name.to_string(),
            state: JobState::Succeeded,
            progress: 1.0,
            description: COMPLETE.to_string(),
            status: output.status_message(),
            markdown: output.markdown.clone(),
            page_count: Some(output.pages.len()),
            download_url: downloadable.then(|| download_url(id)),
        }
    }

    /// View of a job that failed with the given status line.
    pub fn failed(id: Uuid, file_name: &str, status: String) -> Self {
        Self {
            id,
            file_name: file_name.to_string(),
            state: JobState::Failed,
            progress: 0.0,
            description: String::new(),
            status,
            markdown: String::new(),
            page_count: None,
            download_url: None,
        }
    }
}

fn download_url(id: Uuid) -> String {
    format!("/api/jobs/{id}/download")
}

const COMPLETE: &str = "Complete!";

/// Outcome of a download lookup.
#[derive(Debug)]
pub enum DownloadLookup {
    NotFound,
    NotReady,
    Ready { file_name: String, path: PathBuf },
}

#[derive(Debug)]
struct Job {
    seq: u64,
    file_name: String,
    state: JobState,
    progress: f32,
    description: String,
    status: String,
    markdown: String,
    page_count: Option<usize>,
    download: Option<Download>,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    next_seq: u64,
}

/// Bounded, thread-safe job table.
#[derive(Debug)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
    max_jobs: usize,
}

impl JobRegistry {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_jobs: max_jobs.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a job half-written in a
        // way that matters to readers, so poisoning is ignored.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new pending job for `file_name`.
    pub fn create(&self, file_name: &str) -> Uuid {
        let mut inner = self.lock();
        while inner.jobs.len() >= self.max_jobs {
            if !evict_one(&mut inner) {
                debug!(
                    "{} jobs in flight, registry temporarily above its limit of {}",
                    inner.jobs.len(),
                    self.max_jobs
                );
                break;
            }
        }

        let id = Uuid::new_v4();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            id,
            Job {
                seq,
                file_name: file_name.to_string(),
                state: JobState::Pending,
                progress: 0.0,
                description: "Waiting to start...".to_string(),
                status: String::new(),
                markdown: String::new(),
                page_count: None,
                download: None,
            },
        );
        id
    }

    /// Record a progress update; the job becomes `Running`.
    pub fn progress(&self, id: Uuid, fraction: f32, description: &str) {
        if let Some(job) = self.lock().jobs.get_mut(&id) {
            if job.state.is_finished() {
                return;
            }
            job.state = JobState::Running;
            job.progress = fraction.clamp(0.0, 1.0);
            job.description = description.to_string();
        }
    }

    /// Mark a job successful, attach its output and return its final view.
    pub fn succeed(
        &self,
        id: Uuid,
        output: &ConversionOutput,
        download: Option<Download>,
    ) -> JobView {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&id) else {
            warn!("Job {} vanished before it succeeded", id);
            return JobView::succeeded(id, &output.source_name, output, false);
        };
        job.state = JobState::Succeeded;
        job.progress = 1.0;
        job.description = COMPLETE.to_string();
        job.status = output.status_message();
        job.markdown = output.markdown.clone();
        job.page_count = Some(output.pages.len());
        job.download = download;
        view_of(id, job)
    }

    /// Mark a job failed with the given status line and return its final view.
    pub fn fail(&self, id: Uuid, status: String) -> JobView {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&id) else {
            warn!("Job {} vanished before it failed", id);
            return JobView::failed(id, "", status);
        };
        job.state = JobState::Failed;
        job.status = status;
        job.markdown.clear();
        job.download = None;
        view_of(id, job)
    }

    /// Snapshot of a job for the UI.
    pub fn view(&self, id: Uuid) -> Option<JobView> {
        self.lock().jobs.get(&id).map(|job| view_of(id, job))
    }

    /// Locate the downloadable Markdown file of a job.
    pub fn download(&self, id: Uuid) -> DownloadLookup {
        let inner = self.lock();
        match inner.jobs.get(&id) {
            None => DownloadLookup::NotFound,
            Some(Job {
                download: Some(d), ..
            }) => DownloadLookup::Ready {
                file_name: d.file_name.clone(),
                path: d.path.to_path_buf(),
            },
            Some(_) => DownloadLookup::NotReady,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn view_of(id: Uuid, job: &Job) -> JobView {
    JobView {
        id,
        file_name: job.file_name.clone(),
        state: job.state,
        progress: job.progress,
        description: job.description.clone(),
        status: job.status.clone(),
        markdown: job.markdown.clone(),
        page_count: job.page_count,
        download_url: job.download.as_ref().map(|_| download_url(id)),
    }
}

/// Evict the oldest finished job; `false` when every job is still in flight.
fn evict_one(inner: &mut Inner) -> bool {
    let victim = inner
        .jobs
        .iter()
        .filter(|(_, j)| j.state.is_finished())
        .min_by_key(|(_, j)| j.seq)
        .map(|(id, _)| *id);

    match victim {
        Some(id) => {
            debug!("Evicting job {}", id);
            inner.jobs.remove(&id);
            true
        }
        None => false,
    }
}

/// Progress callback that writes into a job of the registry.
pub struct JobProgress {
    registry: Arc<JobRegistry>,
    id: Uuid,
}

impl JobProgress {
    pub fn new(registry: Arc<JobRegistry>, id: Uuid) -> Self {
        Self { registry, id }
    }
}

impl ConversionProgressCallback for JobProgress {
    fn on_progress(&self, fraction: f32, description: &str) {
        self.registry.progress(self.id, fraction, description);
    }
}
