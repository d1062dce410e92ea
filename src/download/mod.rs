// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded concurrent download of selected tree nodes.
//!
//! ```text
//! run(files, destination)
//!   1. create ancestor dirs, sequentially, parents first
//!   2. dispatcher --flume bounded--> worker 1..N (JoinSet)
//!                                       |  temp file beside target
//!                                       |  stream content, persist
//!                                       |  retry NetworkError/RateLimited
//!                                       v
//!      oneshot per task <-- outcome     events --flume--> collector
//!                                                         BatchProgress
//!   3. report: one entry per file, terminal state + history
//! ```
//!
//! Task states:
//!
//! ```text
//! Pending -> InFlight -> Succeeded
//!                     -> Retrying -> InFlight ...  (up to max_attempts)
//!                     -> FailedFatal
//! ```
//!
//! Cancellation leaves undispatched tasks `Pending`; in-flight tasks finish.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, RemoteError};
use crate::remote::{RetryDecision, RetryPolicy, Sink};
use crate::tree::{TreeNode, ancestor_dirs, normalize_path};

/// Where file bytes come from.
pub trait ContentSource: Send + Sync {
    /// Writes the content of `path` into `sink`, returning bytes written.
    fn stream_into<'a>(
        &'a self,
        path: &'a str,
        sink: &'a mut Sink<'_>,
    ) -> BoxFuture<'a, Result<u64, RemoteError>>;
}

/// Lifecycle state of one download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskState {
    Pending,
    InFlight,
    Retrying,
    Succeeded,
    FailedFatal,
}

impl TaskState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedFatal)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Aggregate counts, reported after every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub retrying: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchProgress {
    fn tally(states: &[TaskState]) -> Self {
        let mut progress = Self {
            total: states.len(),
            ..Self::default()
        };
        for state in states {
            match state {
                TaskState::Pending => progress.pending += 1,
                TaskState::InFlight => progress.in_flight += 1,
                TaskState::Retrying => progress.retrying += 1,
                TaskState::Succeeded => progress.succeeded += 1,
                TaskState::FailedFatal => progress.failed += 1,
            }
        }
        progress
    }

    #[must_use]
    pub const fn finished(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Observer of scheduler transitions. Called from a single collector.
pub trait DownloadProgress: Send + Sync {
    fn on_transition(&self, path: &str, state: TaskState, progress: &BatchProgress);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_transition(&self, _path: &str, _state: TaskState, _progress: &BatchProgress) {}
}

/// Final outcome of one requested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadEntry {
    pub path: String,
    pub destination: PathBuf,
    pub state: TaskState,
    pub attempts: u32,
    pub bytes: u64,
    pub error: Option<ErrorKind>,
    pub message: Option<String>,
    /// Every state the task passed through, starting with `Pending`.
    pub history: Vec<TaskState>,
}

/// Per-file outcome of a batch. Batches never fail as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub entries: Vec<DownloadEntry>,
    pub cancelled: bool,
}

impl DownloadReport {
    #[must_use]
    pub fn progress(&self) -> BatchProgress {
        let states: Vec<_> = self.entries.iter().map(|e| e.state).collect();
        BatchProgress::tally(&states)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DownloadEntry> {
        self.entries.iter().filter(|e| e.state == TaskState::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DownloadEntry> {
        self.entries.iter().filter(|e| e.state == TaskState::FailedFatal)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DownloadEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.state == TaskState::Succeeded)
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Builder)]
pub struct DownloadScheduler {
    #[builder(default = 4)]
    workers: usize,
    /// Total attempts per task, first one included.
    #[builder(default = 3)]
    max_attempts: u32,
    #[builder(default)]
    retry: RetryPolicy,
}

impl Default for DownloadScheduler {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct Job {
    index: usize,
    path: String,
    destination: PathBuf,
    result: oneshot::Sender<Outcome>,
}

struct Event {
    index: usize,
    state: TaskState,
}

#[derive(Debug)]
struct Outcome {
    state: TaskState,
    attempts: u32,
    bytes: u64,
    error: Option<RemoteError>,
}

#[derive(Clone)]
struct WorkerContext {
    source: Arc<dyn ContentSource>,
    events: flume::Sender<Event>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    max_attempts: u32,
}

impl DownloadScheduler {
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Downloads every file node under `destination`.
    ///
    /// Directory nodes are created but not reported. Duplicate paths are
    /// downloaded once.
    pub async fn run(
        &self,
        source: Arc<dyn ContentSource>,
        nodes: &[TreeNode],
        destination: &Path,
        cancel: &CancellationToken,
        progress: &dyn DownloadProgress,
    ) -> DownloadReport {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut directories = Vec::new();
        for node in nodes {
            if node.is_dir() {
                directories.push(node.path.as_str());
            } else if seen.insert(node.path.as_str()) {
                entries.push(DownloadEntry {
                    path: node.path.clone(),
                    destination: destination.join(&node.path),
                    state: TaskState::Pending,
                    attempts: 0,
                    bytes: 0,
                    error: None,
                    message: None,
                    history: vec![TaskState::Pending],
                });
            }
        }

        // Every directory exists before any worker starts writing.
        let mut dirs = ancestor_dirs(entries.iter().map(|e| e.path.as_str()));
        for dir in directories {
            if !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_string());
            }
        }
        create_directories(destination, &dirs).await;

        info!(
            files = entries.len(),
            workers = self.workers,
            destination = %destination.display(),
            "starting download batch"
        );

        let (job_tx, job_rx) = flume::bounded::<Job>(self.workers.max(1));
        let (event_tx, event_rx) = flume::unbounded::<Event>();
        let mut receivers = Vec::with_capacity(entries.len());
        let mut jobs = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            receivers.push(rx);
            jobs.push(Job {
                index,
                path: entry.path.clone(),
                destination: entry.destination.clone(),
                result: tx,
            });
        }

        let context = WorkerContext {
            source,
            events: event_tx,
            cancel: cancel.clone(),
            retry: self.retry,
            max_attempts: self.max_attempts.max(1),
        };
        let mut set = JoinSet::new();
        for worker in 0..self.workers.max(1).min(jobs.len().max(1)) {
            let jobs = job_rx.clone();
            let context = context.clone();
            set.spawn(async move { run_worker(worker, jobs, context).await });
        }
        drop(job_rx);
        drop(context);

        let dispatch = async move {
            for job in jobs {
                if cancel.is_cancelled() {
                    break;
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    sent = job_tx.send_async(job) => if sent.is_err() { break },
                }
            }
        };

        let paths: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();
        let collect = async {
            let mut states = vec![TaskState::Pending; paths.len()];
            let mut histories = vec![vec![TaskState::Pending]; paths.len()];
            while let Ok(event) = event_rx.recv_async().await {
                states[event.index] = event.state;
                histories[event.index].push(event.state);
                progress.on_transition(&paths[event.index], event.state, &BatchProgress::tally(&states));
            }
            histories
        };

        let join = async {
            while let Some(joined) = set.join_next().await {
                if let Err(err) = joined {
                    error!(error = %err, "download worker panicked");
                }
            }
        };

        let ((), histories, ()) = tokio::join!(dispatch, collect, join);

        for ((entry, receiver), history) in entries.iter_mut().zip(receivers).zip(histories) {
            entry.history = history;
            match receiver.await {
                Ok(outcome) => {
                    entry.state = outcome.state;
                    entry.attempts = outcome.attempts;
                    entry.bytes = outcome.bytes;
                    entry.error = outcome.error.as_ref().map(RemoteError::kind);
                    entry.message = outcome.error.map(|e| e.to_string());
                }
                Err(_) => entry.state = TaskState::Pending,
            }
        }

        let report = DownloadReport {
            entries,
            cancelled: cancel.is_cancelled(),
        };
        let summary = report.progress();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            pending = summary.pending,
            cancelled = report.cancelled,
            "download batch finished"
        );
        report
    }
}

async fn create_directories(root: &Path, dirs: &[String]) {
    if let Err(err) = tokio::fs::create_dir_all(root).await {
        warn!(path = %root.display(), error = %err, "failed to create destination");
    }
    for dir in dirs {
        let path = root.join(dir);
        if let Err(err) = tokio::fs::create_dir_all(&path).await {
            warn!(path = %path.display(), error = %err, "failed to create directory");
        }
    }
}

async fn run_worker(worker: usize, jobs: flume::Receiver<Job>, context: WorkerContext) {
    while let Ok(job) = jobs.recv_async().await {
        if context.cancel.is_cancelled() {
            debug!(worker, path = %job.path, "cancelled before start, leaving pending");
            continue;
        }
        let outcome = run_job(&job, &context).await;
        // The receiver only goes away if the batch itself was dropped.
        let _ = job.result.send(outcome);
    }
    debug!(worker, "download worker finished");
}

async fn run_job(job: &Job, context: &WorkerContext) -> Outcome {
    let emit = |state| {
        let _ = context.events.send(Event {
            index: job.index,
            state,
        });
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        emit(TaskState::InFlight);
        match fetch_to_file(context.source.as_ref(), &job.path, &job.destination).await {
            Ok(bytes) => {
                debug!(path = %job.path, bytes, attempt, "downloaded");
                emit(TaskState::Succeeded);
                return Outcome {
                    state: TaskState::Succeeded,
                    attempts: attempt,
                    bytes,
                    error: None,
                };
            }
            Err(err) if err.kind().is_retryable() && attempt < context.max_attempts => {
                let delay = retry_delay(&context.retry, &err, attempt);
                warn!(path = %job.path, attempt, ?delay, error = %err, "download failed, retrying");
                emit(TaskState::Retrying);
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(path = %job.path, attempt, kind = %err.kind(), error = %err, "download failed");
                emit(TaskState::FailedFatal);
                return Outcome {
                    state: TaskState::FailedFatal,
                    attempts: attempt,
                    bytes: 0,
                    error: Some(err),
                };
            }
        }
    }
}

fn retry_delay(policy: &RetryPolicy, err: &RemoteError, attempt: u32) -> Duration {
    let decision = if err.kind() == ErrorKind::RateLimited {
        policy.on_rate_limit(attempt, None)
    } else {
        policy.on_network_failure(attempt)
    };
    match decision {
        RetryDecision::Retry(delay) => delay,
        RetryDecision::GiveUp => Duration::ZERO,
    }
}

/// Streams into a temp file beside `destination`, renaming on success.
async fn fetch_to_file(
    source: &dyn ContentSource,
    path: &str,
    destination: &Path,
) -> Result<u64, RemoteError> {
    let io_error = |source| RemoteError::Io {
        path: path.to_string(),
        source,
    };
    if normalize_path(path).as_deref() != Some(path) {
        return Err(io_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "refusing to write outside the destination",
        )));
    }
    let parent = destination
        .parent()
        .ok_or_else(|| io_error(std::io::Error::from(std::io::ErrorKind::InvalidInput)))?;

    let temp = tempfile::Builder::new()
        .prefix(".gitbrowse-")
        .tempfile_in(parent)
        .map_err(io_error)?;
    let mut file = tokio::fs::File::from_std(temp.as_file().try_clone().map_err(io_error)?);

    let bytes = source.stream_into(path, &mut file).await?;
    file.flush().await.map_err(io_error)?;
    drop(file);

    temp.persist(destination).map_err(|e| io_error(e.error))?;
    Ok(bytes)
}
