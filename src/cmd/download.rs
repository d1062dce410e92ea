// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Download command implementation.
//!
//! ```text
//! download owner/repo [paths...]
//!   -> RepoBrowser::download_paths  (directories expanded, empty = whole repo)
//!   -> indicatif bar: finished/total, current path
//!   -> summary, one line per failed file
//! ```

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::browser::RepoBrowser;
use crate::cli::browse::DownloadArgs;
use crate::config::Config;
use crate::download::{BatchProgress, DownloadEntry, DownloadProgress, DownloadReport, TaskState};
use crate::error::Result;

/// Pre-validated progress bar style for file batches.
fn bar_style() -> ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE
        .get_or_init(|| {
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
        })
        .clone()
}

/// Renders scheduler transitions on a terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style());
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadProgress for BarProgress {
    fn on_transition(&self, path: &str, state: TaskState, progress: &BatchProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.finished() as u64);
        match state {
            TaskState::InFlight => self.bar.set_message(path.to_string()),
            TaskState::Retrying => self.bar.set_message(format!("{path} (retrying)")),
            TaskState::FailedFatal => self.bar.println(format!("failed: {path}")),
            TaskState::Pending | TaskState::Succeeded => {}
        }
    }
}

fn describe_failure(entry: &DownloadEntry) -> String {
    let kind = entry
        .error
        .map_or_else(|| "unknown".to_string(), |kind| kind.to_string());
    match &entry.message {
        Some(message) => format!(
            "  {} ({kind}, {} attempts): {message}",
            entry.path, entry.attempts
        ),
        None => format!("  {} ({kind}, {} attempts)", entry.path, entry.attempts),
    }
}

fn summarize(report: &DownloadReport) -> Vec<String> {
    let progress = report.progress();
    let bytes: u64 = report.succeeded().map(|e| e.bytes).sum();
    let mut lines = vec![format!(
        "{} of {} files downloaded ({bytes} bytes), {} failed",
        progress.succeeded, progress.total, progress.failed
    )];
    if report.cancelled {
        lines.push(format!("cancelled, {} files not started", progress.pending));
    }
    lines.extend(report.failed().map(describe_failure));
    lines
}

/// Main handler for the `download` command.
///
/// # Errors
///
/// Returns an error when the repository, branch or a selected path cannot be
/// resolved, or when any file failed to download.
pub async fn run_download_command(
    args: &DownloadArgs,
    config: &Config,
    browser: &RepoBrowser,
    cancel: &CancellationToken,
) -> Result<()> {
    let destination: PathBuf = args
        .output
        .clone()
        .unwrap_or_else(|| config.paths.downloads_dir());

    let progress = BarProgress::new();
    let report = browser
        .download_paths(
            &args.repo,
            args.branch.as_deref(),
            &args.paths,
            &destination,
            cancel,
            &progress,
        )
        .await;
    progress.finish();
    let report = report?;

    for line in summarize(&report) {
        println!("{line}");
    }

    if report.all_succeeded() && !report.cancelled {
        println!("Saved to {}", destination.display());
        Ok(())
    } else if report.cancelled {
        Err(anyhow!("download cancelled"))
    } else {
        Err(anyhow!(
            "{} of {} files failed",
            report.progress().failed,
            report.entries.len()
        ))
    }
}
