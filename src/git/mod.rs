// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cloning through the external `git` executable.
//!
//! ```text
//! clone_url(repo)          repo.clone_url or <web>/<owner>/<name>.git
//!        |
//! clone_or_pull(url, dest)
//!        |
//!   dest/.git exists? --yes--> git pull --quiet      (cwd = dest)
//!        | no
//!        v
//!   git clone --quiet [--branch b] url dest          (cwd = dest parent)
//! ```
//!
//! Every invocation sets `GIT_TERMINAL_PROMPT=0` and `GCM_INTERACTIVE=never`
//! so a missing credential fails instead of blocking on a prompt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{OnceLock, PoisonError, RwLock};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::GitError;
use crate::remote::Repository;

/// What [`clone_or_pull`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneAction {
    Cloned,
    Pulled,
}

impl std::fmt::Display for CloneAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cloned => "cloned",
            Self::Pulled => "updated",
        })
    }
}

/// Clone URL of `repo`, derived from the web host when the listing did not
/// carry one.
#[must_use]
pub fn clone_url(repo: &Repository, web_base: &str) -> String {
    repo.clone_url.clone().unwrap_or_else(|| {
        format!(
            "{}/{}/{}.git",
            web_base.trim_end_matches('/'),
            repo.owner,
            repo.name
        )
    })
}

/// Default checkout location: `<repositories>/<name>`.
#[must_use]
pub fn default_destination(repositories: &Path, repo: &Repository) -> PathBuf {
    repositories.join(&repo.name)
}

fn exe_cache() -> &'static RwLock<HashMap<String, PathBuf>> {
    static CACHE: OnceLock<RwLock<HashMap<String, PathBuf>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Locates `git` in `PATH`, caching the result for the process.
///
/// # Errors
///
/// Returns `GitError::NotInstalled` when `git` cannot be found.
pub fn git_executable() -> Result<PathBuf, GitError> {
    if let Some(path) = exe_cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get("git")
    {
        return Ok(path.clone());
    }
    let path = which::which("git").map_err(|_| GitError::NotInstalled)?;
    exe_cache()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert("git".to_string(), path.clone());
    Ok(path)
}

/// Whether `path` already holds a git checkout.
#[must_use]
pub fn is_checkout(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Runs git with `args` in `cwd`, returning trimmed stdout.
async fn run_git(
    git: &Path,
    args: &[&str],
    cwd: &Path,
    cancel: &CancellationToken,
) -> Result<String, GitError> {
    let command_line = format!("git {}", args.join(" "));
    debug!(command = %command_line, cwd = %cwd.display(), "running git");

    let child = Command::new(git)
        .args(args)
        .current_dir(cwd)
        .env("GCM_INTERACTIVE", "never")
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| GitError::SpawnFailed {
            command: command_line.clone(),
            source,
        })?;

    let output = tokio::select! {
        () = cancel.cancelled() => {
            return Err(GitError::CommandFailed {
                command: command_line,
                message: "cancelled".to_string(),
            });
        }
        output = child.wait_with_output() => output.map_err(|source| GitError::SpawnFailed {
            command: command_line.clone(),
            source,
        })?,
    };

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: command_line,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Clones `url` into `destination`, or pulls when it already holds a
/// checkout.
///
/// # Errors
///
/// `GitError::NotInstalled` without git, `GitError::CommandFailed` when git
/// exits unsuccessfully (including a non-checkout destination that is not
/// empty).
pub async fn clone_or_pull(
    url: &str,
    destination: &Path,
    branch: Option<&str>,
    cancel: &CancellationToken,
) -> Result<CloneAction, GitError> {
    let git = git_executable()?;

    if is_checkout(destination) {
        run_git(&git, &["pull", "--quiet"], destination, cancel).await?;
        info!(path = %destination.display(), "pulled existing checkout");
        return Ok(CloneAction::Pulled);
    }

    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| GitError::SpawnFailed {
            command: format!("mkdir {}", parent.display()),
            source,
        })?;

    let name = destination
        .file_name()
        .ok_or_else(|| GitError::CommandFailed {
            command: "git clone".to_string(),
            message: format!("'{}' does not name a directory", destination.display()),
        })?
        .to_string_lossy();
    let mut args = vec!["clone", "--quiet"];
    if let Some(branch) = branch {
        args.extend(["--branch", branch]);
    }
    args.extend([url, name.as_ref()]);
    run_git(&git, &args, parent, cancel).await?;

    info!(url, path = %destination.display(), "cloned repository");
    Ok(CloneAction::Cloned)
}
