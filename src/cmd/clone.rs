// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Clone command implementation.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::browser::RepoBrowser;
use crate::cli::browse::CloneArgs;
use crate::config::Config;
use crate::error::{RemoteError, Result};
use crate::git::{clone_or_pull, clone_url, default_destination};
use crate::remote::Repository;

/// Main handler for the `clone` command.
///
/// # Errors
///
/// Returns `Unavailable` while offline, `GitError::NotInstalled` without git,
/// or `GitError::CommandFailed` when git fails.
pub async fn run_clone_command(
    args: &CloneArgs,
    config: &Config,
    browser: &RepoBrowser,
    cancel: &CancellationToken,
) -> Result<()> {
    let state = browser
        .monitor()
        .ensure_recent(config.connectivity.interval())
        .await;
    if state.is_offline() {
        return Err(RemoteError::unavailable(format!("clone of {}", args.repo)).into());
    }

    let repo = Repository::named(&args.repo.owner, &args.repo.name);
    let url = clone_url(&repo, &config.remote.endpoints().web);
    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| default_destination(&config.paths.repositories_dir(), &repo));

    info!(repo = %args.repo, url, "cloning");
    let action = clone_or_pull(&url, &destination, args.branch.as_deref(), cancel).await?;
    println!("Repository {action} at {}", destination.display());
    Ok(())
}
