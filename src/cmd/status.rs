// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! `status` and `cache` commands.

use crate::browser::RepoBrowser;
use crate::cli::cache::{CacheArgs, CacheSubcommand};
use crate::config::Config;
use crate::error::Result;

/// Probes connectivity once and prints the state and cache location.
pub async fn run_status_command(config: &Config, browser: &RepoBrowser) {
    let state = browser.monitor().probe_now().await;
    println!("connectivity: {state}");
    if config.connectivity.offline {
        println!("              (pinned by --offline)");
    }
    println!("cache:        {}", browser.cache().root().display());
    println!("downloads:    {}", config.paths.downloads_dir().display());
    println!("repositories: {}", config.paths.repositories_dir().display());
}

/// Main handler for the `cache` command.
///
/// # Errors
///
/// Returns `CacheError::Directory` if the cache cannot be scanned.
pub async fn run_cache_command(args: &CacheArgs, browser: &RepoBrowser) -> Result<()> {
    match &args.subcommand {
        CacheSubcommand::Clear(clear) => {
            let removed = match &clear.repo {
                Some(repo) => browser.refresh(repo).await?,
                None => browser.cache().clear().await?,
            };
            println!("Removed {removed} cached entries");
        }
    }
    Ok(())
}
