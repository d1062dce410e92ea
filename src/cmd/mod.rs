// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command implementations.
//!
//! ```text
//! CLI args --> cmd::run_* handlers
//!   browse (list, tree, view), download, clone, config, status
//!
//! Session::open(config)
//!   ConnectivityMonitor (TcpProbe, or pinned Offline)
//!   GitHubClient + CacheStore + DownloadScheduler
//!        |
//!        v
//!   RepoBrowser  --> handler --> Session::close (settle refreshes)
//! ```

pub mod browse;
pub mod clone;
pub mod config;
pub mod download;
pub mod status;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::browser::RepoBrowser;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState, TcpProbe};
use crate::error::Result;
use crate::remote::{GitHubClient, RemoteSource};

/// Everything a command needs for one run.
pub struct Session {
    pub browser: RepoBrowser,
    /// Fired by Ctrl+C; also stops the connectivity monitor on close.
    pub cancel: CancellationToken,
    monitor_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Wires the core components from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the cache
    /// directory cannot be created.
    pub async fn open(config: &Config) -> Result<Self> {
        let cancel = CancellationToken::new();
        let monitor = if config.connectivity.offline {
            Arc::new(ConnectivityMonitor::pinned(ConnectivityState::Offline))
        } else {
            let probe = TcpProbe::new(
                config.connectivity.hosts.clone(),
                config.connectivity.timeout(),
            );
            Arc::new(ConnectivityMonitor::new(
                Arc::new(probe),
                config.connectivity.success_threshold,
            ))
        };
        let monitor_task = (!config.connectivity.offline).then(|| {
            monitor.spawn_background(config.connectivity.interval(), cancel.child_token())
        });

        let remote: Arc<dyn RemoteSource> = Arc::new(GitHubClient::new(config.remote_options())?);
        let cache = Arc::new(CacheStore::open(config.cache_dir()).await?);
        let browser = RepoBrowser::new(
            monitor,
            remote,
            cache,
            config.download_scheduler(),
            config.browser_options(),
        );

        Ok(Self {
            browser,
            cancel,
            monitor_task,
        })
    }

    /// Cancels the session token when Ctrl+C is pressed.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, cancelling...");
                cancel.cancel();
            }
        });
    }

    /// Waits for background cache refreshes and stops the monitor.
    pub async fn close(self) {
        self.browser.settle().await;
        self.cancel.cancel();
        if let Some(task) = self.monitor_task
            && let Err(err) = task.await
        {
            debug!(error = %err, "connectivity monitor ended abnormally");
        }
    }
}
