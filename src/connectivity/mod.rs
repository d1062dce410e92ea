// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network reachability monitor.
//!
//! ```text
//!            success (first)
//!  Unknown ------------------> Online
//!     |                        ^    |
//!     | failure       N x      |    | failure
//!     v            success     |    v
//!  Offline --------------------+  Offline
//! ```
//!
//! Any failed probe flips to `Offline` at once; leaving `Offline` takes
//! `success_threshold` consecutive successes.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Process-wide reachability as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectivityState {
    /// Before the first probe completes.
    Unknown = 0,
    Online = 1,
    Offline = 2,
}

impl ConnectivityState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Online,
            2 => Self::Offline,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
        })
    }
}

/// One reachability check. Must finish within its own timeout.
pub trait Probe: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, bool>;
}

/// Opens a TCP connection to well-known resolvers; any success counts.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    hosts: Vec<String>,
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(
            vec!["8.8.8.8:53".to_string(), "1.1.1.1:53".to_string()],
            Duration::from_secs(3),
        )
    }
}

impl TcpProbe {
    #[must_use]
    pub const fn new(hosts: Vec<String>, timeout: Duration) -> Self {
        Self { hosts, timeout }
    }
}

impl Probe for TcpProbe {
    fn probe(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            for host in &self.hosts {
                match tokio::time::timeout(self.timeout, TcpStream::connect(host.as_str())).await {
                    Ok(Ok(_)) => return true,
                    Ok(Err(err)) => debug!(host, error = %err, "probe connect failed"),
                    Err(_) => debug!(host, timeout = ?self.timeout, "probe timed out"),
                }
            }
            false
        })
    }
}

/// Debounced connectivity state shared by every component.
pub struct ConnectivityMonitor {
    /// `None` when pinned.
    probe: Option<Arc<dyn Probe>>,
    state: AtomicU8,
    streak: AtomicU32,
    success_threshold: u32,
    last_probe: Mutex<Option<Instant>>,
    /// Serialises probes so the streak counts one result at a time.
    probing: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &self.current_state())
            .field("pinned", &self.probe.is_none())
            .field("success_threshold", &self.success_threshold)
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    /// Monitor starting in `Unknown`.
    #[must_use]
    pub fn new(probe: Arc<dyn Probe>, success_threshold: u32) -> Self {
        Self {
            probe: Some(probe),
            state: AtomicU8::new(ConnectivityState::Unknown as u8),
            streak: AtomicU32::new(0),
            success_threshold: success_threshold.max(1),
            last_probe: Mutex::new(None),
            probing: tokio::sync::Mutex::new(()),
        }
    }

    /// Monitor fixed at `state`; probing is a no-op.
    #[must_use]
    pub fn pinned(state: ConnectivityState) -> Self {
        Self {
            probe: None,
            state: AtomicU8::new(state as u8),
            streak: AtomicU32::new(0),
            success_threshold: 1,
            last_probe: Mutex::new(None),
            probing: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn current_state(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Probes immediately and returns the resulting state.
    pub async fn probe_now(&self) -> ConnectivityState {
        let Some(probe) = &self.probe else {
            return self.current_state();
        };
        let _guard = self.probing.lock().await;
        let reachable = probe.probe().await;
        *self.last_probe.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.record(reachable)
    }

    /// Probes only if the last probe is older than `max_age` (or never ran).
    pub async fn ensure_recent(&self, max_age: Duration) -> ConnectivityState {
        let stale = self
            .last_probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none_or(|at| at.elapsed() >= max_age);
        if stale && self.probe.is_some() {
            self.probe_now().await
        } else {
            self.current_state()
        }
    }

    fn record(&self, reachable: bool) -> ConnectivityState {
        let previous = self.current_state();
        let next = if reachable {
            let streak = self.streak.fetch_add(1, Ordering::AcqRel) + 1;
            match previous {
                ConnectivityState::Offline if streak < self.success_threshold => {
                    debug!(streak, threshold = self.success_threshold, "probe succeeded while offline");
                    ConnectivityState::Offline
                }
                _ => ConnectivityState::Online,
            }
        } else {
            self.streak.store(0, Ordering::Release);
            ConnectivityState::Offline
        };

        self.state.store(next as u8, Ordering::Release);
        if next != previous {
            match next {
                ConnectivityState::Offline => warn!(%previous, "network unreachable, switching to offline mode"),
                _ => info!(%previous, state = %next, "connectivity changed"),
            }
        }
        next
    }

    /// Probes every `interval` until `cancel` fires.
    pub fn spawn_background(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        monitor.probe_now().await;
                    }
                }
            }
            debug!("connectivity monitor stopped");
        })
    }
}
