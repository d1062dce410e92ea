// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration sections.
//!
//! ```text
//! Config: GlobalConfig, RemoteConfig, CacheConfig, DownloadConfig,
//!         ConnectivityConfig, PathsConfig
//! ```
//!
//! Durations are plain integers (`*_secs`, `*_ms`) so TOML and environment
//! values stay simple.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogLevel;
use crate::remote::Endpoints;

/// Logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Log level for stderr output (0-6).
    pub output_log_level: LogLevel,
    /// Log level for file output (0-6).
    pub file_log_level: LogLevel,
    /// Log file; no file logging when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Write the log file as JSON lines.
    pub json_log: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            output_log_level: LogLevel::WARN,
            file_log_level: LogLevel::DEBUG,
            log_file: None,
            json_log: false,
        }
    }
}

/// Remote service options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub api_url: String,
    pub web_url: String,
    pub raw_url: String,
    /// Bearer token. Never printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Repositories per listing page (1-100).
    pub page_size: u32,
    pub request_timeout_secs: u64,
    /// Larger files are streamed, never buffered.
    pub max_in_memory_bytes: u64,
    /// Fall back to HTML pages when the API refuses.
    pub scrape_fallback: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            api_url: endpoints.api,
            web_url: endpoints.web,
            raw_url: endpoints.raw,
            token: None,
            page_size: 100,
            request_timeout_secs: 30,
            max_in_memory_bytes: 10 * 1024 * 1024,
            scrape_fallback: true,
        }
    }
}

impl RemoteConfig {
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            api: self.api_url.trim_end_matches('/').to_string(),
            web: self.web_url.trim_end_matches('/').to_string(),
            raw: self.raw_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Freshness of cached responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Repository listings and default branches.
    pub listing_ttl_secs: u64,
    pub tree_ttl_secs: u64,
    pub content_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_secs: 3600,
            tree_ttl_secs: 3600,
            content_ttl_secs: 3600,
        }
    }
}

/// Download worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    pub workers: usize,
    /// Attempts per file, first one included.
    pub max_attempts: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_attempts: 3,
        }
    }
}

/// Reachability probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// `host:port` pairs; reachable if any accepts a TCP connection.
    pub hosts: Vec<String>,
    pub timeout_ms: u64,
    pub interval_secs: u64,
    /// Consecutive successes needed to leave offline mode.
    pub success_threshold: u32,
    /// Never touch the network.
    pub offline: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["8.8.8.8:53".to_string(), "1.1.1.1:53".to_string()],
            timeout_ms: 3000,
            interval_secs: 30,
            success_threshold: 3,
            offline: false,
        }
    }
}

impl ConnectivityConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
