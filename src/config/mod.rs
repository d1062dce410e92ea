// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration management for gitbrowse-rs.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low -> high)
//! 1. defaults
//! 2. gitbrowse.toml (cwd, optional)
//! 3. --config
//! 4. GITBROWSE_* env vars
//! 5. CLI overrides
//! ```
//!
//! # Environment Variable Mapping
//!
//! ```text
//! GITBROWSE_REMOTE__TOKEN=ghp_x          -> remote.token = "ghp_x"
//! GITBROWSE_DOWNLOAD__WORKERS=8          -> download.workers = 8
//! GITBROWSE_CONNECTIVITY__OFFLINE=true   -> connectivity.offline = true
//! GITBROWSE_CONNECTIVITY__HOSTS=a:1,b:2  -> connectivity.hosts = ["a:1", "b:2"]
//! ```
//!
//! The core never reads configuration: command handlers turn a [`Config`]
//! into the option structs of each component.

pub mod loader;
pub mod paths;
pub mod types;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::BrowserOptions;
use crate::download::DownloadScheduler;
use crate::error::{ConfigError, Result};
use crate::remote::RemoteOptions;

pub use loader::ConfigLoader;
pub use paths::PathsConfig;
use types::{CacheConfig, ConnectivityConfig, DownloadConfig, GlobalConfig, RemoteConfig};

/// Local configuration file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "gitbrowse.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "GITBROWSE";

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub global: GlobalConfig,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub download: DownloadConfig,
    pub connectivity: ConnectivityConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use gitbrowse_rs::config::Config;
    ///
    /// let config = Config::builder()
    ///     .add_toml_file_optional("gitbrowse.toml")
    ///     .with_env_prefix("GITBROWSE")
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Load configuration from a single TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// does not match the `Config` structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().add_toml_file(path).build()
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or does not match the
    /// `Config` structure.
    pub fn parse(content: &str) -> Result<Self> {
        Self::builder().add_toml_str(content).build()
    }

    /// Resolve all paths and validate ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for out-of-range values.
    pub fn resolve_and_validate(&mut self) -> Result<()> {
        self.paths.resolve()?;
        self.validate()?;
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |section: &str, key: &str, message: String| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            message,
        };
        if !(1..=100).contains(&self.remote.page_size) {
            return Err(invalid(
                "remote",
                "page_size",
                format!("must be 1-100, got {}", self.remote.page_size),
            ));
        }
        if self.remote.request_timeout_secs == 0 {
            return Err(invalid("remote", "request_timeout_secs", "must be positive".into()));
        }
        if self.download.workers == 0 {
            return Err(invalid("download", "workers", "must be at least 1".into()));
        }
        if self.download.max_attempts == 0 {
            return Err(invalid("download", "max_attempts", "must be at least 1".into()));
        }
        if self.connectivity.success_threshold == 0 {
            return Err(invalid(
                "connectivity",
                "success_threshold",
                "must be at least 1".into(),
            ));
        }
        if self.connectivity.timeout_ms == 0 {
            return Err(invalid("connectivity", "timeout_ms", "must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions::builder()
            .endpoints(self.remote.endpoints())
            .maybe_token(self.remote.token.clone().filter(|t| !t.is_empty()))
            .page_size(self.remote.page_size)
            .request_timeout(self.remote.request_timeout())
            .max_in_memory_bytes(self.remote.max_in_memory_bytes)
            .scrape_fallback(self.remote.scrape_fallback)
            .build()
    }

    #[must_use]
    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions::builder()
            .listing_ttl(Duration::from_secs(self.cache.listing_ttl_secs))
            .tree_ttl(Duration::from_secs(self.cache.tree_ttl_secs))
            .content_ttl(Duration::from_secs(self.cache.content_ttl_secs))
            .probe_max_age(self.connectivity.interval())
            .build()
    }

    #[must_use]
    pub fn download_scheduler(&self) -> DownloadScheduler {
        DownloadScheduler::builder()
            .workers(self.download.workers)
            .max_attempts(self.download.max_attempts)
            .build()
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.paths.cache_dir()
    }

    /// Format configuration options for display.
    ///
    /// One `key = value` line per option, sorted by key. The token is shown
    /// as `[hidden]`.
    #[must_use]
    pub fn format_options(&self) -> Vec<String> {
        let mut options = BTreeMap::new();
        self.format_global_options(&mut options);
        self.format_remote_options(&mut options);
        self.format_cache_options(&mut options);
        self.format_download_options(&mut options);
        self.format_connectivity_options(&mut options);
        self.format_paths_options(&mut options);

        let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

        options
            .into_iter()
            .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
            .collect()
    }

    fn format_global_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "global.output_log_level".into(),
            u8::from(self.global.output_log_level).to_string(),
        );
        options.insert(
            "global.file_log_level".into(),
            u8::from(self.global.file_log_level).to_string(),
        );
        options.insert(
            "global.log_file".into(),
            self.global
                .log_file
                .as_ref()
                .map_or_else(String::new, |p| p.display().to_string()),
        );
        options.insert("global.json_log".into(), self.global.json_log.to_string());
    }

    fn format_remote_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert("remote.api_url".into(), self.remote.api_url.clone());
        options.insert("remote.web_url".into(), self.remote.web_url.clone());
        options.insert("remote.raw_url".into(), self.remote.raw_url.clone());
        if self.remote.token.as_deref().is_some_and(|t| !t.is_empty()) {
            options.insert("remote.token".into(), "[hidden]".into());
        }
        options.insert("remote.page_size".into(), self.remote.page_size.to_string());
        options.insert(
            "remote.request_timeout_secs".into(),
            self.remote.request_timeout_secs.to_string(),
        );
        options.insert(
            "remote.max_in_memory_bytes".into(),
            self.remote.max_in_memory_bytes.to_string(),
        );
        options.insert(
            "remote.scrape_fallback".into(),
            self.remote.scrape_fallback.to_string(),
        );
    }

    fn format_cache_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "cache.listing_ttl_secs".into(),
            self.cache.listing_ttl_secs.to_string(),
        );
        options.insert("cache.tree_ttl_secs".into(), self.cache.tree_ttl_secs.to_string());
        options.insert(
            "cache.content_ttl_secs".into(),
            self.cache.content_ttl_secs.to_string(),
        );
    }

    fn format_download_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert("download.workers".into(), self.download.workers.to_string());
        options.insert(
            "download.max_attempts".into(),
            self.download.max_attempts.to_string(),
        );
    }

    fn format_connectivity_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "connectivity.hosts".into(),
            self.connectivity.hosts.join(","),
        );
        options.insert(
            "connectivity.timeout_ms".into(),
            self.connectivity.timeout_ms.to_string(),
        );
        options.insert(
            "connectivity.interval_secs".into(),
            self.connectivity.interval_secs.to_string(),
        );
        options.insert(
            "connectivity.success_threshold".into(),
            self.connectivity.success_threshold.to_string(),
        );
        options.insert(
            "connectivity.offline".into(),
            self.connectivity.offline.to_string(),
        );
    }

    fn format_paths_options(&self, options: &mut BTreeMap<String, String>) {
        let fmt = |p: PathBuf| p.display().to_string();
        options.insert("paths.cache".into(), fmt(self.paths.cache_dir()));
        options.insert("paths.downloads".into(), fmt(self.paths.downloads_dir()));
        options.insert(
            "paths.repositories".into(),
            fmt(self.paths.repositories_dir()),
        );
    }
}
