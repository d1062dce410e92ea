// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Path configuration.
//!
//! ```text
//! prefix/            (default: working directory)
//!   cache/           response cache
//!   downloads/       download destination
//!   repositories/    clone destination
//! ```
//!
//! All paths are optional and resolved from `prefix` if not set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Locations the command layer reads and writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Root for every relative path below.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<PathBuf>,
    /// Cache directory (default: prefix/cache).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
    /// Download destination (default: prefix/downloads).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<PathBuf>,
    /// Clone destination root (default: prefix/repositories).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<PathBuf>,
}

impl PathsConfig {
    /// Resolve relative paths against `prefix` and fill in defaults. Without a
    /// prefix the working directory is used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the working directory cannot be
    /// determined.
    pub fn resolve(&mut self) -> Result<(), ConfigError> {
        let prefix = match self.prefix.clone() {
            Some(prefix) => prefix,
            None => std::env::current_dir().map_err(|e| ConfigError::InvalidValue {
                section: "paths".to_string(),
                key: "prefix".to_string(),
                message: format!("cannot determine working directory: {e}"),
            })?,
        };

        let resolve = |path: &mut Option<PathBuf>, parent: &Path, default: &str| match path {
            Some(p) if p.is_relative() => {
                *path = Some(parent.join(p.clone()));
            }
            None => {
                *path = Some(parent.join(default));
            }
            _ => {}
        };

        resolve(&mut self.cache, &prefix, "cache");
        resolve(&mut self.downloads, &prefix, "downloads");
        resolve(&mut self.repositories, &prefix, "repositories");
        self.prefix = Some(prefix);
        Ok(())
    }

    /// Cache directory; `prefix/cache` semantics before resolution.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.clone().unwrap_or_else(|| self.base().join("cache"))
    }

    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.downloads
            .clone()
            .unwrap_or_else(|| self.base().join("downloads"))
    }

    #[must_use]
    pub fn repositories_dir(&self) -> PathBuf {
        self.repositories
            .clone()
            .unwrap_or_else(|| self.base().join("repositories"))
    }

    fn base(&self) -> PathBuf {
        self.prefix.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
