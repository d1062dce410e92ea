// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!            BrowseError (~24 bytes)
//!                   |
//!   +-------+-------+-------+------+------+
//!   |       |       |       |      |      |
//!   v       v       v       v      v      v
//! Remote  Cache  Config    Git    Io   Other
//!  Box     Box    Box      Box    Box  Box<str>
//!
//! RemoteError --kind()--> ErrorKind
//!   NotFound | RateLimited | NetworkError | TooLarge
//!   Unavailable | DataInconsistency | Decode | Io
//!
//! retryable:  NetworkError, RateLimited
//! fatal:      everything else
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias for `anyhow::Result`.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`BrowseError`].
pub type BrowseResult<T> = std::result::Result<T, BrowseError>;

/// Top-level error type of the core.
///
/// All sub-errors are boxed to keep this enum at ~24 bytes on the stack.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Remote service or offline fallback failed.
    #[error("{0}")]
    Remote(#[from] Box<RemoteError>),

    /// Local cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] Box<CacheError>),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// External git invocation failed.
    #[error("git error: {0}")]
    Git(#[from] Box<GitError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),

    /// Generic error with message.
    #[error("{0}")]
    Other(Box<str>),
}

impl BrowseError {
    /// Error kind of the underlying remote failure, if this is one.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote(err) => Some(err.kind()),
            Self::Io(_) => Some(ErrorKind::Io),
            _ => None,
        }
    }
}

/// Create a [`BrowseError::Other`] from a message.
pub fn other(message: impl Into<String>) -> BrowseError {
    BrowseError::Other(message.into().into_boxed_str())
}

// --- From implementations for boxing ---

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for BrowseError {
                fn from(err: $error) -> Self {
                    BrowseError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    RemoteError => Remote,
    CacheError => Cache,
    ConfigError => Config,
    GitError => Git,
    std::io::Error => Io,
}

// --- Error taxonomy ---

/// Terminal error kinds reported to callers and recorded in download reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    RateLimited,
    NetworkError,
    TooLarge,
    /// No connectivity and no cache entry.
    Unavailable,
    /// Internal merge conflict. Logged, never raised by the tree builder.
    DataInconsistency,
    /// The remote answered with a payload that could not be decoded.
    Decode,
    /// Local filesystem failure while materializing a download.
    Io,
    /// The remote refused the request (4xx other than 404 and 429).
    Rejected,
}

impl ErrorKind {
    /// Transient kinds are retried; everything else is surfaced immediately.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::RateLimited)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::RateLimited => "RateLimited",
            Self::NetworkError => "NetworkError",
            Self::TooLarge => "TooLarge",
            Self::Unavailable => "Unavailable",
            Self::DataInconsistency => "DataInconsistency",
            Self::Decode => "Decode",
            Self::Io => "Io",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Remote Errors ---

/// Errors surfaced by the remote repository client and the offline fallback.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Repository, user, branch or path does not exist or is inaccessible.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Rate limit still in effect after exhausting the backoff budget.
    #[error("rate limited after {attempts} attempts: {url}")]
    RateLimited { url: String, attempts: u32 },

    /// Transport failure (timeout, connection reset, DNS) after retries.
    #[error("network error: {url} - {message}")]
    Network { url: String, message: String },

    /// Unexpected HTTP status.
    #[error("http error {status}: {url}")]
    Http { status: u16, url: String },

    /// Content exceeds the in-memory threshold.
    #[error("{path} is too large to buffer ({size} bytes, limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },

    /// Offline and nothing cached.
    #[error("unavailable offline and not cached: {resource}")]
    Unavailable { resource: String },

    /// Malformed payload.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// Local I/O failure while writing streamed content.
    #[error("io error while writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// Maps this error onto the reported taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Network { .. } => ErrorKind::NetworkError,
            Self::Http { status, .. } if *status >= 500 => ErrorKind::NetworkError,
            Self::Http { .. } => ErrorKind::Rejected,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn unavailable(resource: impl Into<String>) -> Self {
        Self::Unavailable {
            resource: resource.into(),
        }
    }

    pub fn decode(what: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

// --- Cache Errors ---

/// Local cache store errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache directory could not be created or read.
    #[error("cache directory '{path}': {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be written.
    #[error("failed to write cache entry '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Entry header could not be serialized.
    #[error("failed to encode cache entry '{key}': {message}")]
    Encode { key: String, message: String },
}

// --- Config Errors ---

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("failed to parse config: {message}")]
    ParseError { message: String },

    /// Invalid configuration value.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },

    /// Repository argument is not `owner/name`.
    #[error("invalid repository '{0}', expected owner/name")]
    InvalidRepository(String),
}

// --- Git Errors ---

/// Errors from the external git tool.
#[derive(Debug, Error)]
pub enum GitError {
    /// git is not installed or not in PATH.
    #[error("git executable not found in PATH")]
    NotInstalled,

    /// git exited unsuccessfully.
    #[error("git command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    /// git could not be spawned.
    #[error("failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
