// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Remote repository client.
//!
//! ```text
//!                 RemoteSource (trait, BoxFuture)
//!                        |
//!                  GitHubClient
//!                   |        |
//!          JSON API |        | HTML scraping
//!   (token, paging, |        | (rate limited or API
//!    rate limits)   |        |  unavailable)
//!                   v        v
//!             Sourced::Api  Sourced::Scraped
//!                   \        /
//!                into_inner() --> canonical shape
//!
//! retry: RetryPolicy
//!   429/403+limit  header wait or 1s,2s,4s.. cap 30s, 5 attempts
//!   transport      0.5s, 1s, 2s then NetworkError
//! ```

pub mod github;
pub mod retry;
pub mod scrape;


use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use crate::error::{ConfigError, RemoteError};
use crate::tree::RawEntry;

pub use github::{Endpoints, GitHubClient, RemoteOptions};
pub use retry::{RetryDecision, RetryPolicy};

/// Identity of a repository: `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `owner/name`, tolerating a `.git` suffix and a
    /// `https://github.com/` prefix.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRepository` if the input does not name
    /// exactly one owner and one repository.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
            .trim_start_matches("github.com/")
            .trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        match trimmed.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self::new(*owner, *name)),
            _ => Err(ConfigError::InvalidRepository(input.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository as listed for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    /// Resolved lazily; scraped listings do not carry it.
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub fork_count: u64,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Repository {
    /// A repository with only its identity known.
    pub fn named(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            default_branch: None,
            star_count: 0,
            fork_count: 0,
            is_private: false,
            description: None,
            language: None,
            html_url: None,
            clone_url: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.name)
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Opaque position in a paginated listing. Absent means "first page".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote rate-limit accounting as reported by response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Unix seconds at which the window resets.
    pub reset_at: Option<u64>,
}

/// One page of a user's repositories, in remote order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPage {
    pub repositories: Vec<Repository>,
    pub next_page_token: Option<PageToken>,
    #[serde(default)]
    pub rate_limit: RateLimitInfo,
}

/// Where a result came from. Consumers normalize with [`Sourced::into_inner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sourced<T> {
    Api(T),
    Scraped(T),
}

impl<T> Sourced<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Api(value) | Self::Scraped(value) => value,
        }
    }

    pub const fn is_scraped(&self) -> bool {
        matches!(self, Self::Scraped(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        match self {
            Self::Api(value) => Sourced::Api(f(value)),
            Self::Scraped(value) => Sourced::Scraped(f(value)),
        }
    }
}

/// Byte sink used for streamed downloads.
pub type Sink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Operations the core needs from the hosting service.
///
/// Implementations handle retries and backoff internally and only surface
/// terminal errors.
pub trait RemoteSource: Send + Sync {
    /// One page of `username`'s repositories. `None` fetches the first page.
    fn list_repositories<'a>(
        &'a self,
        username: &'a str,
        page: Option<&'a PageToken>,
    ) -> BoxFuture<'a, Result<Sourced<RepoPage>, RemoteError>>;

    /// Default branch name; `NotFound` when the repository is inaccessible.
    fn resolve_default_branch<'a>(
        &'a self,
        repo: &'a RepoRef,
    ) -> BoxFuture<'a, Result<Sourced<String>, RemoteError>>;

    /// The whole tree of `branch` as a flat listing.
    fn fetch_tree<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<Sourced<Vec<RawEntry>>, RemoteError>>;

    /// File content, buffered. Fails with `TooLarge` above the in-memory
    /// threshold.
    fn fetch_file_content<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, RemoteError>>;

    /// File content streamed into `sink`. Returns the number of bytes written.
    fn stream_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        path: &'a str,
        sink: &'a mut Sink<'_>,
    ) -> BoxFuture<'a, Result<u64, RemoteError>>;
}
