// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core surface consumed by the command layer.
//!
//! ```text
//!                     RepoBrowser
//!   list / branch / tree / content         download
//!              |                               |
//!        read_through(key)              DownloadScheduler
//!              |                               |
//!   Offline?  -> cache hit (as is) | Unavailable    RepoContent
//!   Fresh hit -> return                           cache hit or
//!   Stale hit -> return, refresh in background    remote stream
//!   miss      -> remote, then cache put
//! ```
//!
//! Background refreshes are tracked in a `JoinSet`; [`RepoBrowser::settle`]
//! waits for them.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bon::Builder;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore, Freshness};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::download::{ContentSource, DownloadProgress, DownloadReport, DownloadScheduler};
use crate::error::{CacheError, RemoteError};
use crate::remote::{PageToken, RemoteSource, RepoPage, RepoRef, Repository, Sink, Sourced};
use crate::tree::{RawEntry, RepoTree, TreeNode, TreePage, normalize_path};

const HOUR: Duration = Duration::from_secs(3600);

/// Freshness and cache settings for a browsing session.
#[derive(Debug, Clone, Builder)]
pub struct BrowserOptions {
    /// TTL of repository listings and default branches.
    #[builder(default = HOUR)]
    pub listing_ttl: Duration,
    #[builder(default = HOUR)]
    pub tree_ttl: Duration,
    #[builder(default = HOUR)]
    pub content_ttl: Duration,
    /// Remote reads re-probe connectivity when the last probe is older.
    #[builder(default = Duration::from_secs(30))]
    pub probe_max_age: Duration,
    /// Nodes per page in [`RepoBrowser::get_tree_page`].
    #[builder(default = 100)]
    pub tree_page_size: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A read result and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub freshness: Freshness,
    pub from_cache: bool,
}

impl<T> Fetched<T> {
    const fn live(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Fresh,
            from_cache: false,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            freshness: self.freshness,
            from_cache: self.from_cache,
        }
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale)
    }
}

/// How a value is laid out in the cache.
trait CachePayload: Sized + Send + Sync + 'static {
    fn encode(&self) -> Result<Vec<u8>, RemoteError>;
    fn decode(bytes: Vec<u8>) -> Result<Self, RemoteError>;
}

fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, RemoteError> {
    serde_json::to_vec(value).map_err(|e| RemoteError::decode("cache payload", e))
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RemoteError> {
    serde_json::from_slice(bytes).map_err(|e| RemoteError::decode("cache payload", e))
}

impl CachePayload for RepoPage {
    fn encode(&self) -> Result<Vec<u8>, RemoteError> {
        encode_json(self)
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, RemoteError> {
        decode_json(&bytes)
    }
}

impl CachePayload for Vec<RawEntry> {
    fn encode(&self) -> Result<Vec<u8>, RemoteError> {
        encode_json(self)
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, RemoteError> {
        decode_json(&bytes)
    }
}

/// Branch names are stored as plain UTF-8.
impl CachePayload for String {
    fn encode(&self) -> Result<Vec<u8>, RemoteError> {
        Ok(self.clone().into_bytes())
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, RemoteError> {
        Self::from_utf8(bytes).map_err(|e| RemoteError::decode("cached branch", e))
    }
}

/// File contents are stored verbatim.
impl CachePayload for Vec<u8> {
    fn encode(&self) -> Result<Vec<u8>, RemoteError> {
        Ok(self.clone())
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, RemoteError> {
        Ok(bytes)
    }
}

async fn store<T: CachePayload>(cache: &CacheStore, key: &CacheKey, value: &T, ttl: Duration) {
    let result = match value.encode() {
        Ok(bytes) => cache.put(key, &bytes, ttl).await.map_err(|e| e.to_string()),
        Err(err) => Err(err.to_string()),
    };
    if let Err(message) = result {
        warn!(%key, error = %message, "failed to cache response");
    }
}

type TreeMemo = HashMap<(RepoRef, String), Arc<RepoTree>>;

/// Repository browsing over a remote source, a cache and a connectivity
/// monitor.
pub struct RepoBrowser {
    monitor: Arc<ConnectivityMonitor>,
    remote: Arc<dyn RemoteSource>,
    cache: Arc<CacheStore>,
    scheduler: DownloadScheduler,
    options: BrowserOptions,
    /// Fresh default branches resolved this session.
    branches: Mutex<HashMap<RepoRef, Fetched<String>>>,
    /// Trees built from fresh listings this session.
    trees: Mutex<TreeMemo>,
    refreshes: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for RepoBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoBrowser")
            .field("monitor", &self.monitor)
            .field("cache", &self.cache)
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RepoBrowser {
    #[must_use]
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        remote: Arc<dyn RemoteSource>,
        cache: Arc<CacheStore>,
        scheduler: DownloadScheduler,
        options: BrowserOptions,
    ) -> Self {
        Self {
            monitor,
            remote,
            cache,
            scheduler,
            options,
            branches: Mutex::new(HashMap::new()),
            trees: Mutex::new(HashMap::new()),
            refreshes: Mutex::new(JoinSet::new()),
        }
    }

    #[must_use]
    pub fn connectivity_state(&self) -> ConnectivityState {
        self.monitor.current_state()
    }

    #[must_use]
    pub const fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Cache-aware read of one resource.
    async fn read_through<T, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Fetched<T>, RemoteError>
    where
        T: CachePayload,
        F: FnOnce(Arc<dyn RemoteSource>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let state = self.monitor.ensure_recent(self.options.probe_max_age).await;
        let cached = self.cache.get(&key).await;

        if state.is_offline() {
            let hit = cached.ok_or_else(|| RemoteError::unavailable(key.as_str()))?;
            let value = T::decode(hit.payload).map_err(|err| {
                warn!(%key, error = %err, "cached entry unusable while offline");
                RemoteError::unavailable(key.as_str())
            })?;
            debug!(%key, freshness = ?hit.freshness, "served from cache while offline");
            return Ok(Fetched {
                value,
                freshness: hit.freshness,
                from_cache: true,
            });
        }

        if let Some(hit) = cached {
            match T::decode(hit.payload) {
                Ok(value) => {
                    if !hit.freshness.is_fresh() {
                        self.spawn_refresh(key, ttl, fetch);
                    }
                    return Ok(Fetched {
                        value,
                        freshness: hit.freshness,
                        from_cache: true,
                    });
                }
                Err(err) => warn!(%key, error = %err, "ignoring undecodable cache entry"),
            }
        }

        let value = fetch(Arc::clone(&self.remote)).await?;
        store(&self.cache, &key, &value, ttl).await;
        Ok(Fetched::live(value))
    }

    fn spawn_refresh<T, F, Fut>(&self, key: CacheKey, ttl: Duration, fetch: F)
    where
        T: CachePayload,
        F: FnOnce(Arc<dyn RemoteSource>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let remote = Arc::clone(&self.remote);
        let cache = Arc::clone(&self.cache);
        let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
        while refreshes.try_join_next().is_some() {}
        debug!(%key, "stale hit, refreshing in background");
        refreshes.spawn(async move {
            match fetch(remote).await {
                Ok(value) => store(&cache, &key, &value, ttl).await,
                Err(err) => debug!(%key, error = %err, "background refresh failed"),
            }
        });
    }

    /// Waits for every background refresh started so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(
            &mut *self.refreshes.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(joined) = pending.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "background refresh panicked");
            }
        }
    }

    /// One page of `username`'s repositories in remote order.
    ///
    /// # Errors
    ///
    /// Returns the terminal remote error, or `Unavailable` when offline
    /// without a cached page.
    pub async fn list_repositories(
        &self,
        username: &str,
        page: Option<&PageToken>,
    ) -> Result<Fetched<RepoPage>, RemoteError> {
        let key = CacheKey::repo_list(username, page);
        let username = username.to_string();
        let page = page.cloned();
        self.read_through(key, self.options.listing_ttl, move |remote| async move {
            remote
                .list_repositories(&username, page.as_ref())
                .await
                .map(Sourced::into_inner)
        })
        .await
    }

    /// Repositories of `username`, following page tokens until `limit` unique
    /// repositories are collected or the listing ends. Later duplicates of a
    /// full name are dropped.
    ///
    /// # Errors
    ///
    /// Fails with the first page error.
    pub async fn list_all_repositories(
        &self,
        username: &str,
        limit: Option<usize>,
    ) -> Result<Fetched<Vec<Repository>>, RemoteError> {
        let mut repositories = Vec::new();
        let mut names = HashSet::new();
        let mut tokens = HashSet::new();
        let mut freshness = Freshness::Fresh;
        let mut from_cache = false;
        let mut token: Option<PageToken> = None;

        while limit.is_none_or(|limit| repositories.len() < limit) {
            let page = self.list_repositories(username, token.as_ref()).await?;
            if page.is_stale() {
                freshness = Freshness::Stale;
            }
            from_cache |= page.from_cache;
            for repo in page.value.repositories {
                if names.insert(repo.full_name()) {
                    repositories.push(repo);
                }
            }
            match page.value.next_page_token {
                Some(next) if tokens.insert(next.clone()) => token = Some(next),
                Some(next) => {
                    warn!(username, token = %next, "page token repeated, stopping");
                    break;
                }
                None => break,
            }
        }

        if let Some(limit) = limit {
            repositories.truncate(limit);
        }
        debug!(username, count = repositories.len(), pages = tokens.len() + 1, "listed repositories");
        Ok(Fetched {
            value: repositories,
            freshness,
            from_cache,
        })
    }

    /// Default branch of `repo`, memoised for the session once fresh.
    ///
    /// # Errors
    ///
    /// `NotFound` when the repository is inaccessible.
    pub async fn resolve_default_branch(
        &self,
        repo: &RepoRef,
    ) -> Result<Fetched<String>, RemoteError> {
        if let Some(memo) = self
            .branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repo)
        {
            return Ok(memo.clone());
        }

        let owned = repo.clone();
        let fetched = self
            .read_through(
                CacheKey::default_branch(repo),
                self.options.listing_ttl,
                move |remote| async move {
                    remote
                        .resolve_default_branch(&owned)
                        .await
                        .map(Sourced::into_inner)
                },
            )
            .await?;

        if fetched.freshness.is_fresh() {
            self.branches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(repo.clone(), fetched.clone());
        }
        Ok(fetched)
    }

    async fn branch_or_default(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
    ) -> Result<String, RemoteError> {
        match branch {
            Some(branch) => Ok(branch.to_string()),
            None => Ok(self.resolve_default_branch(repo).await?.value),
        }
    }

    /// The whole tree of `branch` (default branch when `None`).
    ///
    /// # Errors
    ///
    /// Returns the terminal remote error, or `Unavailable` when offline
    /// without a cached tree.
    pub async fn get_tree(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
    ) -> Result<Fetched<Arc<RepoTree>>, RemoteError> {
        let branch = self.branch_or_default(repo, branch).await?;
        let memo_key = (repo.clone(), branch.clone());
        if let Some(tree) = self
            .trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&memo_key)
        {
            return Ok(Fetched {
                value: Arc::clone(tree),
                freshness: Freshness::Fresh,
                from_cache: true,
            });
        }

        let owned = repo.clone();
        let fetch_branch = branch.clone();
        let entries = self
            .read_through(
                CacheKey::tree(repo, &branch),
                self.options.tree_ttl,
                move |remote| async move {
                    remote
                        .fetch_tree(&owned, &fetch_branch)
                        .await
                        .map(Sourced::into_inner)
                },
            )
            .await?;

        let fetched = entries.map(|entries| Arc::new(RepoTree::from_entries(entries)));
        info!(
            repo = %repo,
            branch = %branch,
            nodes = fetched.value.len(),
            stale = fetched.is_stale(),
            "loaded tree"
        );
        if fetched.freshness.is_fresh() {
            self.trees
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(memo_key, Arc::clone(&fetched.value));
        }
        Ok(fetched)
    }

    /// One page of the direct children of `path` (root is `""`).
    ///
    /// # Errors
    ///
    /// `NotFound` when `path` is not a directory of the tree.
    pub async fn get_tree_page(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        path: &str,
        token: Option<&PageToken>,
    ) -> Result<Fetched<TreePage>, RemoteError> {
        let tree = self.get_tree(repo, branch).await?;
        let path = normalize_path(path).unwrap_or_default();
        let page = tree
            .value
            .page(&path, token.map(PageToken::as_str), self.options.tree_page_size)
            .ok_or_else(|| RemoteError::not_found(format!("{repo}/{path}")))?;
        Ok(Fetched {
            value: page,
            freshness: tree.freshness,
            from_cache: tree.from_cache,
        })
    }

    /// Buffered file content.
    ///
    /// # Errors
    ///
    /// `NotFound`, `TooLarge`, `RateLimited`, `NetworkError`, or
    /// `Unavailable` when offline without a cached copy.
    pub async fn get_file_content(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        path: &str,
    ) -> Result<Fetched<Vec<u8>>, RemoteError> {
        let branch = self.branch_or_default(repo, branch).await?;
        let key = CacheKey::content(repo, &branch, path);
        let owned = repo.clone();
        let path = path.to_string();
        self.read_through(key, self.options.content_ttl, move |remote| async move {
            remote.fetch_file_content(&owned, &branch, &path).await
        })
        .await
    }

    /// Downloads the given nodes under `destination`.
    ///
    /// # Errors
    ///
    /// Only fails when the branch cannot be resolved; per-file failures are
    /// reported in the [`DownloadReport`].
    pub async fn download_files(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        nodes: &[TreeNode],
        destination: &Path,
        cancel: &CancellationToken,
        progress: &dyn DownloadProgress,
    ) -> Result<DownloadReport, RemoteError> {
        let branch = self.branch_or_default(repo, branch).await?;
        self.monitor.ensure_recent(self.options.probe_max_age).await;
        let source = Arc::new(RepoContent {
            remote: Arc::clone(&self.remote),
            cache: Arc::clone(&self.cache),
            monitor: Arc::clone(&self.monitor),
            repo: repo.clone(),
            branch,
        });
        Ok(self
            .scheduler
            .run(source, nodes, destination, cancel, progress)
            .await)
    }

    /// Downloads files and whole directories by path. An empty selection
    /// downloads the entire repository.
    ///
    /// # Errors
    ///
    /// `NotFound` when a selected path is not in the tree, plus any error of
    /// [`RepoBrowser::get_tree`].
    pub async fn download_paths(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        paths: &[String],
        destination: &Path,
        cancel: &CancellationToken,
        progress: &dyn DownloadProgress,
    ) -> Result<DownloadReport, RemoteError> {
        let branch = self.branch_or_default(repo, branch).await?;
        let tree = self.get_tree(repo, Some(&branch)).await?.value;

        let mut nodes = Vec::new();
        if paths.is_empty() {
            nodes.extend(tree.walk("").cloned());
        }
        for raw in paths {
            let path = normalize_path(raw).unwrap_or_default();
            if path.is_empty() {
                nodes.extend(tree.walk("").cloned());
                continue;
            }
            let node = tree
                .get(&path)
                .ok_or_else(|| RemoteError::not_found(format!("{repo}/{path}")))?;
            nodes.push(node.clone());
            if node.is_dir() {
                nodes.extend(tree.walk(&path).cloned());
            }
        }

        self.download_files(repo, Some(&branch), &nodes, destination, cancel, progress)
            .await
    }

    /// Drops every cached entry and session memo for `repo`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Directory` if the cache cannot be scanned.
    pub async fn refresh(&self, repo: &RepoRef) -> Result<usize, CacheError> {
        self.branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(repo);
        self.trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(memo_repo, _), _| memo_repo != repo);
        let removed = self.cache.invalidate(&CacheKey::repo_prefix(repo)).await?;
        info!(repo = %repo, removed, "refreshed repository");
        Ok(removed)
    }
}

/// Content for one download batch: cache first, then the remote stream.
struct RepoContent {
    remote: Arc<dyn RemoteSource>,
    cache: Arc<CacheStore>,
    monitor: Arc<ConnectivityMonitor>,
    repo: RepoRef,
    branch: String,
}

impl ContentSource for RepoContent {
    fn stream_into<'a>(
        &'a self,
        path: &'a str,
        sink: &'a mut Sink<'_>,
    ) -> BoxFuture<'a, Result<u64, RemoteError>> {
        Box::pin(async move {
            let offline = self.monitor.current_state().is_offline();
            let key = CacheKey::content(&self.repo, &self.branch, path);
            if let Some(hit) = self.cache.get(&key).await
                && (offline || hit.freshness.is_fresh())
            {
                sink.write_all(&hit.payload)
                    .await
                    .map_err(|source| RemoteError::Io {
                        path: path.to_string(),
                        source,
                    })?;
                return Ok(hit.payload.len() as u64);
            }
            if offline {
                return Err(RemoteError::unavailable(path));
            }
            self.remote
                .stream_file(&self.repo, &self.branch, path, sink)
                .await
        })
    }
}

#[cfg(test)]
mod tests;
