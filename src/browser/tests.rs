// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use futures_util::future::BoxFuture;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::{BrowserOptions, RepoBrowser};
use crate::cache::{CacheKey, CacheStore, Freshness};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::download::{DownloadScheduler, NoProgress, TaskState};
use crate::error::{ErrorKind, RemoteError};
use crate::remote::{
    PageToken, RateLimitInfo, RemoteSource, RepoPage, RepoRef, Repository, RetryPolicy, Sink,
    Sourced,
};
use crate::tree::RawEntry;

const HOUR: Duration = Duration::from_secs(3600);

/// In-memory remote that records every call.
#[derive(Default)]
struct FakeRemote {
    /// Keyed by page token, `None` for the first page.
    pages: HashMap<Option<String>, (Vec<&'static str>, Option<&'static str>)>,
    branch: Option<&'static str>,
    tree: Vec<RawEntry>,
    files: HashMap<&'static str, &'static str>,
    calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn content(&self, path: &str) -> Result<&'static str, RemoteError> {
        self.files
            .get(path)
            .copied()
            .ok_or_else(|| RemoteError::not_found(path))
    }
}

impl RemoteSource for FakeRemote {
    fn list_repositories<'a>(
        &'a self,
        username: &'a str,
        page: Option<&'a PageToken>,
    ) -> BoxFuture<'a, Result<Sourced<RepoPage>, RemoteError>> {
        let token = page.map(|p| p.as_str().to_string());
        self.record(format!("list:{}", token.as_deref().unwrap_or("-")));
        let result = self
            .pages
            .get(&token)
            .map(|(names, next)| {
                Sourced::Api(RepoPage {
                    repositories: names.iter().map(|n| Repository::named(username, *n)).collect(),
                    next_page_token: next.map(PageToken::new),
                    rate_limit: RateLimitInfo::default(),
                })
            })
            .ok_or_else(|| RemoteError::not_found(username));
        Box::pin(async move { result })
    }

    fn resolve_default_branch<'a>(
        &'a self,
        repo: &'a RepoRef,
    ) -> BoxFuture<'a, Result<Sourced<String>, RemoteError>> {
        self.record("branch".to_string());
        let result = self
            .branch
            .map(|b| Sourced::Scraped(b.to_string()))
            .ok_or_else(|| RemoteError::not_found(repo.to_string()));
        Box::pin(async move { result })
    }

    fn fetch_tree<'a>(
        &'a self,
        _repo: &'a RepoRef,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<Sourced<Vec<RawEntry>>, RemoteError>> {
        self.record(format!("tree:{branch}"));
        let tree = self.tree.clone();
        Box::pin(async move { Ok(Sourced::Api(tree)) })
    }

    fn fetch_file_content<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _branch: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, RemoteError>> {
        self.record(format!("content:{path}"));
        let result = self.content(path).map(|c| c.as_bytes().to_vec());
        Box::pin(async move { result })
    }

    fn stream_file<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _branch: &'a str,
        path: &'a str,
        sink: &'a mut Sink<'_>,
    ) -> BoxFuture<'a, Result<u64, RemoteError>> {
        self.record(format!("stream:{path}"));
        Box::pin(async move {
            let content = self.content(path)?;
            sink.write_all(content.as_bytes()).await.unwrap();
            Ok(content.len() as u64)
        })
    }
}

fn octo_remote() -> FakeRemote {
    FakeRemote {
        pages: HashMap::from([
            (None, (vec!["a", "b"], Some("2"))),
            (Some("2".to_string()), (vec!["c", "a"], None)),
        ]),
        branch: Some("main"),
        tree: vec![
            RawEntry::file("src/lib/x.rs", Some(10)),
            RawEntry::file("README.md", Some(5)),
            RawEntry::file("src/main.rs", Some(7)),
        ],
        files: HashMap::from([
            ("src/lib/x.rs", "pub fn x() {}"),
            ("README.md", "# hi"),
            ("src/main.rs", "fn main() {}"),
        ]),
        ..FakeRemote::default()
    }
}

struct Harness {
    _dir: TempDir,
    remote: Arc<FakeRemote>,
    cache: Arc<CacheStore>,
    browser: RepoBrowser,
}

async fn harness(remote: FakeRemote, state: ConnectivityState) -> Harness {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(CacheStore::open(dir.path().join("cache")).await.unwrap());
    let remote = Arc::new(remote);
    let browser = RepoBrowser::new(
        Arc::new(ConnectivityMonitor::pinned(state)),
        Arc::clone(&remote) as Arc<dyn RemoteSource>,
        Arc::clone(&cache),
        DownloadScheduler::builder()
            .workers(2)
            .retry(RetryPolicy::immediate())
            .build(),
        BrowserOptions::builder().tree_page_size(1).build(),
    );
    Harness {
        _dir: dir,
        remote,
        cache,
        browser,
    }
}

fn repo() -> RepoRef {
    RepoRef::new("octo", "r")
}

fn names(repos: &[Repository]) -> Vec<&str> {
    repos.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn test_full_listing_follows_tokens_in_order() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;

    let all = h.browser.list_all_repositories("octo", None).await.unwrap();
    assert_eq!(names(&all.value), ["a", "b", "c"]);
    assert_eq!(all.freshness, Freshness::Fresh);
    assert!(!all.from_cache);
    assert_eq!(h.remote.calls(), ["list:-", "list:2"]);
}

#[tokio::test]
async fn test_limited_listing_counts_unique_repositories() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;

    // Page two repeats "a"; the limit is reached by unique names only.
    let three = h.browser.list_all_repositories("octo", Some(3)).await.unwrap();
    assert_eq!(names(&three.value), ["a", "b", "c"]);

    let two = h.browser.list_all_repositories("octo", Some(2)).await.unwrap();
    assert_eq!(names(&two.value), ["a", "b"]);
    assert_eq!(h.remote.calls(), ["list:-", "list:2"]);
}

#[tokio::test]
async fn test_fresh_hit_short_circuits_remote() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;

    let first = h.browser.list_repositories("octo", None).await.unwrap();
    let second = h.browser.list_repositories("octo", None).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.freshness, Freshness::Fresh);
    assert_eq!(second.value, first.value);
    assert_eq!(h.remote.calls(), ["list:-"]);
}

#[tokio::test]
async fn test_stale_hit_returns_immediately_and_refreshes() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let key = CacheKey::repo_list("octo", None);
    let old = RepoPage {
        repositories: vec![Repository::named("octo", "old")],
        next_page_token: None,
        rate_limit: RateLimitInfo::default(),
    };
    h.cache
        .put_at(&key, &serde_json::to_vec(&old).unwrap(), HOUR, SystemTime::now() - 2 * HOUR)
        .await
        .unwrap();

    let served = h.browser.list_repositories("octo", None).await.unwrap();
    assert_eq!(names(&served.value.repositories), ["old"]);
    assert_eq!(served.freshness, Freshness::Stale);

    h.browser.settle().await;
    assert_eq!(h.remote.calls(), ["list:-"]);
    let refreshed = h.browser.list_repositories("octo", None).await.unwrap();
    assert_eq!(names(&refreshed.value.repositories), ["a", "b"]);
    assert_eq!(refreshed.freshness, Freshness::Fresh);
}

#[tokio::test]
async fn test_offline_serves_cache_flagged_by_ttl() {
    let h = harness(octo_remote(), ConnectivityState::Offline).await;
    let repo = repo();
    h.cache
        .put(&CacheKey::default_branch(&repo), b"trunk", HOUR)
        .await
        .unwrap();
    h.cache
        .put_at(&CacheKey::tree(&repo, "trunk"), b"[]", HOUR, SystemTime::now() - 2 * HOUR)
        .await
        .unwrap();

    let branch = h.browser.resolve_default_branch(&repo).await.unwrap();
    assert_eq!(branch.value, "trunk");
    assert_eq!(branch.freshness, Freshness::Fresh);
    assert!(branch.from_cache);

    let tree = h.browser.get_tree(&repo, None).await.unwrap();
    assert!(tree.value.is_empty());
    assert_eq!(tree.freshness, Freshness::Stale);

    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_offline_without_entry_is_unavailable() {
    let h = harness(octo_remote(), ConnectivityState::Offline).await;
    let err = h.browser.list_repositories("octo", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_tree_synthesizes_directories_and_resolves_branch_once() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let repo = repo();

    let tree = h.browser.get_tree(&repo, None).await.unwrap().value;
    let walk: Vec<&str> = tree.walk("").map(|n| n.path.as_str()).collect();
    assert_eq!(walk, ["src", "src/lib", "src/lib/x.rs", "src/main.rs", "README.md"]);
    assert!(tree.get("src/lib").unwrap().implicit);

    h.browser.get_tree(&repo, None).await.unwrap();
    h.browser.get_file_content(&repo, None, "README.md").await.unwrap();
    assert_eq!(h.remote.calls(), ["branch", "tree:main", "content:README.md"]);
}

#[tokio::test]
async fn test_tree_pages_are_local() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let repo = repo();

    let first = h.browser.get_tree_page(&repo, Some("main"), "src", None).await.unwrap();
    assert_eq!(first.value.nodes[0].name(), "lib");
    let token = PageToken::new(first.value.next_page_token.unwrap());

    let second = h
        .browser
        .get_tree_page(&repo, Some("main"), "src/", Some(&token))
        .await
        .unwrap();
    assert_eq!(second.value.nodes[0].name(), "main.rs");
    assert_eq!(second.value.next_page_token, None);

    let err = h
        .browser
        .get_tree_page(&repo, Some("main"), "README.md", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.remote.calls(), ["tree:main"]);
}

#[tokio::test]
async fn test_file_content_not_found_is_surfaced() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let err = h
        .browser
        .get_file_content(&repo(), Some("main"), "missing.txt")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_download_directory_prefers_cached_content() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let repo = repo();
    h.cache
        .put(&CacheKey::content(&repo, "main", "src/main.rs"), b"cached", HOUR)
        .await
        .unwrap();
    let out = TempDir::new().unwrap();

    let report = h
        .browser
        .download_paths(
            &repo,
            Some("main"),
            &["src".to_string()],
            out.path(),
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.entries.len(), 2);
    assert_eq!(
        std::fs::read_to_string(out.path().join("src/main.rs")).unwrap(),
        "cached"
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("src/lib/x.rs")).unwrap(),
        "pub fn x() {}"
    );
    let mut calls = h.remote.calls();
    calls.sort();
    assert_eq!(calls, ["stream:src/lib/x.rs", "tree:main"]);
}

#[tokio::test]
async fn test_download_unknown_path_is_not_found() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let out = TempDir::new().unwrap();
    let err = h
        .browser
        .download_paths(
            &repo(),
            Some("main"),
            &["nope".to_string()],
            out.path(),
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_offline_download_without_cache_fails_per_file() {
    let h = harness(octo_remote(), ConnectivityState::Offline).await;
    let repo = repo();
    let tree = serde_json::to_vec(&[RawEntry::file("a.txt", None)]).unwrap();
    h.cache.put(&CacheKey::tree(&repo, "main"), &tree, HOUR).await.unwrap();
    let out = TempDir::new().unwrap();

    let report = h
        .browser
        .download_paths(&repo, Some("main"), &[], out.path(), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    let entry = report.get("a.txt").unwrap();
    assert_eq!(entry.state, TaskState::FailedFatal);
    assert_eq!(entry.error, Some(ErrorKind::Unavailable));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_refresh_drops_repository_entries_and_memo() {
    let h = harness(octo_remote(), ConnectivityState::Online).await;
    let repo = repo();
    h.browser.get_tree(&repo, None).await.unwrap();

    let removed = h.browser.refresh(&repo).await.unwrap();
    assert_eq!(removed, 2);

    h.browser.get_tree(&repo, None).await.unwrap();
    assert_eq!(h.remote.calls(), ["branch", "tree:main", "branch", "tree:main"]);
}
