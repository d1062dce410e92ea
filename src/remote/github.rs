// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! GitHub implementation of [`RemoteSource`].
//!
//! ```text
//! get(host, url)
//!   send ---> 429 / 403+limit  -> on_rate_limit()     -> sleep, resend
//!        ---> transport / 5xx  -> on_network_failure() -> sleep, resend
//!        ---> 404              -> NotFound
//!        ---> other non-2xx    -> Http
//!        ---> 2xx              -> Response
//!
//! API error (RateLimited | Http) --scrape_fallback--> HTML pages
//! ```

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use bon::Builder;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::retry::{self, RetryDecision, RetryPolicy};
use super::scrape;
use super::{PageToken, RemoteSource, RepoPage, RepoRef, Repository, Sink, Sourced};
use crate::error::RemoteError;
use crate::tree::{NodeKind, RawEntry};

/// Base URLs of the three hosts the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub web: String,
    pub raw: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: "https://api.github.com".to_string(),
            web: "https://github.com".to_string(),
            raw: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

/// Client settings. Built by the command layer from configuration.
#[derive(Debug, Clone, Builder)]
pub struct RemoteOptions {
    #[builder(default)]
    pub endpoints: Endpoints,
    /// Bearer token attached to API and raw-content requests.
    pub token: Option<String>,
    /// Repositories per listing page (1-100).
    #[builder(default = 100)]
    pub page_size: u32,
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
    /// Above this, `fetch_file_content` fails with `TooLarge`.
    #[builder(default = 10 * 1024 * 1024)]
    pub max_in_memory_bytes: u64,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Fall back to HTML pages when the API is rate limited or failing.
    #[builder(default = true)]
    pub scrape_fallback: bool,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    Api,
    Web,
    Raw,
}

/// HTTP client for github.com with HTML scraping fallback.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    options: RemoteOptions,
}

impl GitHubClient {
    /// # Errors
    ///
    /// Returns `RemoteError::Network` if the HTTP client cannot be built.
    pub fn new(options: RemoteOptions) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(concat!("gitbrowse-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| RemoteError::Network {
                url: options.endpoints.api.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, options })
    }

    #[must_use]
    pub const fn options(&self) -> &RemoteOptions {
        &self.options
    }

    fn page_size(&self) -> u32 {
        self.options.page_size.clamp(1, 100)
    }

    fn request(&self, host: Host, url: &str) -> RequestBuilder {
        let mut request = self.http.get(url);
        if host == Host::Api {
            request = request
                .header(ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
        }
        if host != Host::Web
            && let Some(token) = &self.options.token
        {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Sends a GET, retrying rate limits and transport failures per policy.
    async fn get(&self, host: Host, url: &str, resource: &str) -> Result<Response, RemoteError> {
        let policy = &self.options.retry;
        let mut rate_limited = 0u32;
        let mut failures = 0u32;

        loop {
            let delay = match self.request(host, url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if let Some(signal) = retry::rate_limit_signal(status, response.headers()) {
                        rate_limited += 1;
                        match policy.on_rate_limit(rate_limited, signal.wait) {
                            RetryDecision::Retry(delay) => {
                                warn!(url, attempt = rate_limited, ?delay, "rate limited, backing off");
                                delay
                            }
                            RetryDecision::GiveUp => {
                                return Err(RemoteError::RateLimited {
                                    url: url.to_string(),
                                    attempts: rate_limited,
                                });
                            }
                        }
                    } else if status.is_server_error() {
                        failures += 1;
                        match policy.on_network_failure(failures) {
                            RetryDecision::Retry(delay) => {
                                debug!(url, %status, failure = failures, ?delay, "server error, retrying");
                                delay
                            }
                            RetryDecision::GiveUp => {
                                return Err(RemoteError::Http {
                                    status: status.as_u16(),
                                    url: url.to_string(),
                                });
                            }
                        }
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(RemoteError::not_found(resource));
                    } else if !status.is_success() {
                        return Err(RemoteError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    } else {
                        return Ok(response);
                    }
                }
                Err(err) => {
                    failures += 1;
                    match policy.on_network_failure(failures) {
                        RetryDecision::Retry(delay) => {
                            debug!(url, failure = failures, ?delay, error = %err, "request failed, retrying");
                            delay
                        }
                        RetryDecision::GiveUp => {
                            return Err(RemoteError::Network {
                                url: url.to_string(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
    ) -> Result<(T, HeaderMap), RemoteError> {
        let response = self.get(Host::Api, url, resource).await?;
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| RemoteError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let value = serde_json::from_slice(&body).map_err(|e| RemoteError::decode(url, e))?;
        Ok((value, headers))
    }

    async fn get_html(&self, url: &str, resource: &str) -> Result<String, RemoteError> {
        let response = self.get(Host::Web, url, resource).await?;
        response.text().await.map_err(|e| RemoteError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn should_scrape(&self, err: &RemoteError) -> bool {
        self.options.scrape_fallback
            && matches!(err, RemoteError::RateLimited { .. } | RemoteError::Http { .. })
    }

    fn raw_url(&self, repo: &RepoRef, branch: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.options.endpoints.raw,
            encode_path(&repo.owner),
            encode_path(&repo.name),
            encode_path(branch),
            encode_path(path)
        )
    }

    // --- listings ---

    async fn list_repositories_impl(
        &self,
        username: &str,
        page: Option<&PageToken>,
    ) -> Result<Sourced<RepoPage>, RemoteError> {
        let number = page_number(page)?;
        let page_size = self.page_size();
        let url = format!(
            "{}/users/{}/repos?per_page={page_size}&page={number}&sort=updated",
            self.options.endpoints.api,
            encode_path(username)
        );
        let resource = format!("user {username}");

        match self.get_json::<Vec<ApiRepository>>(&url, &resource).await {
            Ok((repos, headers)) => {
                let next = match next_page_from_link(&headers)? {
                    LinkNext::Page(next) => Some(next),
                    LinkNext::Last => None,
                    LinkNext::Absent => (repos.len() >= page_size as usize).then_some(number + 1),
                };
                debug!(username, page = number, count = repos.len(), ?next, "listed repositories");
                Ok(Sourced::Api(RepoPage {
                    repositories: repos.into_iter().map(Repository::from).collect(),
                    next_page_token: next.map(|n| PageToken::new(n.to_string())),
                    rate_limit: retry::rate_limit_info(&headers),
                }))
            }
            Err(err) if self.should_scrape(&err) => {
                warn!(username, error = %err, "API listing failed, scraping profile page");
                self.scrape_repositories(username, number, &resource).await
            }
            Err(err) => Err(err),
        }
    }

    async fn scrape_repositories(
        &self,
        username: &str,
        number: u32,
        resource: &str,
    ) -> Result<Sourced<RepoPage>, RemoteError> {
        let web = &self.options.endpoints.web;
        let url = format!("{web}/{}?tab=repositories&page={number}", encode_path(username));
        let html = self.get_html(&url, resource).await?;
        let repositories = scrape::parse_repository_list(&html, username, web)?;
        // Profile pages have no total; an empty page ends the listing.
        let next = (!repositories.is_empty()).then(|| PageToken::new((number + 1).to_string()));
        Ok(Sourced::Scraped(RepoPage {
            repositories,
            next_page_token: next,
            rate_limit: super::RateLimitInfo::default(),
        }))
    }

    // --- default branch ---

    async fn resolve_default_branch_impl(
        &self,
        repo: &RepoRef,
    ) -> Result<Sourced<String>, RemoteError> {
        let url = format!(
            "{}/repos/{}/{}",
            self.options.endpoints.api,
            encode_path(&repo.owner),
            encode_path(&repo.name)
        );
        let resource = format!("repository {repo}");
        match self.get_json::<ApiRepoInfo>(&url, &resource).await {
            Ok((info, _)) => Ok(Sourced::Api(info.default_branch)),
            Err(err) if self.should_scrape(&err) => {
                warn!(%repo, error = %err, "API lookup failed, scraping repository page");
                let url = format!(
                    "{}/{}/{}",
                    self.options.endpoints.web,
                    encode_path(&repo.owner),
                    encode_path(&repo.name)
                );
                let html = self.get_html(&url, &resource).await?;
                let branch = scrape::parse_default_branch(&html)?.unwrap_or_else(|| {
                    warn!(%repo, "no branch selector on repository page, assuming 'main'");
                    "main".to_string()
                });
                Ok(Sourced::Scraped(branch))
            }
            Err(err) => Err(err),
        }
    }

    // --- trees ---

    async fn fetch_tree_impl(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Sourced<Vec<RawEntry>>, RemoteError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.options.endpoints.api,
            encode_path(&repo.owner),
            encode_path(&repo.name),
            encode_path(branch)
        );
        let resource = format!("branch {branch} of {repo}");
        match self.get_json::<ApiTree>(&url, &resource).await {
            Ok((tree, _)) if tree.truncated => {
                warn!(%repo, branch, "recursive tree truncated, crawling directories");
                self.crawl_contents(repo, branch, &resource).await.map(Sourced::Api)
            }
            Ok((tree, _)) => {
                let entries: Vec<RawEntry> =
                    tree.tree.into_iter().filter_map(ApiTreeEntry::into_raw).collect();
                info!(%repo, branch, entries = entries.len(), "fetched tree");
                Ok(Sourced::Api(entries))
            }
            Err(err) if self.should_scrape(&err) => {
                warn!(%repo, branch, error = %err, "API tree failed, scraping directory pages");
                self.scrape_tree(repo, branch, &resource).await.map(Sourced::Scraped)
            }
            Err(err) => Err(err),
        }
    }

    /// Breadth-first walk with the contents API, one request per directory.
    async fn crawl_contents(
        &self,
        repo: &RepoRef,
        branch: &str,
        resource: &str,
    ) -> Result<Vec<RawEntry>, RemoteError> {
        let mut entries = Vec::new();
        let mut queue = VecDeque::from([String::new()]);
        let mut visited = HashSet::new();

        while let Some(dir) = queue.pop_front() {
            if !visited.insert(dir.clone()) {
                continue;
            }
            let mut url = format!(
                "{}/repos/{}/{}/contents",
                self.options.endpoints.api,
                encode_path(&repo.owner),
                encode_path(&repo.name)
            );
            if !dir.is_empty() {
                url.push('/');
                url.push_str(&encode_path(&dir));
            }
            url.push_str("?ref=");
            url.push_str(&encode_path(branch));

            let (items, _) = self.get_json::<Vec<ApiContent>>(&url, resource).await?;
            for item in items {
                if let Some(entry) = item.into_raw() {
                    if entry.kind == NodeKind::Directory {
                        queue.push_back(entry.path.clone());
                    }
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    /// Breadth-first walk over HTML directory pages.
    async fn scrape_tree(
        &self,
        repo: &RepoRef,
        branch: &str,
        resource: &str,
    ) -> Result<Vec<RawEntry>, RemoteError> {
        let mut entries = Vec::new();
        let mut queue = VecDeque::from([String::new()]);
        let mut visited = HashSet::new();

        while let Some(dir) = queue.pop_front() {
            if !visited.insert(dir.clone()) {
                continue;
            }
            let mut url = format!(
                "{}/{}/{}/tree/{}",
                self.options.endpoints.web,
                encode_path(&repo.owner),
                encode_path(&repo.name),
                encode_path(branch)
            );
            if !dir.is_empty() {
                url.push('/');
                url.push_str(&encode_path(&dir));
            }
            let html = self.get_html(&url, resource).await?;
            for entry in scrape::parse_directory_listing(&html, repo, branch)? {
                if entry.kind == NodeKind::Directory {
                    queue.push_back(entry.path.clone());
                }
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    // --- content ---

    async fn fetch_file_content_impl(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        let limit = self.options.max_in_memory_bytes;
        let url = self.raw_url(repo, branch, path);
        let response = self.get(Host::Raw, &url, &format!("{path} in {repo}@{branch}")).await?;

        if let Some(size) = response.content_length()
            && size > limit
        {
            return Err(RemoteError::TooLarge {
                path: path.to_string(),
                size,
                limit,
            });
        }

        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RemoteError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;
            buffer.extend_from_slice(&chunk);
            if buffer.len() as u64 > limit {
                return Err(RemoteError::TooLarge {
                    path: path.to_string(),
                    size: buffer.len() as u64,
                    limit,
                });
            }
        }
        Ok(buffer)
    }

    async fn stream_file_impl(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
        sink: &mut Sink<'_>,
    ) -> Result<u64, RemoteError> {
        let url = self.raw_url(repo, branch, path);
        let response = self.get(Host::Raw, &url, &format!("{path} in {repo}@{branch}")).await?;

        let io_error = |source| RemoteError::Io {
            path: path.to_string(),
            source,
        };
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RemoteError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;
            sink.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        sink.flush().await.map_err(io_error)?;
        Ok(written)
    }
}

impl RemoteSource for GitHubClient {
    fn list_repositories<'a>(
        &'a self,
        username: &'a str,
        page: Option<&'a PageToken>,
    ) -> BoxFuture<'a, Result<Sourced<RepoPage>, RemoteError>> {
        Box::pin(self.list_repositories_impl(username, page))
    }

    fn resolve_default_branch<'a>(
        &'a self,
        repo: &'a RepoRef,
    ) -> BoxFuture<'a, Result<Sourced<String>, RemoteError>> {
        Box::pin(self.resolve_default_branch_impl(repo))
    }

    fn fetch_tree<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<Sourced<Vec<RawEntry>>, RemoteError>> {
        Box::pin(self.fetch_tree_impl(repo, branch))
    }

    fn fetch_file_content<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, RemoteError>> {
        Box::pin(self.fetch_file_content_impl(repo, branch, path))
    }

    fn stream_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        path: &'a str,
        sink: &'a mut Sink<'_>,
    ) -> BoxFuture<'a, Result<u64, RemoteError>> {
        Box::pin(self.stream_file_impl(repo, branch, path, sink))
    }
}

// --- wire shapes ---

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    owner: ApiOwner,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    clone_url: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl From<ApiRepository> for Repository {
    fn from(api: ApiRepository) -> Self {
        Self {
            owner: api.owner.login,
            name: api.name,
            default_branch: api.default_branch,
            star_count: api.stargazers_count,
            fork_count: api.forks_count,
            is_private: api.private,
            description: api.description,
            language: api.language,
            html_url: api.html_url,
            clone_url: api.clone_url,
            updated_at: api.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct ApiTree {
    #[serde(default)]
    tree: Vec<ApiTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ApiTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

impl ApiTreeEntry {
    /// Submodules (`commit`) are not part of the browsable tree.
    fn into_raw(self) -> Option<RawEntry> {
        match self.kind.as_str() {
            "blob" => Some(RawEntry::file(self.path, self.size)),
            "tree" => Some(RawEntry::directory(self.path)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

impl ApiContent {
    fn into_raw(self) -> Option<RawEntry> {
        match self.kind.as_str() {
            "file" | "symlink" => Some(RawEntry::file(self.path, self.size)),
            "dir" => Some(RawEntry::directory(self.path)),
            _ => None,
        }
    }
}

// --- helpers ---

fn page_number(page: Option<&PageToken>) -> Result<u32, RemoteError> {
    match page {
        None => Ok(1),
        Some(token) => token
            .as_str()
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                RemoteError::decode("page token", format!("'{token}' is not a page number"))
            }),
    }
}

/// What a `Link` header says about the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkNext {
    /// No `Link` header at all.
    Absent,
    /// Header present without `rel="next"`.
    Last,
    Page(u32),
}

pub(crate) fn next_page_from_link(headers: &HeaderMap) -> Result<LinkNext, RemoteError> {
    let Some(link) = headers.get("link").and_then(|v| v.to_str().ok()) else {
        return Ok(LinkNext::Absent);
    };
    let next = Regex::new(r#"<([^>]*)>\s*;\s*rel="next""#)
        .map_err(|e| RemoteError::decode("link header pattern", e))?;
    let page = Regex::new(r"[?&]page=(\d+)")
        .map_err(|e| RemoteError::decode("page parameter pattern", e))?;

    Ok(next
        .captures(link)
        .and_then(|c| c.get(1))
        .and_then(|url| page.captures(url.as_str()))
        .and_then(|c| c.get(1))
        .and_then(|n| n.as_str().parse().ok())
        .map_or(LinkNext::Last, LinkNext::Page))
}

/// Percent-escapes everything outside the unreserved set, keeping `/`.
pub(crate) fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
