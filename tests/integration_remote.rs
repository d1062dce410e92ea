// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for the GitHub client using wiremock.
//!
//! Covers:
//! - Listing pagination through `Link` headers
//! - `NotFound` mapping
//! - Rate-limit backoff and exhaustion
//! - HTML scraping fallback
//! - Tree fetching, including the truncated-tree crawl
//! - In-memory size limit and token handling

use gitbrowse_rs::error::RemoteError;
use gitbrowse_rs::remote::{
    Endpoints, GitHubClient, PageToken, RemoteOptions, RemoteSource, RepoRef, RetryPolicy, Sourced,
};
use gitbrowse_rs::tree::{NodeKind, RawEntry};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, page_size: u32, scrape: bool) -> GitHubClient {
    let uri = server.uri();
    GitHubClient::new(
        RemoteOptions::builder()
            .endpoints(Endpoints {
                api: uri.clone(),
                web: uri.clone(),
                raw: uri,
            })
            .page_size(page_size)
            .retry(RetryPolicy::immediate())
            .scrape_fallback(scrape)
            .build(),
    )
    .expect("client")
}

fn repo_json(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "owner": { "login": "octo" },
        "default_branch": "main",
        "stargazers_count": 7,
        "forks_count": 1,
        "private": false,
        "description": format!("{name} repository"),
    })
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_listing_follows_link_header() {
    let server = MockServer::start().await;
    let next = format!(
        "<{}/users/octo/repos?per_page=2&page=2>; rel=\"next\"",
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/users/octo/repos"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", next.as_str())
                .insert_header("x-ratelimit-limit", "60")
                .insert_header("x-ratelimit-remaining", "58")
                .set_body_json(json!([repo_json("a"), repo_json("b")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/octo/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("c")])))
        .mount(&server)
        .await;

    let client = client(&server, 2, false);

    let first = client.list_repositories("octo", None).await.unwrap();
    assert!(!first.is_scraped());
    let first = first.into_inner();
    let names: Vec<_> = first.repositories.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(first.next_page_token, Some(PageToken::new("2")));
    assert_eq!(first.rate_limit.remaining, Some(58));
    assert_eq!(first.repositories[0].star_count, 7);

    let second = client
        .list_repositories("octo", first.next_page_token.as_ref())
        .await
        .unwrap()
        .into_inner();
    let names: Vec<_> = second.repositories.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["c"]);
    assert!(second.next_page_token.is_none());
}

#[tokio::test]
async fn test_unknown_repository_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 100, true)
        .resolve_default_branch(&RepoRef::new("octo", "missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::NotFound { .. }), "got {err:?}");
}

// =============================================================================
// Rate limits
// =============================================================================

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "default_branch": "trunk" })))
        .mount(&server)
        .await;

    let branch = client(&server, 100, false)
        .resolve_default_branch(&RepoRef::new("octo", "hello"))
        .await
        .unwrap();
    assert_eq!(branch, Sourced::Api("trunk".to_string()));
}

#[tokio::test]
async fn test_rate_limit_exhausted_after_five_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "0"),
        )
        .expect(5)
        .mount(&server)
        .await;

    let err = client(&server, 100, false)
        .resolve_default_branch(&RepoRef::new("octo", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::RateLimited { attempts: 5, .. }), "got {err:?}");
}

// =============================================================================
// Scraping fallback
// =============================================================================

const PROFILE_PAGE: &str = r#"
<html><body><ul>
  <li><h3 class="wb-break-all"><a href="/octo/alpha">alpha</a></h3>
      <a href="/octo/alpha/stargazers">3</a></li>
  <li><h3 class="wb-break-all"><a href="/octo/beta">beta</a></h3></li>
</ul></body></html>
"#;

#[tokio::test]
async fn test_listing_falls_back_to_profile_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octo/repos"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/octo"))
        .and(query_param("tab", "repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_PAGE))
        .mount(&server)
        .await;

    let page = client(&server, 100, true)
        .list_repositories("octo", None)
        .await
        .unwrap();
    assert!(page.is_scraped());
    let page = page.into_inner();
    let names: Vec<_> = page.repositories.iter().map(|r| r.full_name()).collect();
    assert_eq!(names, ["octo/alpha", "octo/beta"]);
    assert_eq!(page.repositories[0].star_count, 3);
    assert_eq!(page.next_page_token, Some(PageToken::new("2")));
}

#[tokio::test]
async fn test_not_found_is_never_scraped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost/repos"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, 100, true)
        .list_repositories("ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::NotFound { .. }));
}

// =============================================================================
// Trees and content
// =============================================================================

#[tokio::test]
async fn test_fetch_tree_skips_submodules() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/trees/main"))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                { "path": "src", "type": "tree" },
                { "path": "src/lib.rs", "type": "blob", "size": 120 },
                { "path": "vendor/dep", "type": "commit" }
            ],
            "truncated": false
        })))
        .mount(&server)
        .await;

    let entries = client(&server, 100, false)
        .fetch_tree(&RepoRef::new("octo", "hello"), "main")
        .await
        .unwrap()
        .into_inner();
    assert_eq!(
        entries,
        [
            RawEntry::directory("src"),
            RawEntry::file("src/lib.rs", Some(120)),
        ]
    );
}

#[tokio::test]
async fn test_truncated_tree_is_crawled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/big/git/trees/main"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "tree": [], "truncated": true })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/big/contents"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "path": "docs", "type": "dir" },
            { "path": "README.md", "type": "file", "size": 5 }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/big/contents/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "path": "docs/guide.md", "type": "file", "size": 9 }
        ])))
        .mount(&server)
        .await;

    let entries = client(&server, 100, false)
        .fetch_tree(&RepoRef::new("octo", "big"), "main")
        .await
        .unwrap()
        .into_inner();
    let kinds: Vec<_> = entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
    assert_eq!(
        kinds,
        [
            ("docs", NodeKind::Directory),
            ("README.md", NodeKind::File),
            ("docs/guide.md", NodeKind::File),
        ]
    );
}

#[tokio::test]
async fn test_file_content_with_token_and_size_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/octo/hello/main/README.md"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let endpoints = Endpoints {
        api: uri.clone(),
        web: uri.clone(),
        raw: uri,
    };
    let with_token = GitHubClient::new(
        RemoteOptions::builder()
            .endpoints(endpoints.clone())
            .token("s3cret".to_string())
            .retry(RetryPolicy::immediate())
            .build(),
    )
    .unwrap();
    let repo = RepoRef::new("octo", "hello");

    let content = with_token
        .fetch_file_content(&repo, "main", "README.md")
        .await
        .unwrap();
    assert_eq!(content, b"hello");

    let tiny = GitHubClient::new(
        RemoteOptions::builder()
            .endpoints(endpoints)
            .token("s3cret".to_string())
            .max_in_memory_bytes(4)
            .retry(RetryPolicy::immediate())
            .build(),
    )
    .unwrap();
    let err = tiny
        .fetch_file_content(&repo, "main", "README.md")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::TooLarge { limit: 4, .. }), "got {err:?}");
}

fn directory_page(rows: &[(&str, bool)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(href, directory)| {
            let icon = if *directory { "icon-directory" } else { "octicon-file" };
            format!(
                r#"<tr class="react-directory-row"><td><svg class="octicon {icon}"></svg></td><td><a class="Link--primary" href="{href}">x</a></td></tr>"#
            )
        })
        .collect();
    format!("<html><body><table><tbody>{rows}</tbody></table></body></html>")
}

#[tokio::test]
async fn test_rate_limited_tree_is_scraped_with_same_entries() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/trees/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                { "path": "src", "type": "tree" },
                { "path": "README.md", "type": "blob", "size": 5 },
                { "path": "src/lib.rs", "type": "blob", "size": 120 }
            ],
            "truncated": false
        })))
        .mount(&api)
        .await;

    let limited = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/trees/main"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "0"),
        )
        .mount(&limited)
        .await;
    // Links carry the canonical owner/name spelling.
    Mock::given(method("GET"))
        .and(path("/octo/hello/tree/main"))
        .respond_with(ResponseTemplate::new(200).set_body_string(directory_page(&[
            ("/Octo/Hello/tree/main/src", true),
            ("/Octo/Hello/blob/main/README.md", false),
        ])))
        .expect(1)
        .mount(&limited)
        .await;
    Mock::given(method("GET"))
        .and(path("/octo/hello/tree/main/src"))
        .respond_with(ResponseTemplate::new(200).set_body_string(directory_page(&[(
            "/Octo/Hello/blob/main/src/lib.rs",
            false,
        )])))
        .expect(1)
        .mount(&limited)
        .await;

    let repo = RepoRef::new("octo", "hello");
    let from_api = client(&api, 100, true).fetch_tree(&repo, "main").await.unwrap();
    let scraped = client(&limited, 100, true).fetch_tree(&repo, "main").await.unwrap();
    assert!(!from_api.is_scraped());
    assert!(scraped.is_scraped());

    let shape = |entries: Vec<RawEntry>| -> Vec<(String, NodeKind)> {
        entries.into_iter().map(|e| (e.path, e.kind)).collect()
    };
    let scraped = shape(scraped.into_inner());
    assert_eq!(scraped, shape(from_api.into_inner()));
    assert_eq!(
        scraped,
        [
            ("src".to_string(), NodeKind::Directory),
            ("README.md".to_string(), NodeKind::File),
            ("src/lib.rs".to_string(), NodeKind::File),
        ]
    );
}
