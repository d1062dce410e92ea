// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTML parsing for the scraping fallback.
//!
//! Every function here is pure: the client fetches pages, these turn them
//! into the same shapes the JSON API produces.

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};

use super::{RepoRef, Repository};
use crate::error::RemoteError;
use crate::tree::RawEntry;

fn selector(css: &str) -> Result<Selector, RemoteError> {
    Selector::parse(css).map_err(|e| RemoteError::decode(format!("selector '{css}'"), e))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parses counts as rendered on profile pages: `1,234`, `1.2k`, `3m`.
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    let token = text.split_whitespace().next()?.replace(',', "").to_lowercase();
    let (number, multiplier) = match token.chars().last()? {
        'k' => (&token[..token.len() - 1], 1_000.0),
        'm' => (&token[..token.len() - 1], 1_000_000.0),
        _ => (token.as_str(), 1.0),
    };
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (value * multiplier).round() as u64;
    Some(count)
}

/// Repositories listed on a `?tab=repositories` profile page, in page order.
///
/// An empty result means the listing has no further pages.
///
/// # Errors
///
/// Returns `RemoteError::Decode` only if a selector fails to compile.
pub fn parse_repository_list(
    html: &str,
    owner: &str,
    web_base: &str,
) -> Result<Vec<Repository>, RemoteError> {
    let document = Html::parse_document(html);
    let names = selector("h3.wb-break-all a")?;
    let stars = counts_by_repo(&document, &selector(r#"a[href$="/stargazers"]"#)?, "/stargazers");
    let forks = counts_by_repo(&document, &selector(r#"a[href$="/forks"]"#)?, "/forks");

    let mut seen = HashSet::new();
    let mut repositories = Vec::new();
    for link in document.select(&names) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let mut segments = href.trim_matches('/').split('/');
        let (link_owner, link_name) = match (segments.next(), segments.next()) {
            (Some(o), Some(n)) if !o.is_empty() && !n.is_empty() => (o, n),
            _ => {
                let name = text_of(link);
                if name.is_empty() {
                    continue;
                }
                let mut repo = Repository::named(owner, name);
                if seen.insert(repo.full_name()) {
                    repo.clone_url = Some(format!(
                        "{}/{}.git",
                        web_base.trim_end_matches('/'),
                        repo.full_name()
                    ));
                    repositories.push(repo);
                }
                continue;
            }
        };
        if !seen.insert(format!("{link_owner}/{link_name}")) {
            continue;
        }
        let key = format!("/{link_owner}/{link_name}");
        let html_url = format!("{}{key}", web_base.trim_end_matches('/'));
        let mut repo = Repository::named(link_owner, link_name);
        repo.star_count = stars.get(&key).copied().unwrap_or(0);
        repo.fork_count = forks.get(&key).copied().unwrap_or(0);
        repo.clone_url = Some(format!("{html_url}.git"));
        repo.html_url = Some(html_url);
        repositories.push(repo);
    }
    Ok(repositories)
}

/// Maps `/owner/name` to the count rendered in links ending with `suffix`.
fn counts_by_repo(document: &Html, links: &Selector, suffix: &str) -> HashMap<String, u64> {
    document
        .select(links)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let key = href.strip_suffix(suffix)?.to_string();
            Some((key, parse_count(&text_of(link))?))
        })
        .collect()
}

/// Default branch shown by the branch selector of a repository page.
///
/// `None` when the page carries no recognizable selector.
///
/// # Errors
///
/// Returns `RemoteError::Decode` only if a selector fails to compile.
pub fn parse_default_branch(html: &str) -> Result<Option<String>, RemoteError> {
    let document = Html::parse_document(html);
    let button = selector("summary.Button--secondary")?;
    Ok(document.select(&button).next().and_then(|summary| {
        let text = text_of(summary);
        let branch = text.rsplit(':').next().unwrap_or_default().trim();
        (!branch.is_empty()).then(|| branch.to_string())
    }))
}

/// Entries of one directory page (`/owner/name/tree/branch/path`), with full
/// repository-relative paths.
///
/// Owner and name are matched case-insensitively since links carry the
/// canonical spelling; every href segment is percent-decoded before the
/// branch is stripped.
///
/// # Errors
///
/// Returns `RemoteError::Decode` if a selector fails to compile, or if the
/// page has rows but none of them links into `repo` at `branch`.
pub fn parse_directory_listing(
    html: &str,
    repo: &RepoRef,
    branch: &str,
) -> Result<Vec<RawEntry>, RemoteError> {
    let document = Html::parse_document(html);
    let rows = selector("tr.react-directory-row")?;
    let icon = selector("svg")?;
    let link = selector("a.Link--primary")?;

    let mut row_count = 0usize;
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for row in document.select(&rows) {
        row_count += 1;
        let Some(href) = row
            .select(&link)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Some((path, in_tree)) = entry_path(href, repo, branch) else {
            continue;
        };
        if path.is_empty() || !seen.insert(path.clone()) {
            continue;
        }
        let is_dir = in_tree
            || row
                .select(&icon)
                .next()
                .is_some_and(|svg| svg.value().classes().any(|c| c == "icon-directory"));
        entries.push(if is_dir {
            RawEntry::directory(path)
        } else {
            RawEntry::file(path, None)
        });
    }

    if entries.is_empty() && row_count > 0 {
        return Err(RemoteError::decode(
            format!("directory page of {repo}@{branch}"),
            format!("{row_count} rows but no entry links"),
        ));
    }
    Ok(entries)
}

/// Splits `/owner/name/(tree|blob)/<branch>/<path>` into the decoded path and
/// whether it is a `tree` link.
fn entry_path(href: &str, repo: &RepoRef, branch: &str) -> Option<(String, bool)> {
    let href = href.split(['?', '#']).next().unwrap_or_default();
    let mut segments = href.trim_matches('/').splitn(4, '/');
    let (owner, name, kind, rest) = (
        segments.next()?,
        segments.next()?,
        segments.next()?,
        segments.next()?,
    );
    if !percent_decode(owner).eq_ignore_ascii_case(&repo.owner)
        || !percent_decode(name).eq_ignore_ascii_case(&repo.name)
    {
        return None;
    }
    let in_tree = match kind {
        "tree" => true,
        "blob" => false,
        _ => return None,
    };
    let rest = percent_decode(rest);
    let path = rest.strip_prefix(branch)?.strip_prefix('/')?;
    Some((path.to_string(), in_tree))
}

/// Decodes `%XX` escapes in an href path. Malformed escapes are kept verbatim.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = input.get(i + 1..i + 3)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
