// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read-only browsing commands: `list`, `tree`, `view`.
//!
//! Listings and trees go to stdout; notes about cached or stale data go to
//! stderr so the output can be piped.

use std::io::Write;

use tracing::info;

use crate::browser::{Fetched, RepoBrowser};
use crate::cli::browse::{ListArgs, TreeArgs, ViewArgs};
use crate::error::Result;
use crate::remote::{PageToken, Repository};
use crate::tree::TreeNode;

fn note_origin<T>(fetched: &Fetched<T>) {
    if fetched.is_stale() {
        eprintln!("note: showing cached data that may be out of date");
    } else if fetched.from_cache {
        info!("served from cache");
    }
}

fn format_repository(index: usize, repo: &Repository) -> String {
    let mut line = format!(
        "{}. {} - \u{2605} {}, \u{2442} {}",
        index + 1,
        repo.name,
        repo.star_count,
        repo.fork_count
    );
    if let Some(language) = repo.language.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" [{language}]"));
    }
    if let Some(description) = repo.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!("\n   {description}"));
    }
    line
}

/// Main handler for the `list` command.
///
/// # Errors
///
/// Returns the remote error of the first page, or `Unavailable` when offline
/// without a cached listing.
pub async fn run_list_command(args: &ListArgs, browser: &RepoBrowser) -> Result<()> {
    let repositories = browser
        .list_all_repositories(&args.username, Some(args.count))
        .await?;
    note_origin(&repositories);

    if repositories.value.is_empty() {
        println!("No repositories found for {}", args.username);
        return Ok(());
    }
    for (index, repo) in repositories.value.iter().enumerate() {
        println!("{}", format_repository(index, repo));
    }
    Ok(())
}

fn format_node(node: &TreeNode) -> String {
    if node.is_dir() {
        format!("{}/", node.name())
    } else {
        match node.size_bytes {
            Some(size) => format!("{}  ({size} bytes)", node.name()),
            None => node.name().to_string(),
        }
    }
}

/// Main handler for the `tree` command.
///
/// # Errors
///
/// Returns `NotFound` when the path is not a directory, or any error of
/// [`RepoBrowser::get_tree_page`].
pub async fn run_tree_command(args: &TreeArgs, browser: &RepoBrowser) -> Result<()> {
    let token = args.page.as_deref().map(PageToken::new);
    let page = browser
        .get_tree_page(&args.repo, args.branch.as_deref(), &args.path, token.as_ref())
        .await?;
    note_origin(&page);

    for node in &page.value.nodes {
        println!("{}", format_node(node));
    }
    if let Some(next) = &page.value.next_page_token {
        eprintln!("more entries: --page {next}");
    }
    Ok(())
}

/// Main handler for the `view` command.
///
/// # Errors
///
/// Returns `NotFound`, `TooLarge` or any other error of
/// [`RepoBrowser::get_file_content`], or an I/O error writing stdout.
pub async fn run_view_command(args: &ViewArgs, browser: &RepoBrowser) -> Result<()> {
    let content = browser
        .get_file_content(&args.repo, args.branch.as_deref(), &args.path)
        .await?;
    note_origin(&content);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content.value)?;
    if !content.value.ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
