// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Repository tree construction.
//!
//! ```text
//! raw pages (API or scraped, live or cached)
//!        |
//!        v
//! TreeBuilder::push_page() ...        accumulate in arrival order
//!        |
//!        v
//! build()
//!   pass 1: normalize paths, merge explicit entries (later page wins)
//!   pass 2: synthesize missing ancestor directories
//!        |
//!        v
//! RepoTree (immutable, Arc-shared)
//!   get() / children() / walk() / page() / files_under()
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ErrorKind;

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
        }
    }
}

/// One entry as returned by the remote, before merging.
///
/// This is the canonical shape both the API path and the scraping path
/// produce, and the shape persisted in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub path: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl RawEntry {
    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::File,
            size,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::Directory,
            size: None,
        }
    }
}

/// A file or directory within a repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Relative, slash-separated, no leading or trailing slash.
    pub path: String,
    pub kind: NodeKind,
    /// Only meaningful for files.
    pub size_bytes: Option<u64>,
    /// Empty for top-level nodes.
    pub parent_path: String,
    /// Synthesized from a descendant path rather than listed by the remote.
    pub implicit: bool,
}

impl TreeNode {
    /// Last path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// A merge conflict observed while building. Logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub path: String,
    pub previous: NodeKind,
    pub winner: NodeKind,
}

impl Inconsistency {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::DataInconsistency
    }
}

/// Normalize a repository path: slash-separated, case preserved, no empty
/// segments, no leading or trailing slash. Returns `None` for the root and for
/// paths containing `.` or `..` segments.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" => {}
            "." | ".." => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Parent of a normalized path; empty string for top-level paths.
#[must_use]
pub fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Accumulates raw pages and produces a [`RepoTree`].
#[derive(Debug, Default, Clone)]
pub struct TreeBuilder {
    pages: Vec<Vec<RawEntry>>,
}

impl TreeBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Appends one page; pages are merged in the order they were pushed.
    pub fn push_page(&mut self, page: impl IntoIterator<Item = RawEntry>) -> &mut Self {
        self.pages.push(page.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: impl IntoIterator<Item = RawEntry>) -> Self {
        self.push_page(page);
        self
    }

    /// Builds the tree. Does not consume the pages, so the same builder
    /// always produces the same tree.
    #[must_use]
    pub fn build(&self) -> RepoTree {
        let mut inconsistencies = Vec::new();
        let mut explicit: BTreeMap<String, (NodeKind, Option<u64>)> = BTreeMap::new();

        // Pass 1: explicit entries, later pages win.
        for entry in self.pages.iter().flatten() {
            let Some(path) = normalize_path(&entry.path) else {
                warn!(path = %entry.path, "skipping entry with unusable path");
                continue;
            };
            let size = match entry.kind {
                NodeKind::File => entry.size,
                NodeKind::Directory => None,
            };
            if let Some((previous, _)) = explicit.insert(path.clone(), (entry.kind, size))
                && previous != entry.kind
            {
                warn!(
                    path = %path,
                    previous = %previous,
                    winner = %entry.kind,
                    "data inconsistency: conflicting kinds for path, later entry wins"
                );
                inconsistencies.push(Inconsistency {
                    path,
                    previous,
                    winner: entry.kind,
                });
            }
        }

        // Pass 2: every ancestor must be a directory.
        let mut nodes: BTreeMap<String, TreeNode> = BTreeMap::new();
        for (path, (kind, size)) in &explicit {
            nodes.insert(
                path.clone(),
                TreeNode {
                    path: path.clone(),
                    kind: *kind,
                    size_bytes: *size,
                    parent_path: parent_of(path).to_string(),
                    implicit: false,
                },
            );
        }
        for path in explicit.keys() {
            let mut ancestor = parent_of(path);
            while !ancestor.is_empty() {
                match nodes.get_mut(ancestor) {
                    Some(node) if node.is_dir() => break,
                    Some(node) => {
                        warn!(
                            path = %ancestor,
                            "data inconsistency: file listed as ancestor, treating as directory"
                        );
                        inconsistencies.push(Inconsistency {
                            path: ancestor.to_string(),
                            previous: NodeKind::File,
                            winner: NodeKind::Directory,
                        });
                        node.kind = NodeKind::Directory;
                        node.size_bytes = None;
                    }
                    None => {
                        nodes.insert(
                            ancestor.to_string(),
                            TreeNode {
                                path: ancestor.to_string(),
                                kind: NodeKind::Directory,
                                size_bytes: None,
                                parent_path: parent_of(ancestor).to_string(),
                                implicit: true,
                            },
                        );
                    }
                }
                ancestor = parent_of(ancestor);
            }
        }

        RepoTree::from_nodes(nodes, inconsistencies)
    }
}

/// Immutable, consistent tree for one repository and branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTree {
    nodes: BTreeMap<String, TreeNode>,
    /// Parent path to ordered child paths; the root is `""`.
    children: BTreeMap<String, Vec<String>>,
    inconsistencies: Vec<Inconsistency>,
}

impl RepoTree {
    fn from_nodes(nodes: BTreeMap<String, TreeNode>, inconsistencies: Vec<Inconsistency>) -> Self {
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        children.insert(String::new(), Vec::new());
        for node in nodes.values() {
            children
                .entry(node.parent_path.clone())
                .or_default()
                .push(node.path.clone());
            if node.is_dir() {
                children.entry(node.path.clone()).or_default();
            }
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| {
                let (na, nb) = (&nodes[a], &nodes[b]);
                nb.is_dir()
                    .cmp(&na.is_dir())
                    .then_with(|| na.name().to_lowercase().cmp(&nb.name().to_lowercase()))
                    .then_with(|| na.name().cmp(nb.name()))
            });
        }
        Self {
            nodes,
            children,
            inconsistencies,
        }
    }

    /// Builds a tree from a single flat listing.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = RawEntry>) -> Self {
        TreeBuilder::new().with_page(entries).build()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        self.nodes.get(path)
    }

    /// Whether `path` names the root or an existing directory.
    #[must_use]
    pub fn is_directory(&self, path: &str) -> bool {
        self.children.contains_key(path)
    }

    /// Direct children of a directory (root is `""`), directories first.
    pub fn children<'a>(
        &'a self,
        path: &str,
    ) -> Option<impl Iterator<Item = &'a TreeNode> + use<'a>> {
        self.children
            .get(path)
            .map(|paths| paths.iter().map(|p| &self.nodes[p]))
    }

    /// Conflicts recorded while merging.
    #[must_use]
    pub fn inconsistencies(&self) -> &[Inconsistency] {
        &self.inconsistencies
    }

    /// All nodes in path order.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    /// Depth-first, parent-before-children traversal of everything under
    /// `path`, excluding `path` itself. When `path` is a file, yields only
    /// that file. Yields nothing for unknown paths.
    #[must_use]
    pub fn walk<'a>(&'a self, path: &str) -> Walk<'a> {
        let stack = if let Some(list) = self.children.get(path) {
            list.iter().rev().map(String::as_str).collect()
        } else if let Some((key, _)) = self.nodes.get_key_value(path) {
            vec![key.as_str()]
        } else {
            Vec::new()
        };
        Walk { tree: self, stack }
    }

    /// Every file under `path` in walk order.
    pub fn files_under<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a TreeNode> + use<'a> {
        self.walk(path).filter(|node| node.is_file())
    }

    /// One page of the direct children of `path`.
    ///
    /// Tokens are offsets produced by the previous page; `None` starts at
    /// the beginning. Returns `None` when `path` is not a directory.
    #[must_use]
    pub fn page(&self, path: &str, token: Option<&str>, page_size: usize) -> Option<TreePage> {
        let list = self.children.get(path)?;
        let start = token
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(0)
            .min(list.len());
        let end = start.saturating_add(page_size.max(1)).min(list.len());
        let nodes = list[start..end]
            .iter()
            .map(|p| self.nodes[p].clone())
            .collect();
        let next_page_token = (end < list.len()).then(|| end.to_string());
        Some(TreePage {
            nodes,
            next_page_token,
        })
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePage {
    pub nodes: Vec<TreeNode>,
    pub next_page_token: Option<String>,
}

/// Lazy depth-first traversal created by [`RepoTree::walk`].
pub struct Walk<'a> {
    tree: &'a RepoTree,
    stack: Vec<&'a str>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.stack.pop()?;
        let node = self.tree.nodes.get(path)?;
        if node.is_dir()
            && let Some(list) = self.tree.children.get(path)
        {
            self.stack.extend(list.iter().rev().map(String::as_str));
        }
        Some(node)
    }
}

/// Ancestor directories of the given file paths, parents before children.
#[must_use]
pub fn ancestor_dirs<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut dirs = BTreeSet::new();
    for path in paths {
        let mut ancestor = parent_of(path);
        while !ancestor.is_empty() && dirs.insert(ancestor.to_string()) {
            ancestor = parent_of(ancestor);
        }
    }
    let mut dirs: Vec<String> = dirs.into_iter().collect();
    dirs.sort_by_key(|d| d.matches('/').count());
    dirs
}
