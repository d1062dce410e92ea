// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Arguments of the repository commands.
//!
//! ```text
//! list octocat -c 5                  first 5 repositories
//! tree octocat/hello src             children of src/
//! view octocat/hello README.md       bytes to stdout
//! download octocat/hello src docs    into downloads/
//! clone octocat/hello                into repositories/hello
//! ```
//!
//! Repositories are given as `owner/name`; a full `https://github.com/...`
//! URL is accepted too.

use clap::Args;
use std::path::PathBuf;

use crate::remote::RepoRef;

/// Arguments for the `list` command.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// GitHub username.
    pub username: String,

    /// Number of repositories to show.
    #[arg(short = 'c', long = "count", default_value_t = 10)]
    pub count: usize,
}

/// Arguments for the `tree` command.
#[derive(Debug, Clone, Args)]
pub struct TreeArgs {
    /// Repository as owner/name.
    #[arg(value_parser = RepoRef::parse)]
    pub repo: RepoRef,

    /// Directory to list; the root when omitted.
    #[arg(default_value = "")]
    pub path: String,

    /// Branch; the default branch when omitted.
    #[arg(short = 'b', long = "branch")]
    pub branch: Option<String>,

    /// Continue from a token printed by a previous page.
    #[arg(long = "page", value_name = "TOKEN")]
    pub page: Option<String>,
}

/// Arguments for the `view` command.
#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Repository as owner/name.
    #[arg(value_parser = RepoRef::parse)]
    pub repo: RepoRef,

    /// Path of the file.
    pub path: String,

    /// Branch; the default branch when omitted.
    #[arg(short = 'b', long = "branch")]
    pub branch: Option<String>,
}

/// Arguments for the `download` command.
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Repository as owner/name.
    #[arg(value_parser = RepoRef::parse)]
    pub repo: RepoRef,

    /// Files or directories to download; the whole repository when omitted.
    pub paths: Vec<String>,

    /// Destination directory (default: paths.downloads).
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Branch; the default branch when omitted.
    #[arg(short = 'b', long = "branch")]
    pub branch: Option<String>,
}

/// Arguments for the `clone` command.
#[derive(Debug, Clone, Args)]
pub struct CloneArgs {
    /// Repository as owner/name.
    #[arg(value_parser = RepoRef::parse)]
    pub repo: RepoRef,

    /// Checkout directory (default: paths.repositories/<name>).
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Branch to check out.
    #[arg(short = 'b', long = "branch")]
    pub branch: Option<String>,
}
