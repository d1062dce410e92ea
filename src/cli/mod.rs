// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for gitbrowse-rs using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! gitbrowse [global options] <command>
//! list <username> [-c N]
//! tree <owner/repo> [path] [-b BRANCH] [--page TOKEN]
//! view <owner/repo> <path> [-b BRANCH]
//! download <owner/repo> [paths...] [-o DIR] [-b BRANCH]
//! clone <owner/repo> [-o DIR] [-b BRANCH]
//! status
//! cache clear [owner/repo]
//! options
//! version
//! ```

pub mod browse;
pub mod cache;
pub mod global;

#[cfg(test)]
mod tests;

use crate::cli::browse::{CloneArgs, DownloadArgs, ListArgs, TreeArgs, ViewArgs};
use crate::cli::cache::CacheArgs;
use crate::cli::global::GlobalOptions;
use clap::{Parser, Subcommand};

/// Terminal GitHub Repository Browser
///
/// Lists repositories, browses trees, views and downloads files.
#[derive(Debug, Parser)]
#[command(
    name = "gitbrowse",
    author,
    version,
    about = "Terminal GitHub Repository Browser",
    long_about = "gitbrowse-rs Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  Browse GitHub repositories from the terminal. Responses are\n\
                  cached on disk, so listings, trees and files viewed before\n\
                  stay available while offline.",
    after_help = "CONFIGURATION:\n\n\
                  gitbrowse reads `gitbrowse.toml` from the current directory if\n\
                  present, then every file given with --config, then GITBROWSE_*\n\
                  environment variables (GITBROWSE_REMOTE__PAGE_SIZE=50), then\n\
                  command-line flags. Use `gitbrowse options` to print the result."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    #[command(visible_alias = "-v")]
    Version,

    /// Lists all options and their values.
    Options,

    /// Shows connectivity and cache location.
    Status,

    /// Lists a user's repositories.
    List(ListArgs),

    /// Lists one directory of a repository.
    Tree(TreeArgs),

    /// Prints a file of a repository.
    View(ViewArgs),

    /// Downloads files or directories of a repository.
    Download(DownloadArgs),

    /// Clones a repository with git, or pulls an existing checkout.
    Clone(CloneArgs),

    /// Manages the response cache.
    Cache(CacheArgs),
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if help/version information
/// was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
