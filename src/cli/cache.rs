// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cache command arguments.

use clap::{Args, Subcommand};

use crate::remote::RepoRef;

/// Arguments for the `cache` command.
#[derive(Debug, Clone, Args)]
pub struct CacheArgs {
    /// Cache subcommand.
    #[command(subcommand)]
    pub subcommand: CacheSubcommand,
}

/// Cache subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum CacheSubcommand {
    /// Removes cached responses.
    Clear(ClearArgs),
}

/// Arguments for the `cache clear` subcommand.
#[derive(Debug, Clone, Args)]
pub struct ClearArgs {
    /// Only remove entries of this repository.
    #[arg(value_parser = RepoRef::parse)]
    pub repo: Option<RepoRef>,
}
