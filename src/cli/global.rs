// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Global CLI options available for all commands.
//!
//! # Option Precedence
//!
//! ```text
//! --config FILE     <- Additional config files (can repeat)
//! --log-level N     <- Console verbosity (0-6)
//! --file-log-level  <- File verbosity (overrides --log-level)
//! --log-file FILE   <- global.log_file
//! --token TOKEN     <- remote.token (or GITHUB_TOKEN)
//! --prefix DIR      <- paths.prefix override
//! --offline         <- connectivity.offline
//!
//! Precedence: CLI flags > GITBROWSE_* > --config > gitbrowse.toml > defaults
//! ```

use clap::Args;
use std::path::PathBuf;

use crate::config::ConfigLoader;
use crate::error::Result;

/// Global options available for all commands.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOptions {
    /// Path to additional TOML configuration file(s).
    /// Can be specified multiple times.
    #[arg(long = "config", value_name = "FILE", action = clap::ArgAction::Append, global = true)]
    pub configs: Vec<PathBuf>,

    /// Console log level (0=silent, 1=errors, 2=warnings, 3=info, 4=debug, 5=trace, 6=dump).
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", global = true,
        value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub log_level: Option<u8>,

    /// File log level, overrides --log-level for the log file.
    #[arg(long = "file-log-level", value_name = "LEVEL", global = true,
        value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub file_log_level: Option<u8>,

    /// Path to log file.
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// GitHub token; raises the API rate limit.
    #[arg(long = "token", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Base directory for cache/, downloads/ and repositories/.
    #[arg(short = 'd', long = "prefix", value_name = "DIR", global = true)]
    pub prefix: Option<PathBuf>,

    /// Never touch the network; serve everything from the cache.
    #[arg(long, global = true)]
    pub offline: bool,
}

impl GlobalOptions {
    /// Applies command-line options as the highest-priority configuration
    /// layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if an override cannot be set.
    pub fn apply_overrides(&self, loader: ConfigLoader) -> Result<ConfigLoader> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());

        let mut loader = loader
            .set_opt("global.output_log_level", self.log_level.map(i64::from))?
            // file_log_level falls back to log_level if not specified
            .set_opt(
                "global.file_log_level",
                self.file_log_level.or(self.log_level).map(i64::from),
            )?
            .set_opt("global.log_file", path(&self.log_file))?
            .set_opt("remote.token", self.token.clone())?
            .set_opt("paths.prefix", path(&self.prefix))?;

        if self.offline {
            loader = loader.set("connectivity.offline", true)?;
        }
        Ok(loader)
    }
}
