// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Config-related commands for gitbrowse-rs.

use crate::config::Config;

/// Display current configuration options, followed by the files they were
/// read from.
pub fn run_options_command(config: &Config, config_files: &[String]) {
    for line in config.format_options() {
        println!("{line}");
    }
    println!();
    if config_files.is_empty() {
        println!("No configuration files loaded");
    } else {
        for line in config_files {
            println!("{line}");
        }
    }
}
