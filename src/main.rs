// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> Config --> Logging --> Command Dispatch
//!   List | Tree | View | Download | Clone | Status | Cache | Options
//! ```

use std::process::ExitCode;

use gitbrowse_rs::cli::global::GlobalOptions;
use gitbrowse_rs::cli::{self, Command};
use gitbrowse_rs::cmd::Session;
use gitbrowse_rs::cmd::browse::{run_list_command, run_tree_command, run_view_command};
use gitbrowse_rs::cmd::clone::run_clone_command;
use gitbrowse_rs::cmd::config::run_options_command;
use gitbrowse_rs::cmd::download::run_download_command;
use gitbrowse_rs::cmd::status::{run_cache_command, run_status_command};
use gitbrowse_rs::config::{Config, ConfigLoader, ENV_PREFIX, LOCAL_CONFIG_FILE};
use gitbrowse_rs::logging::{LogConfig, init_logging};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if matches!(cli.command, Some(Command::Version)) {
        handle_version_command();
        return ExitCode::SUCCESS;
    }

    let loader = build_config_loader(&cli.global);
    let config_files = loader.format_loaded_files();
    let config = match cli.global.apply_overrides(loader).and_then(ConfigLoader::build) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match init_logging(&build_log_config(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    dispatch_command(&cli, &config, &config_files).await
}

fn build_log_config(config: &Config) -> LogConfig {
    LogConfig::builder()
        .with_console_level(config.global.output_log_level)
        .with_file_level(config.global.file_log_level)
        .maybe_with_log_file(
            config
                .global
                .log_file
                .as_ref()
                .map(|p| p.display().to_string()),
        )
        .with_json_file(config.global.json_log)
        .build()
}

async fn dispatch_command(cli: &cli::Cli, config: &Config, config_files: &[String]) -> ExitCode {
    let result = match &cli.command {
        Some(Command::Version) => {
            handle_version_command();
            Ok(())
        }
        Some(Command::Options) => {
            run_options_command(config, config_files);
            Ok(())
        }
        Some(command) => run_session_command(command, config).await,
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            Err(anyhow::anyhow!("No command specified"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_session_command(command: &Command, config: &Config) -> gitbrowse_rs::error::Result<()> {
    let session = Session::open(config).await?;
    session.cancel_on_ctrl_c();
    let browser = &session.browser;
    let cancel = &session.cancel;

    let result = match command {
        Command::List(args) => run_list_command(args, browser).await,
        Command::Tree(args) => run_tree_command(args, browser).await,
        Command::View(args) => run_view_command(args, browser).await,
        Command::Download(args) => run_download_command(args, config, browser, cancel).await,
        Command::Clone(args) => run_clone_command(args, config, browser, cancel).await,
        Command::Status => {
            run_status_command(config, browser).await;
            Ok(())
        }
        Command::Cache(args) => run_cache_command(args, browser).await,
        Command::Version | Command::Options => Ok(()),
    };

    session.close().await;
    result
}

fn handle_version_command() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

fn build_config_loader(global: &GlobalOptions) -> ConfigLoader {
    let mut loader = ConfigLoader::new().add_toml_file_optional(LOCAL_CONFIG_FILE);
    for path in &global.configs {
        loader = loader.add_toml_file(path);
    }
    loader.with_env_prefix(ENV_PREFIX)
}
