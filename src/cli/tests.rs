// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use crate::cli::cache::CacheSubcommand;
use crate::cli::global::GlobalOptions;
use crate::cli::{Cli, Command};
use crate::config::ConfigLoader;
use crate::logging::LogLevel;
use crate::remote::RepoRef;
use clap::Parser;

#[test]
fn test_parse_version() {
    let cli = Cli::try_parse_from(["gitbrowse", "version"]).unwrap();
    assert!(matches!(cli.command, Some(Command::Version)));
}

#[test]
fn test_parse_list_default_count() {
    let cli = Cli::try_parse_from(["gitbrowse", "list", "octocat"]).unwrap();
    match cli.command {
        Some(Command::List(args)) => {
            assert_eq!(args.username, "octocat");
            assert_eq!(args.count, 10);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["gitbrowse", "list", "octocat", "-c", "3"]).unwrap();
    assert!(matches!(cli.command, Some(Command::List(args)) if args.count == 3));
}

#[test]
fn test_parse_tree_defaults_to_root() {
    let cli = Cli::try_parse_from(["gitbrowse", "tree", "octocat/hello"]).unwrap();
    match cli.command {
        Some(Command::Tree(args)) => {
            assert_eq!(args.repo, RepoRef::new("octocat", "hello"));
            assert_eq!(args.path, "");
            assert!(args.branch.is_none());
            assert!(args.page.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_view_with_branch() {
    let cli = Cli::try_parse_from([
        "gitbrowse",
        "view",
        "https://github.com/octocat/hello.git",
        "src/main.rs",
        "-b",
        "dev",
    ])
    .unwrap();
    match cli.command {
        Some(Command::View(args)) => {
            assert_eq!(args.repo.to_string(), "octocat/hello");
            assert_eq!(args.path, "src/main.rs");
            assert_eq!(args.branch.as_deref(), Some("dev"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_download_many_paths() {
    let cli = Cli::try_parse_from([
        "gitbrowse", "download", "octocat/hello", "src", "README.md", "-o", "/tmp/out",
    ])
    .unwrap();
    match cli.command {
        Some(Command::Download(args)) => {
            assert_eq!(args.paths, vec!["src", "README.md"]);
            assert_eq!(args.output.as_deref(), Some(Path::new("/tmp/out")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_clone_and_cache_clear() {
    let cli = Cli::try_parse_from(["gitbrowse", "clone", "octocat/hello", "-o", "here"]).unwrap();
    assert!(
        matches!(cli.command, Some(Command::Clone(args)) if args.output == Some(PathBuf::from("here")))
    );

    let cli = Cli::try_parse_from(["gitbrowse", "cache", "clear"]).unwrap();
    match cli.command {
        Some(Command::Cache(args)) => match args.subcommand {
            CacheSubcommand::Clear(clear) => assert!(clear.repo.is_none()),
        },
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_rejects_bad_repository() {
    let err = Cli::try_parse_from(["gitbrowse", "view", "not-a-repo", "README.md"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn test_parse_rejects_log_level_out_of_range() {
    assert!(Cli::try_parse_from(["gitbrowse", "-l", "7", "status"]).is_err());
}

#[test]
fn test_global_options_after_subcommand() {
    let cli = Cli::try_parse_from(["gitbrowse", "status", "--offline", "-l", "4"]).unwrap();
    assert!(cli.global.offline);
    assert_eq!(cli.global.log_level, Some(4));
}

#[test]
fn test_apply_overrides() {
    let global = GlobalOptions {
        log_level: Some(5),
        token: Some("abc".to_string()),
        prefix: Some(PathBuf::from("/srv/gb")),
        offline: true,
        ..GlobalOptions::default()
    };
    let config = global
        .apply_overrides(ConfigLoader::new().add_toml_str("[connectivity]\noffline = false"))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.global.output_log_level, LogLevel::TRACE);
    assert_eq!(config.global.file_log_level, LogLevel::TRACE);
    assert_eq!(config.remote.token.as_deref(), Some("abc"));
    assert!(config.connectivity.offline);
    assert_eq!(config.paths.downloads_dir(), Path::new("/srv/gb/downloads"));
}

#[test]
fn test_apply_overrides_without_flags_keeps_files() {
    let config = GlobalOptions::default()
        .apply_overrides(ConfigLoader::new().add_toml_str("[global]\noutput_log_level = 1"))
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(config.global.output_log_level, LogLevel::ERROR);
    assert!(!config.connectivity.offline);
}
