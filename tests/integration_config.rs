// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for layered configuration loading.

use std::fs;
use std::path::Path;
use std::time::Duration;

use gitbrowse_rs::cli::global::GlobalOptions;
use gitbrowse_rs::config::{Config, ConfigLoader};
use gitbrowse_rs::error::ConfigError;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_file_round_trips_into_component_options() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "gitbrowse.toml",
        r#"
[global]
output_log_level = 3
json_log = true

[remote]
api_url = "https://ghe.example/api/v3/"
web_url = "https://ghe.example"
raw_url = "https://ghe.example/raw"
page_size = 30
max_in_memory_bytes = 1024
scrape_fallback = false

[cache]
listing_ttl_secs = 10
tree_ttl_secs = 20
content_ttl_secs = 30

[download]
workers = 2
max_attempts = 5

[connectivity]
hosts = ["ghe.example:443"]
timeout_ms = 500
interval_secs = 5
success_threshold = 1
"#,
    );
    let config = Config::from_file(&path).unwrap();

    let remote = config.remote_options();
    assert_eq!(remote.endpoints.api, "https://ghe.example/api/v3");
    assert_eq!(remote.page_size, 30);
    assert_eq!(remote.max_in_memory_bytes, 1024);
    assert!(!remote.scrape_fallback);

    let browser = config.browser_options();
    assert_eq!(browser.listing_ttl, Duration::from_secs(10));
    assert_eq!(browser.tree_ttl, Duration::from_secs(20));
    assert_eq!(browser.content_ttl, Duration::from_secs(30));

    let scheduler = config.download_scheduler();
    assert_eq!(scheduler.workers(), 2);
    assert_eq!(scheduler.max_attempts(), 5);

    assert_eq!(config.connectivity.timeout(), Duration::from_millis(500));
    assert!(config.global.json_log);
}

#[test]
fn test_later_files_and_cli_override_earlier_ones() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.toml", "[download]\nworkers = 2\n[paths]\nprefix = \"/base\"");
    let local = write(&dir, "local.toml", "[download]\nworkers = 3");

    let global = GlobalOptions {
        prefix: Some(dir.path().to_path_buf()),
        offline: true,
        ..GlobalOptions::default()
    };
    let loader = ConfigLoader::new()
        .add_toml_file(&base)
        .add_toml_file(&local)
        .add_toml_file_optional(dir.path().join("absent.toml"));
    assert_eq!(loader.loaded_files().len(), 2);

    let config = global.apply_overrides(loader).unwrap().build().unwrap();
    assert_eq!(config.download.workers, 3);
    assert!(config.connectivity.offline);
    assert_eq!(config.cache_dir(), dir.path().join("cache"));
    assert_eq!(
        config.paths.repositories_dir(),
        dir.path().join("repositories")
    );
}

#[test]
fn test_relative_paths_resolve_against_prefix() {
    let config = Config::parse(
        "[paths]\nprefix = \"/data\"\ncache = \"tmp/cache\"\ndownloads = \"/abs/dl\"",
    )
    .unwrap();
    assert_eq!(config.cache_dir(), Path::new("/data/tmp/cache"));
    assert_eq!(config.paths.downloads_dir(), Path::new("/abs/dl"));
}

#[test]
fn test_invalid_value_names_section_and_key() {
    let err = Config::parse("[remote]\npage_size = 500").unwrap_err();
    let Some(ConfigError::InvalidValue { section, key, .. }) = err.downcast_ref::<ConfigError>()
    else {
        panic!("unexpected error: {err:#}");
    };
    assert_eq!(section, "remote");
    assert_eq!(key, "page_size");
}

#[test]
fn test_invalid_log_level_rejected() {
    assert!(Config::parse("[global]\noutput_log_level = 9").is_err());
}
