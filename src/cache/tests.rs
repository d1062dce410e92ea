// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use super::{CacheKey, CacheStore, Freshness, escape};
use crate::remote::{PageToken, RepoRef};

const HOUR: Duration = Duration::from_secs(3600);

async fn store() -> (TempDir, CacheStore) {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path().join("cache")).await.unwrap();
    (dir, store)
}

#[test]
fn test_key_layout() {
    let repo = RepoRef::new("Octo", "Hello");
    assert_eq!(CacheKey::repo_list("Octo", None).as_str(), "repos/octo/page/1");
    assert_eq!(
        CacheKey::repo_list("octo", Some(&PageToken::new("3"))).as_str(),
        "repos/octo/page/3"
    );
    assert_eq!(CacheKey::default_branch(&repo).as_str(), "repo/octo/hello/branch");
    assert_eq!(CacheKey::tree(&repo, "Main").as_str(), "repo/octo/hello/tree/Main");
    assert_eq!(
        CacheKey::content(&repo, "main", "src/Lib.rs").as_str(),
        "repo/octo/hello/blob/main/src/Lib.rs"
    );
    assert!(CacheKey::tree(&repo, "main").as_str().starts_with(&CacheKey::repo_prefix(&repo)));
}

#[test]
fn test_file_names_are_flat_and_bounded() {
    assert_eq!(escape("repo/a/b.txt"), "repo%2Fa%2Fb%2Etxt");

    let long = CacheKey::new(format!("repo/o/n/blob/main/{}", "d/".repeat(200)));
    let name = long.file_name();
    assert!(name.len() <= 200);
    assert!(!name.contains('/'));
    assert_ne!(name, CacheKey::new(format!("{}x", long.as_str())).file_name());
}

#[tokio::test]
async fn test_put_then_get_is_fresh() {
    let (_dir, store) = store().await;
    let key = CacheKey::new("repos/octo/page/1");

    assert!(store.get(&key).await.is_none());
    store.put(&key, b"[1,2,3]", HOUR).await.unwrap();

    let hit = store.get(&key).await.unwrap();
    assert_eq!(hit.payload, b"[1,2,3]");
    assert_eq!(hit.freshness, Freshness::Fresh);
    assert_eq!(hit.ttl, HOUR);
}

#[tokio::test]
async fn test_expired_and_zero_ttl_entries_are_stale() {
    let (_dir, store) = store().await;
    let old = CacheKey::new("old");
    let zero = CacheKey::new("zero");

    let two_hours_ago = SystemTime::now() - 2 * HOUR;
    store.put_at(&old, b"x", HOUR, two_hours_ago).await.unwrap();
    store.put(&zero, b"y", Duration::ZERO).await.unwrap();

    assert_eq!(store.get(&old).await.unwrap().freshness, Freshness::Stale);
    assert_eq!(store.get(&zero).await.unwrap().freshness, Freshness::Stale);
}

#[tokio::test]
async fn test_overwrite_replaces_payload() {
    let (_dir, store) = store().await;
    let key = CacheKey::new("k");
    store.put(&key, b"first", HOUR).await.unwrap();
    store.put(&key, b"second", HOUR).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().payload, b"second");
}

#[tokio::test]
async fn test_corrupt_entry_is_removed_and_missed() {
    let (_dir, store) = store().await;
    let key = CacheKey::new("broken");
    let path = store.entry_path(&key);
    tokio::fs::write(&path, b"not a header\npayload").await.unwrap();

    assert!(store.get(&key).await.is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_invalidate_by_repository_prefix() {
    let (_dir, store) = store().await;
    let hello = RepoRef::new("octo", "hello");
    let other = RepoRef::new("octo", "hello-world");

    store.put(&CacheKey::default_branch(&hello), b"main", HOUR).await.unwrap();
    store.put(&CacheKey::tree(&hello, "main"), b"[]", HOUR).await.unwrap();
    store.put(&CacheKey::tree(&other, "main"), b"[]", HOUR).await.unwrap();

    let removed = store.invalidate(&CacheKey::repo_prefix(&hello)).await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.get(&CacheKey::tree(&hello, "main")).await.is_none());
    assert!(store.get(&CacheKey::tree(&other, "main")).await.is_some());
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let (_dir, store) = store().await;
    for i in 0..3 {
        store.put(&CacheKey::new(format!("k{i}")), b"v", HOUR).await.unwrap();
    }
    assert_eq!(store.clear().await.unwrap(), 3);
    assert!(store.get(&CacheKey::new("k0")).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_leave_a_whole_value() {
    let (_dir, store) = store().await;
    let store = Arc::new(store);
    let key = CacheKey::new("contended");

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let store = Arc::clone(&store);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let payload = vec![i; 4096];
            store.put(&key, &payload, HOUR).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let hit = store.get(&key).await.unwrap();
    assert_eq!(hit.payload.len(), 4096);
    assert!(hit.payload.iter().all(|b| *b == hit.payload[0]));
    assert_eq!(store.held_locks(), 0);
}

#[tokio::test]
async fn test_key_locks_are_released_after_use() {
    let (_dir, store) = store().await;
    let repo = RepoRef::new("octo", "hello");
    for i in 0..32 {
        let key = CacheKey::content(&repo, "main", &format!("f{i}.txt"));
        store.put(&key, b"x", HOUR).await.unwrap();
    }
    assert_eq!(store.held_locks(), 0);

    assert_eq!(store.invalidate(&CacheKey::repo_prefix(&repo)).await.unwrap(), 32);
    assert_eq!(store.held_locks(), 0);
}
