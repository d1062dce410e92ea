// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Filesystem-backed cache of listings, trees and file contents.
//!
//! ```text
//! <cache dir>/
//!   repos%2Focto%2Fpage%2F1              one file per key
//!   repo%2Focto%2Fhello%2Ftree%2Fmain
//!   ...
//!
//! entry file:
//!   {"key":"...","fetched_at_ms":...,"ttl_ms":...}\n
//!   <payload bytes>
//!
//! put:  per-key mutex -> temp file in dir -> rename over entry
//!       (mutex dropped from the map once no one else holds it)
//! get:  read whole file (old or new, never partial)
//!       fresh if now - fetched_at < ttl, else stale
//!       corrupt -> removed, reported as miss
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace, warn};

use crate::error::CacheError;
use crate::remote::{PageToken, RepoRef};

/// Longest escaped key used verbatim as a file name.
const MAX_FILE_NAME: usize = 180;

/// Stable address of a cache entry.
///
/// Owner, repository and user names are lowercased; paths and branch names
/// keep their case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Arbitrary key. Prefer the typed constructors.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// One page of a user's repository listing.
    #[must_use]
    pub fn repo_list(username: &str, page: Option<&PageToken>) -> Self {
        let page = page.map_or("1", PageToken::as_str);
        Self(format!("{}page/{page}", Self::user_prefix(username)))
    }

    #[must_use]
    pub fn default_branch(repo: &RepoRef) -> Self {
        Self(format!("{}branch", Self::repo_prefix(repo)))
    }

    #[must_use]
    pub fn tree(repo: &RepoRef, branch: &str) -> Self {
        Self(format!("{}tree/{branch}", Self::repo_prefix(repo)))
    }

    #[must_use]
    pub fn content(repo: &RepoRef, branch: &str, path: &str) -> Self {
        Self(format!("{}blob/{branch}/{path}", Self::repo_prefix(repo)))
    }

    /// Prefix shared by every key of one repository.
    #[must_use]
    pub fn repo_prefix(repo: &RepoRef) -> String {
        format!(
            "repo/{}/{}/",
            repo.owner.to_lowercase(),
            repo.name.to_lowercase()
        )
    }

    /// Prefix shared by every listing page of one user.
    #[must_use]
    pub fn user_prefix(username: &str) -> String {
        format!("repos/{}/", username.to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the entry: the escaped key, or for long keys a truncated
    /// escape plus a hash of the full key.
    fn file_name(&self) -> String {
        let escaped = escape(&self.0);
        if escaped.len() <= MAX_FILE_NAME {
            return escaped;
        }
        let mut cut = MAX_FILE_NAME - 17;
        while !escaped.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}~{:016x}", &escaped[..cut], fnv1a(self.0.as_bytes()))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Freshness of a cache hit relative to its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    #[must_use]
    pub const fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub payload: Vec<u8>,
    pub freshness: Freshness,
    pub fetched_at: SystemTime,
    pub ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    key: String,
    fetched_at_ms: u64,
    ttl_ms: u64,
}

/// Key-value store rooted at one directory.
///
/// Concurrent readers see either the previous or the fully written new value
/// of an entry. Writers to the same key are serialised.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CacheStore {
    /// Opens (creating if needed) the cache directory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Directory` if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| CacheError::Directory {
                path: root.display().to_string(),
                source,
            })?;
        debug!(path = %root.display(), "opened cache");
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    async fn lock_key(&self, key: &str) -> KeyLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        KeyLock {
            locks: &self.locks,
            key: key.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn held_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Looks up `key`. Unreadable or corrupt entries are misses.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheHit> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                trace!(%key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(%key, error = %err, "failed to read cache entry");
                return None;
            }
        };

        let Some((header, payload)) = decode_entry(&bytes).filter(|(h, _)| h.key == key.0) else {
            warn!(%key, path = %path.display(), "corrupt cache entry, removing");
            let _lock = self.lock_key(&key.0).await;
            if let Err(err) = tokio::fs::remove_file(&path).await {
                debug!(%key, error = %err, "failed to remove corrupt cache entry");
            }
            return None;
        };

        let fetched_at = UNIX_EPOCH + Duration::from_millis(header.fetched_at_ms);
        let ttl = Duration::from_millis(header.ttl_ms);
        let age = SystemTime::now()
            .duration_since(fetched_at)
            .unwrap_or(Duration::ZERO);
        let freshness = if age < ttl {
            Freshness::Fresh
        } else {
            Freshness::Stale
        };
        trace!(%key, ?freshness, ?age, "cache hit");
        Some(CacheHit {
            payload: payload.to_vec(),
            freshness,
            fetched_at,
            ttl,
        })
    }

    /// Stores `payload` under `key`, fetched now.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Write` if the entry cannot be written.
    pub async fn put(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.put_at(key, payload, ttl, SystemTime::now()).await
    }

    /// Stores `payload` under `key` with an explicit fetch time.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Write` if the entry cannot be written.
    pub async fn put_at(
        &self,
        key: &CacheKey,
        payload: &[u8],
        ttl: Duration,
        fetched_at: SystemTime,
    ) -> Result<(), CacheError> {
        let header = EntryHeader {
            key: key.0.clone(),
            fetched_at_ms: millis(fetched_at.duration_since(UNIX_EPOCH).unwrap_or_default()),
            ttl_ms: millis(ttl),
        };
        let mut bytes = serde_json::to_vec(&header).map_err(|e| CacheError::Encode {
            key: key.0.clone(),
            message: e.to_string(),
        })?;
        bytes.push(b'\n');
        bytes.extend_from_slice(payload);

        let _lock = self.lock_key(&key.0).await;

        let root = self.root.clone();
        let path = self.entry_path(key);
        let write_error = |source| CacheError::Write {
            key: key.0.clone(),
            source,
        };
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| write_error(std::io::Error::other(e)))?
        .map_err(write_error)?;

        trace!(%key, bytes = payload.len(), ?ttl, "cache put");
        Ok(())
    }

    /// Removes every entry whose key starts with `prefix`. Returns the number
    /// of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Directory` if the cache directory cannot be read.
    pub async fn invalidate(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            let Some(key) = read_key(&path).await else {
                continue;
            };
            if key.starts_with(prefix) {
                let _lock = self.lock_key(&key).await;
                if tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }
        debug!(prefix, removed, "invalidated cache entries");
        Ok(removed)
    }

    /// Removes every entry. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Directory` if the cache directory cannot be read.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        debug!(removed, "cleared cache");
        Ok(removed)
    }

    /// Entry files, skipping in-progress temp files.
    async fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let dir_error = |source| CacheError::Directory {
            path: self.root.display().to_string(),
            source,
        };
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(dir_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(dir_error)? {
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            if is_file && !entry.file_name().to_string_lossy().starts_with('.') {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

/// Holds the per-key write lock; removes the map entry on drop when no other
/// writer is waiting for it.
struct KeyLock<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

fn decode_entry(bytes: &[u8]) -> Option<(EntryHeader, &[u8])> {
    let newline = bytes.iter().position(|b| *b == b'\n')?;
    let header = serde_json::from_slice(&bytes[..newline]).ok()?;
    Some((header, &bytes[newline + 1..]))
}

async fn read_key(path: &Path) -> Option<String> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).await.ok()?;
    serde_json::from_str::<EntryHeader>(line.trim_end())
        .ok()
        .map(|h| h.key)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Percent-escapes everything but ASCII alphanumerics, `-` and `_`.
fn escape(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// 64-bit FNV-1a, stable across builds.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests;
