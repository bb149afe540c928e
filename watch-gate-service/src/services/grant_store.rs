//! Durable grant storage.
//!
//! The store is the only component that reads or writes persisted grants.
//! It keeps the loaded snapshot in memory and writes the full snapshot back
//! on every mutation. A mutation becomes visible to readers only after the
//! backend has durably accepted it, so a failed write leaves both the file
//! and the in-memory view at their previous state.

use crate::models::{Grant, UserIdentity};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type UserLocks = DashMap<UserIdentity, Arc<Mutex<()>>>;

/// Timestamp layout written by earlier versions of the bot (naive UTC).
const LEGACY_EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("grant file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Full persisted state: user -> grant expiry.
pub type GrantSnapshot = BTreeMap<UserIdentity, DateTime<Utc>>;

/// Stable storage for grant snapshots.
#[async_trait]
pub trait GrantBackend: Send + Sync {
    async fn load(&self) -> Result<GrantSnapshot, StoreError>;

    /// Persist the whole snapshot. Must not return `Ok` before the data is
    /// durable, and must leave the previous state intact on failure.
    async fn persist(&self, snapshot: &GrantSnapshot) -> Result<(), StoreError>;
}

/// Human-readable JSON object `{ "<user>": "<RFC 3339 expiry>" }`.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "grants.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl GrantBackend for JsonFileBackend {
    async fn load(&self) -> Result<GrantSnapshot, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No grant file yet, starting empty");
                return Ok(GrantSnapshot::new());
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        if raw.trim().is_empty() {
            return Ok(GrantSnapshot::new());
        }

        let entries: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        let mut snapshot = GrantSnapshot::new();
        for (user, expiry) in entries {
            match parse_expiry(&expiry) {
                Some(expires_at) => {
                    snapshot.insert(UserIdentity::new(user), expires_at);
                }
                None => {
                    tracing::warn!(user_id = %user, "Skipping grant with unreadable expiry");
                }
            }
        }

        Ok(snapshot)
    }

    async fn persist(&self, snapshot: &GrantSnapshot) -> Result<(), StoreError> {
        let entries: BTreeMap<&str, String> = snapshot
            .iter()
            .map(|(user, expires_at)| (user.as_str(), expires_at.to_rfc3339()))
            .collect();
        let body = serde_json::to_vec_pretty(&entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }

        // Write a sibling file, flush it to disk, then atomically swap it in.
        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| self.io_error(&temp, e))?;
        file.write_all(&body)
            .await
            .map_err(|e| self.io_error(&temp, e))?;
        file.sync_all().await.map_err(|e| self.io_error(&temp, e))?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;

        // The rename is only durable once the directory entry is on disk.
        sync_dir(self.path.parent()).await
    }
}

#[cfg(unix)]
async fn sync_dir(dir: Option<&Path>) -> Result<(), StoreError> {
    let dir = match dir.filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };
    let target = dir.clone();
    tokio::task::spawn_blocking(move || std::fs::File::open(&target)?.sync_all())
        .await
        .map_err(std::io::Error::other)
        .and_then(|synced| synced)
        .map_err(|source| StoreError::Io { path: dir, source })
}

#[cfg(not(unix))]
async fn sync_dir(_dir: Option<&Path>) -> Result<(), StoreError> {
    Ok(())
}

/// Volatile backend for tests; writes can be made to fail on demand.
#[derive(Default)]
pub struct MemoryBackend {
    data: std::sync::Mutex<GrantSnapshot>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn with_snapshot(snapshot: GrantSnapshot) -> Self {
        Self {
            data: std::sync::Mutex::new(snapshot),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// What a restarted process would load.
    pub fn persisted(&self) -> GrantSnapshot {
        self.data
            .lock()
            .map(|data| data.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GrantBackend for MemoryBackend {
    async fn load(&self) -> Result<GrantSnapshot, StoreError> {
        Ok(self.persisted())
    }

    async fn persist(&self, snapshot: &GrantSnapshot) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        let mut data = self
            .data
            .lock()
            .map_err(|_| StoreError::Unavailable("memory backend poisoned".to_string()))?;
        *data = snapshot.clone();
        Ok(())
    }
}

/// Grant store shared by every request handler.
pub struct GrantStore {
    backend: Arc<dyn GrantBackend>,
    grants: RwLock<GrantSnapshot>,
    write_lock: Mutex<()>,
    user_locks: UserLocks,
}

impl GrantStore {
    /// Load the full persisted state from `backend`.
    pub async fn open(backend: Arc<dyn GrantBackend>) -> Result<Self, StoreError> {
        let snapshot = backend.load().await?;
        tracing::info!(grants = snapshot.len(), "Grant store loaded");

        Ok(Self {
            backend,
            grants: RwLock::new(snapshot),
            write_lock: Mutex::new(()),
            user_locks: DashMap::new(),
        })
    }

    pub async fn open_file(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(Arc::new(JsonFileBackend::new(path))).await
    }

    /// Stored grant for `user`, live or not.
    pub async fn get(&self, user: &UserIdentity) -> Option<Grant> {
        self.grants
            .read()
            .await
            .get(user)
            .map(|expires_at| Grant {
                user: user.clone(),
                expires_at: *expires_at,
            })
    }

    /// Replace the grant for `user` and persist before returning.
    pub async fn put(
        &self,
        user: &UserIdentity,
        expires_at: DateTime<Utc>,
    ) -> Result<Grant, StoreError> {
        let _write = self.write_lock.lock().await;

        let mut next = self.grants.read().await.clone();
        next.insert(user.clone(), expires_at);
        self.backend.persist(&next).await?;
        *self.grants.write().await = next;

        Ok(Grant {
            user: user.clone(),
            expires_at,
        })
    }

    /// Exclusive mutation lock for one user.
    ///
    /// Hold it across any read-compute-`put` sequence for that user.
    pub async fn lock_user(&self, user: &UserIdentity) -> UserLock<'_> {
        let lock = self
            .user_locks
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        UserLock {
            guard: Some(lock.lock_owned().await),
            user: user.clone(),
            locks: &self.user_locks,
        }
    }

    pub async fn len(&self) -> usize {
        self.grants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.grants.read().await.is_empty()
    }

    /// Number of grants still live at `now`.
    pub async fn live_count(&self, now: DateTime<Utc>) -> usize {
        self.grants
            .read()
            .await
            .values()
            .filter(|expires_at| now <= **expires_at)
            .count()
    }
}

/// Held per-user lock. The map entry goes away with the last holder.
pub struct UserLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    user: UserIdentity,
    locks: &'a UserLocks,
}

impl Drop for UserLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold their own clone, so a count of one means only the map.
        self.locks
            .remove_if(&self.user, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, LEGACY_EXPIRY_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
}
