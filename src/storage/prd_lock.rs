//! Serialized, crash-safe access to the shared task document (the PRD).
//!
//! Every mutation of a PRD file goes through [`PrdLock`]. Each resolved path
//! gets its own FIFO-fair `tokio::sync::Mutex`, so two sessions writing the
//! same file take turns in arrival order while writes to different files do
//! not contend. Writes themselves use [`atomic_write`].

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::events::{Observer, ObserverSlot};
use crate::error::{RalphError, Result};
use crate::storage::atomic::atomic_write;
use crate::storage::config::Config;

/// Lock policy. Also the `[prd_lock]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrdLockConfig {
    /// First retry delay; doubles on each further retry.
    pub base_delay_ms: u64,
    pub max_retries: u32,
    /// How long one acquisition attempt waits for the current holder.
    pub acquire_timeout_ms: u64,
}

impl Default for PrdLockConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_retries: 3,
            acquire_timeout_ms: 10_000,
        }
    }
}

impl PrdLockConfig {
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Sleep after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Events emitted by the PRD lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// An acquisition attempt timed out and will be retried after `delay`.
    LockRetry {
        path: PathBuf,
        attempt: u32,
        delay: Duration,
    },
    /// Every attempt timed out.
    LockFailed {
        path: PathBuf,
        attempts: u32,
        error: String,
    },
}

/// Result of [`PrdLock::write_with_lock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retries_used: u32,
    pub lock_acquired_at: Option<DateTime<Utc>>,
    pub write_completed_at: Option<DateTime<Utc>>,
}

/// Read-only view of one lock key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub path: PathBuf,
    pub locked: bool,
    pub queue_depth: usize,
}

#[derive(Debug, Default)]
struct LockEntry {
    mutex: tokio::sync::Mutex<()>,
    waiting: AtomicUsize,
    held: AtomicBool,
}

/// Counts a task as queued for as long as it lives.
struct Waiting<'a>(&'a LockEntry);

impl<'a> Waiting<'a> {
    fn enter(entry: &'a LockEntry) -> Self {
        entry.waiting.fetch_add(1, Ordering::SeqCst);
        Self(entry)
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Marks the entry held for as long as the mutex guard lives.
struct Held<'a> {
    entry: &'a LockEntry,
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.entry.held.store(false, Ordering::SeqCst);
    }
}

/// Resolve the lock key for `path`.
///
/// The parent directory is canonicalized so `./prd.json` and
/// `/abs/dir/prd.json` share a key even before the file exists.
#[must_use]
pub fn lock_key(path: &Path) -> PathBuf {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match (parent.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Per-path async lock with atomic writes.
///
/// Share across tasks with `Arc<PrdLock>`.
#[derive(Debug, Default)]
pub struct PrdLock {
    config: PrdLockConfig,
    entries: Mutex<HashMap<PathBuf, Arc<LockEntry>>>,
    observer: ObserverSlot<LockEvent>,
}

impl PrdLock {
    #[must_use]
    pub fn new(config: PrdLockConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            observer: ObserverSlot::empty(),
        }
    }

    /// Lock that reports retries and failures to `observer`.
    #[must_use]
    pub fn with_observer(config: PrdLockConfig, observer: Observer<LockEvent>) -> Self {
        Self {
            observer: ObserverSlot::new(observer),
            ..Self::new(config)
        }
    }

    /// Lock using the `[prd_lock]` section of a loaded config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.prd_lock.clone())
    }

    #[must_use]
    pub const fn config(&self) -> &PrdLockConfig {
        &self.config
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<LockEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, key: &Path) -> Arc<LockEntry> {
        Arc::clone(self.entries().entry(key.to_path_buf()).or_default())
    }

    fn emit(&self, event: &LockEvent) {
        match event {
            LockEvent::LockRetry {
                path,
                attempt,
                delay,
            } => tracing::warn!(
                path = %path.display(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "lock acquisition timed out, retrying"
            ),
            LockEvent::LockFailed {
                path,
                attempts,
                error,
            } => tracing::error!(
                path = %path.display(),
                attempts,
                error = %error,
                "lock acquisition failed"
            ),
        }
        self.observer.emit(event);
    }

    /// Run `f` while holding the lock for `path`, returning the number of
    /// acquisition attempts alongside its result.
    async fn run_locked<T, F, Fut>(&self, path: &Path, f: F) -> (Result<T>, u32)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = lock_key(path);
        let entry = self.entry(&key);
        let timeout = self.config.acquire_timeout();
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let acquired = {
                let _waiting = Waiting::enter(&entry);
                tokio::time::timeout(timeout, entry.mutex.lock()).await
            };

            if let Ok(guard) = acquired {
                entry.held.store(true, Ordering::SeqCst);
                let _held = Held {
                    entry: &entry,
                    _guard: guard,
                };
                tracing::debug!(path = %key.display(), attempt, "lock acquired");
                return (f().await, attempt);
            }

            let error = RalphError::LockTimeout {
                path: key.clone(),
                timeout_ms: self.config.acquire_timeout_ms,
                attempts: attempt,
            };
            if attempt >= max_attempts {
                self.emit(&LockEvent::LockFailed {
                    path: key.clone(),
                    attempts: attempt,
                    error: error.to_string(),
                });
                return (Err(error), attempt);
            }

            let delay = self.config.retry_delay(attempt);
            self.emit(&LockEvent::LockRetry {
                path: key.clone(),
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `f` with exclusive access to `path`.
    ///
    /// Acquisition timeouts are retried with doubling delays; errors from
    /// `f` propagate unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RalphError::LockTimeout`] when every attempt timed out, or
    /// whatever `f` returned.
    pub async fn with_lock<T, F, Fut>(&self, path: impl AsRef<Path>, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_locked(path.as_ref(), f).await.0
    }

    /// Atomically replace `path` with `content` under the lock.
    ///
    /// Never returns an error; failures are reported in the outcome.
    pub async fn write_with_lock(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<String>,
    ) -> WriteOutcome {
        let path = path.as_ref();
        let content = content.into();
        let target = path.to_path_buf();

        let (result, attempts) = self
            .run_locked(path, || async move {
                let acquired_at = Utc::now();
                let written = atomic_write(&target, content).await.map(|()| Utc::now());
                Ok((acquired_at, written))
            })
            .await;

        let retries_used = attempts.saturating_sub(1);
        let path = path.to_path_buf();
        match result {
            Ok((acquired_at, Ok(completed_at))) => {
                tracing::debug!(path = %path.display(), retries_used, "prd written");
                WriteOutcome {
                    path,
                    success: true,
                    error: None,
                    retries_used,
                    lock_acquired_at: Some(acquired_at),
                    write_completed_at: Some(completed_at),
                }
            }
            Ok((acquired_at, Err(err))) => {
                tracing::warn!(path = %path.display(), error = %err, "prd write failed");
                WriteOutcome {
                    path,
                    success: false,
                    error: Some(err.to_string()),
                    retries_used,
                    lock_acquired_at: Some(acquired_at),
                    write_completed_at: None,
                }
            }
            Err(err) => WriteOutcome {
                path,
                success: false,
                error: Some(err.to_string()),
                retries_used,
                lock_acquired_at: None,
                write_completed_at: None,
            },
        }
    }

    /// Read `path` under the lock so the read never overlaps a locked write.
    ///
    /// # Errors
    ///
    /// Returns [`RalphError::LockTimeout`] or the underlying I/O error.
    pub async fn read_with_lock(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        self.with_lock(path, || async move {
            tokio::fs::read_to_string(path)
                .await
                .map_err(RalphError::from)
        })
        .await
    }

    /// Holder and queue depth for `path`. Never creates lock state.
    #[must_use]
    pub fn status(&self, path: impl AsRef<Path>) -> LockStatus {
        let key = lock_key(path.as_ref());
        let entry = self.entries().get(&key).cloned();
        LockStatus {
            locked: entry
                .as_ref()
                .is_some_and(|e| e.held.load(Ordering::SeqCst)),
            queue_depth: entry.map_or(0, |e| e.waiting.load(Ordering::SeqCst)),
            path: key,
        }
    }

    #[must_use]
    pub fn is_locked(&self, path: impl AsRef<Path>) -> bool {
        self.status(path).locked
    }
}
