//! Persistent exponential-backoff bookkeeping per `(hash, url)` pair.
//!
//! Keying on the URL as well as the hash means a registry update pointing a
//! hash at a new location takes effect immediately, without inheriting the
//! failures of the old one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hashfetch_verify::ContentHash;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::atomic::atomic_write;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailRecord {
    pub attempts: Vec<Attempt>,
}

/// On-disk shape: `{ "<hash>:<url>": { "attempts": [{ "timestamp": ms }] } }`.
pub type FailHistory = BTreeMap<String, FailRecord>;

pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start_millis: u64) -> Self { Self(Arc::new(AtomicU64::new(start_millis))) }

    pub fn advance(&self, by: Duration) { self.0.fetch_add(by.as_millis() as u64, Ordering::SeqCst); }

    pub fn set(&self, millis: u64) { self.0.store(millis, Ordering::SeqCst); }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 { self.0.load(Ordering::SeqCst) }
}

/// `base_delay * 2^min(max_exponent, attempts)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_exponent:  u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 30_000,
            max_exponent:  16,
        }
    }
}

impl BackoffPolicy {
    pub fn delay_ms(&self, attempts: usize) -> u64 {
        let exponent = (attempts as u64).min(self.max_exponent as u64) as u32;
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent))
    }
}

/// Failed-attempt history with a coalescing, serialized write path.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct RetryLedger {
    inner: Arc<Inner>,
}

struct Inner {
    path:       PathBuf,
    policy:     BackoffPolicy,
    clock:      Arc<dyn Clock>,
    history:    Mutex<FailHistory>,
    dirty:      AtomicBool,
    write_lock: tokio::sync::Mutex<()>,
}

impl RetryLedger {
    pub fn new(path: impl Into<PathBuf>, policy: BackoffPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                policy,
                clock,
                history: Mutex::new(FailHistory::new()),
                dirty: AtomicBool::new(false),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path { &self.inner.path }

    pub fn policy(&self) -> BackoffPolicy { self.inner.policy }

    pub fn key(hash: &ContentHash, url: &str) -> String { format!("{hash}:{url}") }

    /// Read the persisted ledger.
    ///
    /// A missing file is created empty. A malformed file is logged and
    /// treated as empty; it will be overwritten on the next failure.
    pub async fn load(&self) -> Result<()> {
        let path = &self.inner.path;
        let history = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<FailHistory>(&bytes) {
                Ok(history) => history,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "couldn't parse retry ledger, starting empty");
                    FailHistory::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                atomic_write(path, b"{}").await?;
                FailHistory::new()
            }
            Err(e) => {
                return Err(Error::Io {
                    op:     "read",
                    path:   path.clone(),
                    source: e,
                });
            }
        };

        debug!(path = %path.display(), entries = history.len(), "retry ledger loaded");
        *self.history() = history;
        Ok(())
    }

    pub fn attempts(&self, hash: &ContentHash, url: &str) -> usize {
        self.history()
            .get(&Self::key(hash, url))
            .map_or(0, |record| record.attempts.len())
    }

    /// Earliest time (epoch ms) at which another attempt is allowed, or
    /// `None` when no failure has been recorded.
    pub fn next_attempt_at(&self, hash: &ContentHash, url: &str) -> Option<u64> {
        let history = self.history();
        let record = history.get(&Self::key(hash, url))?;
        let last = record.attempts.iter().map(|a| a.timestamp).max()?;
        Some(last.saturating_add(self.inner.policy.delay_ms(record.attempts.len())))
    }

    pub fn can_attempt(&self, hash: &ContentHash, url: &str) -> bool {
        match self.next_attempt_at(hash, url) {
            None => true,
            Some(earliest) => self.inner.clock.now_millis() > earliest,
        }
    }

    /// Append a timestamped failure and schedule a write.
    ///
    /// Persistence is best effort: write failures are logged, never returned.
    pub fn register_failed_attempt(&self, hash: &ContentHash, url: &str) {
        let timestamp = self.inner.clock.now_millis();
        {
            let mut history = self.history();
            history
                .entry(Self::key(hash, url))
                .or_default()
                .attempts
                .push(Attempt { timestamp });
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
        debug!(%hash, url, timestamp, "registered failed attempt");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move { inner.persist().await });
            }
            Err(_) => debug!("no runtime, ledger write deferred to next flush"),
        }
    }

    /// Wait for every scheduled write, flushing pending changes.
    pub async fn flush(&self) { self.inner.persist().await }

    pub fn entries(&self) -> FailHistory { self.history().clone() }

    fn history(&self) -> MutexGuard<'_, FailHistory> { self.inner.history() }
}

impl Inner {
    fn history(&self) -> MutexGuard<'_, FailHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One link of the write chain. Writers queue on `write_lock`; whoever
    /// gets it with the dirty flag set writes the current snapshot, the rest
    /// find nothing to do.
    async fn persist(&self) {
        let _guard = self.write_lock.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return;
        }

        let encoded = serde_json::to_vec_pretty(&*self.history());
        let result = match encoded {
            Ok(bytes) => atomic_write(&self.path, &bytes).await,
            Err(e) => Err(Error::from(e)),
        };

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to persist retry ledger");
            self.dirty.store(true, Ordering::SeqCst);
        }
    }
}
