//! Write-behind avatar cache.
//!
//! Reads and writes go through an in-memory buffer so the event path
//! never waits on SQLite. A background task flushes the buffer in
//! batches; a circuit breaker pauses store access after repeated
//! failures so a broken database cannot slow the feed down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::{CacheStoreSettings, WriteBehindConfig};
use crate::store::AvatarStore;

/// One buffered avatar write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Owner uid.
    pub uid: u64,

    /// Avatar URL to remember.
    pub face_url: String,

    /// When the URL was observed.
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(uid: u64, face_url: impl Into<String>) -> Self {
        Self {
            uid,
            face_url: face_url.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Failure gate in front of the store.
///
/// Trips after `threshold` consecutive failures. While tripped, one
/// probe is allowed per cooldown window; a probe success re-opens the
/// gate, a probe failure re-arms the cooldown.
#[derive(Debug)]
struct Breaker {
    threshold: u32,
    cooldown: std::time::Duration,
    consecutive_failures: u32,
    healthy: bool,
    recover_at: Option<Instant>,
}

impl Breaker {
    fn new(threshold: u32, cooldown: std::time::Duration) -> Self {
        Self {
            threshold,
            cooldown,
            consecutive_failures: 0,
            healthy: true,
            recover_at: None,
        }
    }

    fn allows(&self) -> bool {
        if self.healthy {
            return true;
        }
        self.recover_at.is_none_or(|at| Instant::now() >= at)
    }

    /// Returns whether this success re-opened a tripped breaker.
    fn record_success(&mut self) -> bool {
        let recovered = !self.healthy;
        self.healthy = true;
        self.consecutive_failures = 0;
        self.recover_at = None;
        recovered
    }

    /// Returns whether this failure tripped the breaker.
    fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.healthy {
            if self.consecutive_failures >= self.threshold {
                self.healthy = false;
                self.recover_at = Some(Instant::now() + self.cooldown);
                return true;
            }
            return false;
        }
        self.recover_at = Some(Instant::now() + self.cooldown);
        false
    }
}

#[derive(Debug)]
struct CacheInner {
    store: Option<AvatarStore>,
    config: WriteBehindConfig,
    pending: Mutex<HashMap<u64, CacheEntry>>,
    breaker: Mutex<Breaker>,
    flush_signal: Notify,
}

impl CacheInner {
    fn note_success(&self) {
        if self.breaker.lock().record_success() {
            info!("Avatar store recovered, resuming cache access");
        }
    }

    fn note_failure(&self, op: &'static str, error: &dyn std::fmt::Display) {
        if self.breaker.lock().record_failure() {
            warn!(op, error = %error, "Avatar store unhealthy, pausing cache access");
        } else {
            debug!(op, error = %error, "Avatar store operation failed");
        }
    }
}

/// Buffered, failure-isolated view of the avatar store.
///
/// `put` is synchronous and only touches memory. `get` checks the
/// buffer first, then reads the store under a short timeout. Entries
/// from a failed flush are dropped, not retried.
#[derive(Debug)]
pub struct WriteBehindCache {
    inner: Arc<CacheInner>,
    flush_task: Option<JoinHandle<()>>,
}

impl WriteBehindCache {
    /// Creates a cache with no backing store.
    ///
    /// Every operation is a no-op. Does not need a runtime.
    pub fn disabled() -> Self {
        Self::with_store(None, WriteBehindConfig::default())
    }

    /// Opens the avatar store and starts the flush task.
    ///
    /// A store that fails to open disables the cache instead of
    /// failing the caller.
    pub fn open(settings: &CacheStoreSettings, config: WriteBehindConfig) -> Self {
        match AvatarStore::open(settings) {
            Ok(store) => Self::with_store(Some(store), config),
            Err(e) => {
                warn!(
                    path = %settings.path.display(),
                    error = %e,
                    "Avatar store unavailable, cache disabled"
                );
                Self::with_store(None, config)
            }
        }
    }

    fn with_store(store: Option<AvatarStore>, config: WriteBehindConfig) -> Self {
        let breaker = Breaker::new(config.breaker_threshold, config.breaker_cooldown);
        let inner = Arc::new(CacheInner {
            store,
            config,
            pending: Mutex::new(HashMap::new()),
            breaker: Mutex::new(breaker),
            flush_signal: Notify::new(),
        });
        let flush_task = inner
            .store
            .is_some()
            .then(|| tokio::spawn(run_flusher(Arc::clone(&inner))));
        Self { inner, flush_task }
    }

    /// Whether a backing store is attached.
    pub fn is_enabled(&self) -> bool {
        self.inner.store.is_some()
    }

    /// Whether the breaker currently considers the store healthy.
    pub fn is_healthy(&self) -> bool {
        self.inner.breaker.lock().healthy
    }

    /// Number of writes waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Looks up an avatar URL, preferring the write buffer.
    ///
    /// While the breaker is open every lookup fails fast, buffered or
    /// not.
    pub async fn get(&self, uid: u64) -> Option<String> {
        let store = self.inner.store.as_ref()?;
        if !self.inner.breaker.lock().allows() {
            trace!(uid, "Avatar store paused, skipping read");
            return None;
        }
        if let Some(entry) = self.inner.pending.lock().get(&uid) {
            return Some(entry.face_url.clone());
        }

        let store = store.clone();
        let read = task::spawn_blocking(move || store.select_face(uid));
        match time::timeout(self.inner.config.read_timeout, read).await {
            Ok(Ok(Ok(face))) => {
                self.inner.note_success();
                face
            }
            Ok(Ok(Err(e))) => {
                self.inner.note_failure("read", &e);
                None
            }
            Ok(Err(e)) => {
                self.inner.note_failure("read", &e);
                None
            }
            Err(e) => {
                self.inner.note_failure("read", &e);
                None
            }
        }
    }

    /// Buffers one write. Last write per uid wins.
    ///
    /// When the buffer reaches its cap the flush task is woken, or the
    /// whole buffer is shed if the store is paused.
    pub fn put(&self, entry: CacheEntry) {
        if self.inner.store.is_none() {
            return;
        }
        let pending_len = {
            let mut pending = self.inner.pending.lock();
            pending.insert(entry.uid, entry);
            pending.len()
        };
        if pending_len < self.inner.config.max_pending {
            return;
        }
        if self.inner.breaker.lock().allows() {
            self.inner.flush_signal.notify_one();
        } else {
            let shed = {
                let mut pending = self.inner.pending.lock();
                let shed = pending.len();
                pending.clear();
                shed
            };
            warn!(shed, "Avatar buffer full while store paused, shedding writes");
        }
    }

    /// Flushes the buffer immediately.
    pub async fn flush_now(&self) {
        flush_batch(&self.inner).await;
    }
}

impl Drop for WriteBehindCache {
    fn drop(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }
}

async fn run_flusher(inner: Arc<CacheInner>) {
    let mut ticker = time::interval(inner.config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    debug!(
        interval_secs = inner.config.flush_interval.as_secs_f64(),
        "Avatar flush task started"
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.flush_signal.notified() => {}
        }
        flush_batch(&inner).await;
    }
}

async fn flush_batch(inner: &Arc<CacheInner>) {
    let Some(store) = inner.store.as_ref() else {
        return;
    };
    if !inner.breaker.lock().allows() {
        trace!("Avatar store paused, skipping flush");
        return;
    }
    let batch: Vec<CacheEntry> = {
        let mut pending = inner.pending.lock();
        if pending.is_empty() {
            return;
        }
        pending.drain().map(|(_, entry)| entry).collect()
    };

    let rows = batch.len();
    let store = store.clone();
    let write = task::spawn_blocking(move || store.upsert_many(&batch));
    match time::timeout(inner.config.flush_timeout, write).await {
        Ok(Ok(Ok(()))) => {
            inner.note_success();
            debug!(rows, "Avatar batch flushed");
        }
        Ok(Ok(Err(e))) => inner.note_failure("flush", &e),
        Ok(Err(e)) => inner.note_failure("flush", &e),
        Err(e) => inner.note_failure("flush", &e),
    }
}
