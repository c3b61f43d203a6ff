//! Cache Engine Module
//!
//! The public cache handle: a generic entry store behind a reader-writer
//! lock, paired with a background sweeper task. Read paths take the lock
//! in shared mode; inserts, removals and close take it exclusively. Every
//! operation has a cancellable variant that checks a caller-supplied token
//! once at entry, it never interrupts work already in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::codec;
use crate::cache::stats::{CacheStats, Counters};
use crate::cache::store::{EntryCost, ExpiryCheck, Lookup, Store};
use crate::cache::DEFAULT_SWEEP_INTERVAL;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweeper;

// == Shared State ==
/// State shared between cache handles and the sweeper task.
pub(crate) struct Shared<V> {
    pub(crate) store: RwLock<Store<V>>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V: Clone> Shared<V> {
    /// One sweep cycle: mark expired keys under the shared lock, then
    /// delete them under the exclusive lock with a per-key expiry re-check.
    /// Eviction hooks fire after the lock is released, against the detached
    /// list, so a hook that re-enters the cache cannot deadlock.
    pub(crate) async fn sweep(&self) -> usize {
        let now = Utc::now();

        let marked = self.store.read().await.expired_keys(now);
        if marked.is_empty() {
            return 0;
        }

        let (hook, evicted) = {
            let mut store = self.store.write().await;
            (store.hook(), store.remove_marked(&marked, now))
        };

        let removed = evicted.len();
        if let Some(hook) = hook {
            for (key, value) in evicted {
                hook(key, value);
            }
        }

        removed
    }
}

// == Cache Builder ==
/// Configures and builds a [`Cache`].
///
/// Size accounting is an explicit policy chosen here: either a fixed byte
/// cost per entry (defaults to `size_of::<V>()`) or a weigher called per
/// value. The sweep interval defaults to
/// [`DEFAULT_SWEEP_INTERVAL`](crate::cache::DEFAULT_SWEEP_INTERVAL).
pub struct CacheBuilder<V> {
    sweep_interval: Duration,
    cost: EntryCost<V>,
}

impl<V> Default for CacheBuilder<V> {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            cost: EntryCost::default(),
        }
    }
}

impl<V> CacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval between background sweep cycles.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Accounts every entry at a fixed byte cost.
    pub fn entry_cost(mut self, bytes: u64) -> Self {
        self.cost = EntryCost::Fixed(bytes);
        self
    }

    /// Accounts entries with a caller-supplied weigher. The weigher must be
    /// pure: the same function credits an entry's cost back on removal.
    pub fn weigher(mut self, weigh: impl Fn(&V) -> u64 + Send + Sync + 'static) -> Self {
        self.cost = EntryCost::Weigher(Arc::new(weigh));
        self
    }

    /// Builds the cache and starts its paired sweeper.
    ///
    /// Must be called from within a tokio runtime; the sweeper is a spawned
    /// task tied to the cache's internally owned cancellation token.
    pub fn build(self) -> Cache<V> {
        let counters = Arc::new(Counters::default());
        let cancel = CancellationToken::new();

        let shared = Arc::new(Shared {
            store: RwLock::new(Store::new(self.cost, Arc::clone(&counters))),
            counters,
            cancel: cancel.clone(),
            sweeper: Mutex::new(None),
        });

        let handle = spawn_sweeper(Arc::downgrade(&shared), cancel, self.sweep_interval);
        *shared.sweeper.lock() = Some(handle);

        Cache { inner: shared }
    }
}

// == Cache ==
/// A thread-safe in-process key-value cache with per-entry TTL.
///
/// Handles are cheap to clone and share one underlying store. Expired
/// entries are removed lazily by the read that discovers them and eagerly
/// by the background sweeper; each physical expiry fires the registered
/// eviction hook exactly once, whichever path gets there first.
pub struct Cache<V> {
    inner: Arc<Shared<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with default settings. See [`CacheBuilder::build`].
    pub fn new() -> Self {
        CacheBuilder::new().build()
    }

    pub fn builder() -> CacheBuilder<V> {
        CacheBuilder::new()
    }

    // == Set ==
    /// Stores a key-value pair expiring `ttl` from now, overwriting any
    /// prior entry for the key.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        let mut store = self.inner.store.write().await;
        store.insert(key.into(), value, ttl)
    }

    /// [`set`](Self::set) behind a cancellation pre-check: fails with
    /// [`CacheError::Cancelled`] and performs no mutation if the token has
    /// already fired. The check is a single point-in-time test; once past
    /// it, the write runs to completion.
    pub async fn set_with_token(
        &self,
        token: &CancellationToken,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
    ) -> Result<()> {
        if token.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        self.set(key, value, ttl).await
    }

    // == Get ==
    /// Retrieves the value for a key.
    ///
    /// A live entry counts a hit. A missing key counts a miss and fails
    /// with [`CacheError::NotFound`]. An expired entry is evicted as a side
    /// effect (hook fired after the lock drops), counts a miss and an
    /// eviction, and fails with [`CacheError::Expired`].
    pub async fn get(&self, key: &str) -> Result<V> {
        let now = Utc::now();

        {
            let store = self.inner.store.read().await;
            match store.lookup(key, now)? {
                Lookup::Hit(value) => return Ok(value),
                Lookup::Missing => return Err(CacheError::NotFound(key.to_string())),
                Lookup::Expired => {}
            }
        }

        // Expired under the shared lock: upgrade and re-check, the sweeper
        // or a writer may have raced us in the window.
        let (hook, outcome) = {
            let mut store = self.inner.store.write().await;
            let outcome = store.remove_expired(key, now)?;
            (store.hook(), outcome)
        };

        match outcome {
            ExpiryCheck::StillLive(value) => Ok(value),
            ExpiryCheck::Gone => Err(CacheError::Expired(key.to_string())),
            ExpiryCheck::Removed(value) => {
                if let Some(hook) = hook {
                    hook(key.to_string(), value);
                }
                Err(CacheError::Expired(key.to_string()))
            }
        }
    }

    /// [`get`](Self::get) behind a cancellation pre-check.
    pub async fn get_with_token(&self, token: &CancellationToken, key: &str) -> Result<V> {
        if token.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        self.get(key).await
    }

    // == Eviction Hook ==
    /// Registers a callback invoked with `(key, value)` on every
    /// expiry-driven removal, lazy or sweeper-driven. Replaces any
    /// previously registered callback. Hooks run after the engine lock is
    /// released, so re-entering the cache from a hook is safe.
    pub async fn on_evicted(&self, hook: impl Fn(String, V) + Send + Sync + 'static) -> Result<()> {
        let mut store = self.inner.store.write().await;
        store.set_hook(Arc::new(hook))
    }

    // == Stat ==
    /// Returns a snapshot of the usage statistics. Lock-free; remains valid
    /// after [`close`](Self::close) and reports the final figures.
    pub fn stat(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    // == Length ==
    /// Current number of entries; 0 once closed.
    pub async fn len(&self) -> usize {
        self.inner.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Snapshot ==
    /// Serializes the current entry map to a JSON snapshot: each key mapped
    /// to its value and absolute expiry instant. Entries already past
    /// expiry are included; a consumer restoring the snapshot may observe
    /// them as expired on first read.
    pub async fn snapshot(&self) -> Result<Vec<u8>>
    where
        V: Serialize,
    {
        let store = self.inner.store.read().await;
        codec::encode(store.entries()?)
    }

    /// [`snapshot`](Self::snapshot) behind a cancellation pre-check.
    pub async fn snapshot_with_token(&self, token: &CancellationToken) -> Result<Vec<u8>>
    where
        V: Serialize,
    {
        if token.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        self.snapshot().await
    }

    // == Restore ==
    /// Parses a snapshot and merges it into this cache: snapshot keys
    /// overwrite existing entries, other keys are untouched. Malformed
    /// input fails with [`CacheError::Decode`] and leaves the map
    /// untouched. Statistics are not reset.
    pub async fn restore(&self, bytes: &[u8]) -> Result<()>
    where
        V: DeserializeOwned,
    {
        let mut store = self.inner.store.write().await;
        if store.is_closed() {
            return Err(CacheError::Closed);
        }

        let decoded = codec::decode(bytes)?;
        store.merge(decoded)
    }

    /// [`restore`](Self::restore) behind a cancellation pre-check.
    pub async fn restore_with_token(&self, token: &CancellationToken, bytes: &[u8]) -> Result<()>
    where
        V: DeserializeOwned,
    {
        if token.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        self.restore(bytes).await
    }

    // == Close ==
    /// Closes the cache: discards the entry map, cancels the lifetime token
    /// and waits for the sweeper task to finish. Idempotent; subsequent
    /// calls are no-ops. All other operations fail with
    /// [`CacheError::Closed`] afterward; [`stat`](Self::stat) keeps working.
    pub async fn close(&self) {
        let was_open = self.inner.store.write().await.close();
        if !was_open {
            return;
        }

        debug!("cache closed, stopping sweeper");
        self.inner.cancel.cancel();

        let handle = self.inner.sweeper.lock().take();
        if let Some(handle) = handle {
            // Join errors carry nothing worth recovering here.
            let _ = handle.await;
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache: Cache<String> = Cache::new();

        cache
            .set("key1", "value1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("key1").await.unwrap(), "value1");
        assert_eq!(cache.len().await, 1);

        cache.close().await;
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache: Cache<u32> = Cache::new();

        let result = cache.get("nope").await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        let stats = cache.stat();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);

        cache.close().await;
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let cache: Cache<u32> = Cache::builder()
            .sweep_interval(Duration::from_secs(3600))
            .build();

        cache.set("key1", 5, Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = cache.get("key1").await;
        assert!(matches!(result, Err(CacheError::Expired(_))));
        assert_eq!(cache.stat().evictions, 1);
        assert_eq!(cache.len().await, 0);

        // Entry is gone now; a second read is an ordinary miss.
        let result = cache.get("key1").await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        cache.close().await;
    }

    #[tokio::test]
    async fn test_overwrite_is_not_an_eviction() {
        let cache: Cache<u32> = Cache::new();

        cache.set("key1", 1, Duration::from_secs(60)).await.unwrap();
        cache.set("key1", 2, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("key1").await.unwrap(), 2);
        assert_eq!(cache.stat().evictions, 0);
        assert_eq!(cache.len().await, 1);

        cache.close().await;
    }

    #[tokio::test]
    async fn test_cancelled_token_blocks_entry() {
        let cache: Cache<u32> = Cache::new();
        let token = CancellationToken::new();
        token.cancel();

        let result = cache
            .set_with_token(&token, "key1", 1, Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
        assert!(cache.is_empty().await);

        let result = cache.get_with_token(&token, "key1").await;
        assert!(matches!(result, Err(CacheError::Cancelled)));

        // No read attempt completed, so no counter moved.
        let stats = cache.stat();
        assert_eq!(stats.hits + stats.misses, 0);

        cache.close().await;
    }

    #[tokio::test]
    async fn test_live_token_passes_through() {
        let cache: Cache<u32> = Cache::new();
        let token = CancellationToken::new();

        cache
            .set_with_token(&token, "key1", 7, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get_with_token(&token, "key1").await.unwrap(), 7);

        cache.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let cache: Cache<u32> = Cache::new();
        cache.set("key1", 1, Duration::from_secs(60)).await.unwrap();

        cache.close().await;
        cache.close().await;

        assert!(matches!(cache.get("key1").await, Err(CacheError::Closed)));
        assert!(matches!(
            cache.set("key2", 2, Duration::from_secs(60)).await,
            Err(CacheError::Closed)
        ));
        assert!(matches!(
            cache.on_evicted(|_, _| {}).await,
            Err(CacheError::Closed)
        ));
        assert!(matches!(cache.snapshot().await, Err(CacheError::Closed)));
        assert!(matches!(cache.restore(b"{}").await, Err(CacheError::Closed)));
    }

    #[tokio::test]
    async fn test_stat_survives_close() {
        let cache: Cache<u32> = Cache::new();

        cache.set("key1", 1, Duration::from_secs(60)).await.unwrap();
        cache.get("key1").await.unwrap();
        cache.close().await;

        let stats = cache.stat();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.hit_rate, 100.0);
    }

    #[tokio::test]
    async fn test_fixed_entry_cost_accounting() {
        let cache: Cache<u32> = Cache::builder().entry_cost(100).build();

        cache.set("a", 1, Duration::from_secs(60)).await.unwrap();
        cache.set("b", 2, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.stat().size_bytes, 200);

        // Overwrite does not change the figure under a fixed cost.
        cache.set("a", 3, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.stat().size_bytes, 200);

        cache.close().await;
    }
}
