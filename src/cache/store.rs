//! Cache Store Module
//!
//! The state protected by the engine's reader-writer lock: the entry map,
//! the eviction hook and the size-accounting policy. All methods here run
//! with the lock already held; [`Cache`](crate::Cache) decides the lock mode
//! and fires eviction hooks only after releasing it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::stats::Counters;
use crate::cache::Entry;
use crate::error::{CacheError, Result};

// == Eviction Hook ==
/// Callback invoked with the key and value of every expiry-driven removal.
pub(crate) type EvictionHook<V> = Arc<dyn Fn(String, V) + Send + Sync>;

// == Entry Cost ==
/// Size-accounting policy, fixed at construction.
///
/// Either a flat per-entry byte cost or a caller-supplied weigher. The
/// weigher must be pure: each entry is charged on insert and credited back
/// on removal using the same function.
pub(crate) enum EntryCost<V> {
    Fixed(u64),
    Weigher(Arc<dyn Fn(&V) -> u64 + Send + Sync>),
}

impl<V> EntryCost<V> {
    pub(crate) fn of(&self, value: &V) -> u64 {
        match self {
            EntryCost::Fixed(bytes) => *bytes,
            EntryCost::Weigher(weigh) => weigh(value),
        }
    }
}

impl<V> Default for EntryCost<V> {
    fn default() -> Self {
        EntryCost::Fixed(std::mem::size_of::<V>() as u64)
    }
}

impl<V> Clone for EntryCost<V> {
    fn clone(&self) -> Self {
        match self {
            EntryCost::Fixed(bytes) => EntryCost::Fixed(*bytes),
            EntryCost::Weigher(weigh) => EntryCost::Weigher(Arc::clone(weigh)),
        }
    }
}

// == Lookup Outcome ==
/// Result of a shared-lock lookup.
pub(crate) enum Lookup<V> {
    /// Live entry; hit recorded, value cloned out.
    Hit(V),
    /// Entry present but past its expiry instant; removal needs the
    /// exclusive lock.
    Expired,
    /// No entry for the key; miss recorded.
    Missing,
}

// == Expiry Check Outcome ==
/// Result of re-checking an expired-looking key under the exclusive lock.
///
/// Between the shared-lock observation and the exclusive-lock removal the
/// key may have been swept or overwritten; the re-check decides which path
/// actually happened.
pub(crate) enum ExpiryCheck<V> {
    /// Entry was still expired and has been removed; value detached for the
    /// eviction hook.
    Removed(V),
    /// Entry was replaced with a live one in the window; treated as a hit.
    StillLive(V),
    /// Entry already removed (the sweeper won the race); miss recorded, the
    /// hook firing happened on the sweeper side.
    Gone,
}

// == Cache Store ==
/// Entry map plus eviction hook and cost policy.
///
/// `entries` is `None` once the store is closed; the map is permanently
/// absent from then on and every operation reports [`CacheError::Closed`].
pub(crate) struct Store<V> {
    /// Key-value storage; `None` = closed
    entries: Option<HashMap<String, Entry<V>>>,
    /// Registered eviction callback, at most one
    on_evicted: Option<EvictionHook<V>>,
    /// Size-accounting policy
    cost: EntryCost<V>,
    /// Shared live counters, also readable without the lock
    counters: Arc<Counters>,
}

impl<V> Store<V> {
    // == Constructor ==
    pub(crate) fn new(cost: EntryCost<V>, counters: Arc<Counters>) -> Self {
        Self {
            entries: Some(HashMap::new()),
            on_evicted: None,
            cost,
            counters,
        }
    }

    // == Closed State ==
    pub(crate) fn is_closed(&self) -> bool {
        self.entries.is_none()
    }

    /// Discards the entry map and the hook. Returns false if already closed.
    pub(crate) fn close(&mut self) -> bool {
        if self.entries.is_none() {
            return false;
        }

        self.entries = None;
        self.on_evicted = None;
        true
    }

    // == Eviction Hook ==
    /// Registers the eviction callback, replacing any previous one.
    pub(crate) fn set_hook(&mut self, hook: EvictionHook<V>) -> Result<()> {
        if self.entries.is_none() {
            return Err(CacheError::Closed);
        }

        self.on_evicted = Some(hook);
        Ok(())
    }

    /// Returns a clone of the registered hook, if any.
    pub(crate) fn hook(&self) -> Option<EvictionHook<V>> {
        self.on_evicted.clone()
    }

    // == Insert ==
    /// Stores a key-value pair with the given TTL, overwriting any prior
    /// entry. Charges the new entry's cost and credits the replaced one's,
    /// so overwrites never drift the size figure.
    pub(crate) fn insert(&mut self, key: String, value: V, ttl: Duration) -> Result<()> {
        let Some(entries) = self.entries.as_mut() else {
            return Err(CacheError::Closed);
        };

        let charge = self.cost.of(&value);

        if let Some(replaced) = entries.insert(key, Entry::new(value, ttl)) {
            self.counters.sub_bytes(self.cost.of(&replaced.value));
        }
        self.counters.add_bytes(charge);

        Ok(())
    }

    // == Entries Access ==
    /// Immutable view of the entry map, or `Closed`.
    pub(crate) fn entries(&self) -> Result<&HashMap<String, Entry<V>>> {
        self.entries.as_ref().ok_or(CacheError::Closed)
    }

    // == Length ==
    pub(crate) fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, HashMap::len)
    }

    // == Sweep: Mark Phase ==
    /// Collects every key whose expiry instant is at or before `now`.
    /// Runs under the shared lock; never mutates.
    pub(crate) fn expired_keys(&self, now: DateTime<Utc>) -> Vec<String> {
        let Some(entries) = self.entries.as_ref() else {
            return Vec::new();
        };

        entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Sweep: Delete Phase ==
    /// Removes the marked keys, re-validating expiry per key so an entry
    /// re-inserted fresh between the mark and delete phases survives.
    ///
    /// Returns the detached `(key, value)` pairs; the caller fires the
    /// eviction hook after releasing the lock.
    pub(crate) fn remove_marked(
        &mut self,
        marked: &[String],
        now: DateTime<Utc>,
    ) -> Vec<(String, V)> {
        let Some(entries) = self.entries.as_mut() else {
            return Vec::new();
        };

        let mut evicted = Vec::new();

        for key in marked {
            let still_expired = entries
                .get(key)
                .is_some_and(|entry| entry.is_expired_at(now));
            if !still_expired {
                continue;
            }

            if let Some(entry) = entries.remove(key) {
                self.counters.record_eviction();
                self.counters.sub_bytes(self.cost.of(&entry.value));
                evicted.push((key.clone(), entry.value));
            }
        }

        evicted
    }

    // == Snapshot Merge ==
    /// Merges decoded snapshot entries into the map. Snapshot keys overwrite
    /// existing entries; keys not in the snapshot are untouched. Statistics
    /// are not reset; merged entries are charged like inserts.
    pub(crate) fn merge(&mut self, decoded: HashMap<String, Entry<V>>) -> Result<()> {
        let Some(entries) = self.entries.as_mut() else {
            return Err(CacheError::Closed);
        };

        for (key, entry) in decoded {
            let charge = self.cost.of(&entry.value);

            if let Some(replaced) = entries.insert(key, entry) {
                self.counters.sub_bytes(self.cost.of(&replaced.value));
            }
            self.counters.add_bytes(charge);
        }

        Ok(())
    }
}

impl<V: Clone> Store<V> {
    // == Lookup ==
    /// Shared-lock read. Records the hit or miss; an expired entry records
    /// nothing yet, the exclusive-lock re-check settles it.
    pub(crate) fn lookup(&self, key: &str, now: DateTime<Utc>) -> Result<Lookup<V>> {
        let Some(entries) = self.entries.as_ref() else {
            return Err(CacheError::Closed);
        };

        match entries.get(key) {
            None => {
                self.counters.record_miss();
                Ok(Lookup::Missing)
            }
            Some(entry) if entry.is_expired_at(now) => Ok(Lookup::Expired),
            Some(entry) => {
                self.counters.record_hit();
                Ok(Lookup::Hit(entry.value.clone()))
            }
        }
    }

    // == Lazy Expiry ==
    /// Exclusive-lock follow-up to a [`Lookup::Expired`] observation.
    /// Re-checks the entry before removing it; see [`ExpiryCheck`] for the
    /// race outcomes. Records the counters for whichever path applies.
    pub(crate) fn remove_expired(&mut self, key: &str, now: DateTime<Utc>) -> Result<ExpiryCheck<V>> {
        let Some(entries) = self.entries.as_mut() else {
            return Err(CacheError::Closed);
        };

        match entries.get(key) {
            None => {
                self.counters.record_miss();
                return Ok(ExpiryCheck::Gone);
            }
            Some(entry) if !entry.is_expired_at(now) => {
                self.counters.record_hit();
                return Ok(ExpiryCheck::StillLive(entry.value.clone()));
            }
            Some(_) => {}
        }

        // Still present and still expired: evict.
        if let Some(entry) = entries.remove(key) {
            self.counters.record_miss();
            self.counters.record_eviction();
            self.counters.sub_bytes(self.cost.of(&entry.value));
            Ok(ExpiryCheck::Removed(entry.value))
        } else {
            self.counters.record_miss();
            Ok(ExpiryCheck::Gone)
        }
    }
}
