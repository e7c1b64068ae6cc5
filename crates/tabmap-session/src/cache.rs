//! Time-bounded cache for raw sheet data.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tabmap_model::{RawSheet, TimestampMs};

use crate::backend::SheetSource;
use crate::clock::Clock;
use crate::error::Result;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Key/value cache whose entries expire `ttl` after they were set.
///
/// Expired entries are dropped lazily on lookup.
#[derive(Debug)]
pub struct TtlCache<K, V, C> {
    ttl_ms: i64,
    clock: Arc<C>,
    entries: Mutex<HashMap<K, (V, TimestampMs)>>,
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash,
    V: Clone,
    C: Clock,
{
    pub fn new(ttl: Duration, clock: Arc<C>) -> Self {
        Self {
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_ms();
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some((value, stored_at)) if now.saturating_sub(*stored_at) < self.ttl_ms => {
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now_ms();
        lock(&self.entries).insert(key, (value, now));
    }

    /// Drops `key` regardless of age.
    pub fn expire(&self, key: &K) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Drops every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, (_, stored_at)| now.saturating_sub(*stored_at) < self.ttl_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

/// A [`SheetSource`] that serves repeated fetches of a tab from a cache.
#[derive(Debug)]
pub struct CachedSheetSource<S, C> {
    inner: S,
    cache: TtlCache<(String, String), RawSheet, C>,
}

impl<S: SheetSource, C: Clock> CachedSheetSource<S, C> {
    pub fn new(inner: S, ttl: Duration, clock: Arc<C>) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, clock),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Forces the next fetch of `tab` to hit the inner source.
    pub fn invalidate(&self, source_id: &str, tab: &str) -> bool {
        self.cache.expire(&(source_id.to_string(), tab.to_string()))
    }
}

impl<S: SheetSource, C: Clock> SheetSource for CachedSheetSource<S, C> {
    async fn fetch(&self, source_id: &str, tab: &str) -> Result<RawSheet> {
        let key = (source_id.to_string(), tab.to_string());
        if let Some(sheet) = self.cache.get(&key) {
            tracing::debug!(source_id, tab, "sheet cache hit");
            return Ok(sheet);
        }
        let sheet = self.inner.fetch(source_id, tab).await?;
        self.cache.set(key, sheet.clone());
        Ok(sheet)
    }
}
