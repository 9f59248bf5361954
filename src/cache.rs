//! In-memory cache with expiration, capacity pressure and validation.
//!
//! Compiled templates and loaded language tables are cheap to share but
//! expensive to rebuild; [`Cache`] keeps them keyed in memory. Entries can be
//! invalidated three ways: a per-entry TTL, a cache-wide expiration, and an
//! optional validator callback checked on every read (useful when the cached
//! value originates from a file or a database). Invalid entries are dropped
//! lazily on access, no background task runs.

use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Checks whether the entry stored under a key, created at the given time,
/// is still valid against its source.
pub type Validator = Box<dyn Fn(&str, SystemTime) -> bool + Send + Sync>;

struct Entry<V> {
    ctime: SystemTime,
    ttl: Option<Duration>,
    data: V,
}

struct Inner<V> {
    items: FxHashMap<String, Entry<V>>,
    // keys ordered by last access, oldest first; drives capacity cleaning
    pile: Vec<String>,
}

impl<V> Inner<V> {
    fn remove_from_pile(&mut self, key: &str) {
        if let Some(pos) = self.pile.iter().position(|k| k == key) {
            self.pile.remove(pos);
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.items.remove(key).is_some() {
            self.remove_from_pile(key);
            return true;
        }
        false
    }

    /// Drop expired entries, then the `perc`% least recently used ones.
    /// Returns how many were removed.
    fn clean(&mut self, perc: usize, expire: Option<Duration>) -> usize {
        let mut removed = 0;
        if let Some(expire) = expire {
            let now = SystemTime::now();
            let dead: Vec<String> = self
                .items
                .iter()
                .filter(|(_, e)| e.ctime + expire < now)
                .map(|(k, _)| k.clone())
                .collect();
            for key in dead {
                log::debug!("cache entry expired: {key}");
                self.remove(&key);
                removed += 1;
            }
        }

        let count = self.items.len() * perc.min(100) / 100;
        let oldest: Vec<String> = self.pile.iter().take(count).cloned().collect();
        for key in oldest {
            self.remove(&key);
            removed += 1;
        }
        removed
    }
}

/// A keyed in-memory cache of shareable values.
///
/// `max_items` of 0 means unlimited; once reached, inserting cleans the 10%
/// least recently used entries. `expire` of `None` means entries never age
/// out globally; per-entry TTLs can be set regardless with
/// [`Cache::set_ttl`]. All methods take `&self`, the cache is safe to share
/// across threads.
pub struct Cache<V> {
    id: String,
    max_items: usize,
    expire: Option<Duration>,
    validator: Option<Validator>,
    inner: RwLock<Inner<V>>,
}

impl<V: Clone> Cache<V> {
    /// Create a cache named `id` (informative, used in log lines).
    pub fn new(id: impl Into<String>, max_items: usize, expire: Option<Duration>) -> Self {
        let id = id.into();
        log::debug!("creating cache {id}: max_items={max_items}, expire={expire:?}");
        Self {
            id,
            max_items,
            expire,
            validator: None,
            inner: RwLock::new(Inner {
                items: FxHashMap::default(),
                pile: Vec::new(),
            }),
        }
    }

    /// Install a validator called on every read. An entry the validator
    /// rejects is removed and reads as absent. Validators run under the
    /// cache lock, a slow one stalls every reader.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The cache id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert or replace the entry under `key`, resetting its age and TTL.
    pub fn set(&self, key: impl Into<String>, data: V) {
        let key = key.into();
        let mut inner = self.inner.write();
        inner.remove_from_pile(&key);
        inner.items.insert(
            key.clone(),
            Entry {
                ctime: SystemTime::now(),
                ttl: None,
                data,
            },
        );
        inner.pile.push(key);
        if self.max_items > 0 && inner.items.len() >= self.max_items {
            log::debug!("cache {} is full, cleaning 10%", self.id);
            inner.clean(10, self.expire);
        }
    }

    /// Set a TTL on an existing entry. Does nothing for an absent key.
    pub fn set_ttl(&self, key: &str, ttl: Duration) {
        if let Some(entry) = self.inner.write().items.get_mut(key) {
            entry.ttl = Some(ttl);
        }
    }

    /// Read the entry under `key`.
    ///
    /// An entry past its TTL or the cache-wide expiration, or rejected by
    /// the validator, is removed and reads as absent. A successful read
    /// marks the entry most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.write();
        let entry = inner.items.get(key)?;
        let now = SystemTime::now();

        let dead_by_ttl = entry.ttl.is_some_and(|ttl| entry.ctime + ttl < now);
        let dead_by_age = self.expire.is_some_and(|exp| entry.ctime + exp < now);
        let rejected = self
            .validator
            .as_ref()
            .is_some_and(|v| !v(key, entry.ctime));
        if dead_by_ttl || dead_by_age || rejected {
            log::debug!("cache {} invalidates entry: {key}", self.id);
            inner.remove(key);
            return None;
        }

        let data = inner.items[key].data.clone();
        inner.remove_from_pile(key);
        inner.pile.push(key.to_owned());
        Some(data)
    }

    /// Remove the entry under `key`, if present.
    pub fn del(&self, key: &str) {
        self.inner.write().remove(key);
    }

    /// Number of entries, including not-yet-collected expired ones.
    pub fn count(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Drop expired entries plus the `perc`% least recently used ones.
    /// Returns how many entries were removed. Does not run the validator.
    pub fn clean(&self, perc: usize) -> usize {
        self.inner.write().clean(perc, self.expire)
    }

    /// Drop expired entries, then run the validator over every remaining
    /// entry and drop the rejected ones. Returns how many were removed.
    /// As slow as the validator is, times the cache size.
    pub fn verify(&self) -> usize {
        let mut inner = self.inner.write();
        let mut removed = inner.clean(0, self.expire);
        if let Some(validator) = &self.validator {
            let rejected: Vec<String> = inner
                .items
                .iter()
                .filter(|(k, e)| !validator(k, e.ctime))
                .map(|(k, _)| k.clone())
                .collect();
            for key in rejected {
                log::debug!("cache {} validator rejects entry: {key}", self.id);
                inner.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Remove everything.
    pub fn flush(&self) {
        let mut inner = self.inner.write();
        inner.items.clear();
        inner.pile.clear();
    }
}
