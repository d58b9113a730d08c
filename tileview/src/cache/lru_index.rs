//! Least-recently-accessed bookkeeping shared by every cache tier.
//!
//! The index owns the per-entry metadata (size, last access) and the quota.
//! Tiers keep their payloads elsewhere (the memory tier stores them in the
//! index value, the disk tier on the filesystem) and act on the evictions the
//! index reports.
//!
//! Access order is a monotonically increasing tick kept in a `BTreeMap`, so
//! the least-recently-accessed entry is always the first key.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::time::Instant;

/// Byte, entry and idle-time limits of one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub max_bytes: Option<u64>,
    pub max_entries: Option<u64>,
    pub retention: Option<Duration>,
}

impl Quota {
    /// Non-positive byte and entry limits mean unlimited.
    pub fn new(max_bytes: i64, max_entries: i64, retention: Option<Duration>) -> Self {
        Self {
            max_bytes: u64::try_from(max_bytes).ok().filter(|&b| b > 0),
            max_entries: u64::try_from(max_entries).ok().filter(|&n| n > 0),
            retention,
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// An entry removed from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evicted<V> {
    pub key: String,
    pub value: V,
    pub size: u64,
}

/// The entry alone is larger than the byte quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oversized {
    pub size: u64,
    pub max: u64,
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    size: u64,
    tick: u64,
    accessed: Instant,
    /// Idle time already accumulated before `accessed`, for entries restored
    /// from persistent storage.
    prior_idle: Duration,
}

impl<V> Slot<V> {
    fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.accessed) + self.prior_idle
    }
}

/// Strict LRU index with quota enforcement.
#[derive(Debug)]
pub struct LruIndex<V> {
    entries: HashMap<String, Slot<V>>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
    total_bytes: u64,
    quota: Quota,
}

impl<V> LruIndex<V> {
    pub fn new(quota: Quota) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            total_bytes: 0,
            quota,
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value for `key` and marks it as most recently accessed.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        if !self.touch(key) {
            return None;
        }
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Marks `key` as most recently accessed. Returns `false` if absent.
    pub fn touch(&mut self, key: &str) -> bool {
        let tick = self.bump();
        let Some(slot) = self.entries.get_mut(key) else {
            return false;
        };
        self.order.remove(&slot.tick);
        slot.tick = tick;
        slot.accessed = Instant::now();
        slot.prior_idle = Duration::ZERO;
        self.order.insert(tick, key.to_string());
        true
    }

    /// Inserts or replaces `key`, evicting least-recently-accessed entries
    /// until the new entry fits.
    ///
    /// A replaced entry is not reported as evicted.
    pub fn insert(&mut self, key: &str, value: V, size: u64) -> Result<Vec<Evicted<V>>, Oversized> {
        self.insert_aged(key, value, size, Duration::ZERO)
    }

    /// Like [`LruIndex::insert`] for an entry that has already been idle for
    /// `idle`. Used when rebuilding an index from persistent storage; entries
    /// must be inserted oldest first.
    pub fn insert_aged(
        &mut self,
        key: &str,
        value: V,
        size: u64,
        idle: Duration,
    ) -> Result<Vec<Evicted<V>>, Oversized> {
        if let Some(max) = self.quota.max_bytes {
            if size > max {
                return Err(Oversized { size, max });
            }
        }

        self.remove(key);

        let mut evicted = Vec::new();
        while self.over_quota_with(size) {
            match self.pop_oldest() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }

        let tick = self.bump();
        self.order.insert(tick, key.to_string());
        self.entries.insert(
            key.to_string(),
            Slot {
                value,
                size,
                tick,
                accessed: Instant::now(),
                prior_idle: idle,
            },
        );
        self.total_bytes += size;
        Ok(evicted)
    }

    pub fn remove(&mut self, key: &str) -> Option<Evicted<V>> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        self.total_bytes -= slot.size;
        Some(Evicted {
            key: key.to_string(),
            value: slot.value,
            size: slot.size,
        })
    }

    /// Removes every entry idle for longer than the retention period.
    pub fn expire(&mut self, now: Instant) -> Vec<Evicted<V>> {
        let Some(retention) = self.quota.retention else {
            return Vec::new();
        };
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.idle(now) > retention)
            .map(|(key, _)| key.clone())
            .collect();
        expired.iter().filter_map(|key| self.remove(key)).collect()
    }

    pub fn clear(&mut self) -> Vec<Evicted<V>> {
        self.order.clear();
        self.total_bytes = 0;
        self.entries
            .drain()
            .map(|(key, slot)| Evicted {
                key,
                value: slot.value,
                size: slot.size,
            })
            .collect()
    }

    /// Keys from least to most recently accessed.
    pub fn keys_by_access(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    fn over_quota_with(&self, incoming: u64) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let bytes_over = self
            .quota
            .max_bytes
            .is_some_and(|max| self.total_bytes + incoming > max);
        let entries_over = self
            .quota
            .max_entries
            .is_some_and(|max| self.entries.len() as u64 + 1 > max);
        bytes_over || entries_over
    }

    fn pop_oldest(&mut self) -> Option<Evicted<V>> {
        let key = self.order.values().next()?.clone();
        self.remove(&key)
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}
