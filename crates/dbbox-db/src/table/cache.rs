//! Per-table row cache keyed by the normalized identifier value.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dbbox_core::SqlValue;

#[derive(Debug, Clone)]
pub(crate) struct CachedEntry {
    pub loaded_at: Instant,
    /// One value per table column, in column order.
    pub values: Vec<SqlValue>,
    /// Changed locally and not yet written back.
    pub dirty: bool,
}

#[derive(Debug)]
pub(crate) struct RowCache {
    ttl: Option<Duration>,
    entries: HashMap<String, CachedEntry>,
}

impl RowCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// The entry for `key` unless it has expired.
    pub fn fresh(&self, key: &str, now: Instant) -> Option<&CachedEntry> {
        self.entries
            .get(key)
            .filter(|entry| is_fresh(self.ttl, entry, now))
    }

    /// Mutable access to the entry for `key` unless it has expired.
    pub fn fresh_mut(&mut self, key: &str, now: Instant) -> Option<&mut CachedEntry> {
        let ttl = self.ttl;
        self.entries
            .get_mut(key)
            .filter(|entry| is_fresh(ttl, entry, now))
    }

    /// Store a row read from the server. A dirty entry for the same key wins.
    pub fn insert_loaded(&mut self, key: String, values: Vec<SqlValue>, now: Instant) {
        match self.entries.get(&key) {
            Some(existing) if existing.dirty => {}
            _ => {
                self.entries.insert(key, CachedEntry {
                    loaded_at: now,
                    values,
                    dirty: false,
                });
            }
        }
    }

    /// The fresh entry for `key`, or `values` stored as a new one.
    pub fn fresh_or_insert(
        &mut self,
        key: String,
        values: Vec<SqlValue>,
        now: Instant,
    ) -> &mut CachedEntry {
        let stale = self
            .entries
            .get(&key)
            .is_some_and(|entry| !is_fresh(self.ttl, entry, now));
        if stale {
            self.entries.remove(&key);
        }
        self.entries.entry(key).or_insert(CachedEntry {
            loaded_at: now,
            values,
            dirty: false,
        })
    }

    pub fn remove(&mut self, key: &str) -> Option<CachedEntry> {
        self.entries.remove(key)
    }

    /// Put back an entry whose write failed, unless a newer one exists.
    pub fn restore(&mut self, key: String, entry: CachedEntry) {
        self.entries.entry(key).or_insert(entry);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop clean entries older than the TTL; returns how many were dropped.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.dirty || now.duration_since(entry.loaded_at) < ttl);
        before - self.entries.len()
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.dirty).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn is_fresh(ttl: Option<Duration>, entry: &CachedEntry, now: Instant) -> bool {
    entry.dirty || ttl.is_none_or(|ttl| now.duration_since(entry.loaded_at) < ttl)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn values(n: i64) -> Vec<SqlValue> {
        vec![SqlValue::Int(n), SqlValue::from("pw")]
    }

    #[test]
    fn entries_expire_after_ttl() {
        let start = Instant::now();
        let mut cache = RowCache::new(Some(TTL));
        cache.insert_loaded("1".into(), values(1), start);

        assert!(cache.fresh("1", start + Duration::from_secs(59)).is_some());
        assert!(cache.fresh("1", start + TTL).is_none());
        assert!(cache.contains("1"));
        assert_eq!(cache.evict_expired(start + TTL), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn dirty_entries_never_expire() {
        let start = Instant::now();
        let mut cache = RowCache::new(Some(TTL));
        cache.fresh_or_insert("1".into(), values(1), start).dirty = true;

        let later = start + TTL * 10;
        assert!(cache.fresh("1", later).is_some());
        assert_eq!(cache.evict_expired(later), 0);
        assert_eq!(cache.dirty_count(), 1);
    }

    #[test]
    fn loaded_row_does_not_clobber_dirty_entry() {
        let now = Instant::now();
        let mut cache = RowCache::new(None);
        let entry = cache.fresh_or_insert("1".into(), values(1), now);
        entry.values[1] = SqlValue::from("changed");
        entry.dirty = true;

        cache.insert_loaded("1".into(), values(1), now);
        assert_eq!(
            cache.fresh("1", now).unwrap().values[1],
            SqlValue::from("changed")
        );
    }

    #[test]
    fn stale_entry_is_replaced() {
        let start = Instant::now();
        let mut cache = RowCache::new(Some(TTL));
        cache.insert_loaded("1".into(), values(1), start);
        let entry = cache.fresh_or_insert("1".into(), values(2), start + TTL);
        assert_eq!(entry.values[0], SqlValue::Int(2));
    }

    #[test]
    fn fresh_mut_skips_expired_clean_entry() {
        let start = Instant::now();
        let mut cache = RowCache::new(Some(TTL));
        cache.insert_loaded("1".into(), values(1), start);
        assert!(cache.fresh_mut("1", start + TTL).is_none());

        cache.fresh_mut("1", start).unwrap().dirty = true;
        assert!(cache.fresh_mut("1", start + TTL).is_some());
    }

    #[test]
    fn restore_keeps_newer_entry() {
        let now = Instant::now();
        let mut cache = RowCache::new(None);
        let old = CachedEntry {
            loaded_at: now,
            values: values(1),
            dirty: true,
        };
        cache.insert_loaded("1".into(), values(9), now);
        cache.restore("1".into(), old);
        assert_eq!(cache.fresh("1", now).unwrap().values[0], SqlValue::Int(9));
    }

    #[test]
    fn no_ttl_means_no_expiry() {
        let start = Instant::now();
        let mut cache = RowCache::new(None);
        cache.insert_loaded("1".into(), values(1), start);
        assert!(cache.fresh("1", start + Duration::from_secs(86_400)).is_some());
        assert_eq!(cache.evict_expired(start + Duration::from_secs(86_400)), 0);
    }
}
