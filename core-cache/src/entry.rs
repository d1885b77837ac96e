//! Cache entries and the eviction score

use std::cmp::Ordering;

/// A stored value plus its bookkeeping.
///
/// Timestamps are clock milliseconds.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: i64,
    pub last_accessed_at: i64,
    pub ttl_millis: i64,
    pub access_count: u64,
    pub size_bytes: u64,
    /// Insertion order, used to break score ties.
    pub(crate) sequence: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, now: i64, ttl_millis: i64, size_bytes: u64, sequence: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            ttl_millis,
            access_count: 0,
            size_bytes,
            sequence,
        }
    }

    /// Expired once strictly more than `ttl` has elapsed since creation.
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.created_at > self.ttl_millis
    }

    pub(crate) fn touch(&mut self, now: i64) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    /// `access_count / (now - last_accessed_at + 1)`; lowest is evicted first.
    pub fn eviction_score(&self, now: i64) -> f64 {
        let idle = (now - self.last_accessed_at).max(0) as f64;
        self.access_count as f64 / (idle + 1.0)
    }

    /// Orders entries from first-to-evict to last.
    pub(crate) fn eviction_order(&self, other: &Self, now: i64) -> Ordering {
        self.eviction_score(now)
            .partial_cmp(&other.eviction_score(now))
            .unwrap_or(Ordering::Equal)
            .then(self.last_accessed_at.cmp(&other.last_accessed_at))
            .then(self.sequence.cmp(&other.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_strict() {
        let entry = CacheEntry::new("v", 1_000, 100, 1, 0);
        assert!(!entry.is_expired(1_100));
        assert!(entry.is_expired(1_101));
    }

    #[test]
    fn test_score_decays_with_idle_time() {
        let mut entry = CacheEntry::new("v", 0, 1_000, 1, 0);
        entry.touch(0);
        entry.touch(0);

        assert_eq!(entry.eviction_score(0), 2.0);
        assert_eq!(entry.eviction_score(1), 1.0);
        assert!(entry.eviction_score(999) < 0.01);
    }

    #[test]
    fn test_tie_breaks_by_recency_then_insertion() {
        let older = CacheEntry::new("a", 10, 1_000, 1, 0);
        let newer = CacheEntry::new("b", 10, 1_000, 1, 1);
        assert_eq!(older.eviction_order(&newer, 20), Ordering::Less);

        let stale = CacheEntry::new("c", 5, 1_000, 1, 7);
        assert_eq!(stale.eviction_order(&older, 20), Ordering::Less);
    }
}
