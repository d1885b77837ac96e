//! Cache statistics

use serde::{Deserialize, Serialize};

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub total_size_bytes: u64,
    /// `hits / (hits + misses)`, `0.0` before the first lookup
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Usage as a percentage of `max_size_bytes`.
    pub fn usage_percentage(&self, max_size_bytes: u64) -> f64 {
        if max_size_bytes == 0 {
            return 0.0;
        }

        (self.total_size_bytes as f64 / max_size_bytes as f64) * 100.0
    }
}

/// Running counters kept behind the cache lock.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl Counters {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let counters = Counters::default();
        assert_eq!(counters.hit_rate(), 0.0);

        let counters = Counters {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(counters.hit_rate(), 0.75);
    }

    #[test]
    fn test_usage_percentage() {
        let stats = CacheStats {
            total_size_bytes: 256,
            ..Default::default()
        };
        assert_eq!(stats.usage_percentage(1024), 25.0);
        assert_eq!(stats.usage_percentage(0), 0.0);
    }
}
