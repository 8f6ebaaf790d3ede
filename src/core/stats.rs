use serde::{Deserialize, Serialize};
use crate::core::types::Generation;

/// Size and shape of an opened index, for monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub generation: Generation,

    // Storage metrics
    pub index_bytes: usize,
    pub data_bytes: usize,

    // Record counts
    pub facets: usize,
    pub tags: usize,
    pub items: usize,
}

/// Parsed vocabulary record cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64, size: usize) -> Self {
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        CacheStats { hits, misses, hit_rate, size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_of_unused_cache_is_zero() {
        assert_eq!(CacheStats::new(0, 0, 0).hit_rate, 0.0);
        assert_eq!(CacheStats::new(3, 1, 2).hit_rate, 0.75);
    }

    #[test]
    fn stats_serialize_to_json() {
        let stats = IndexStats {
            generation: Generation::new(),
            index_bytes: 128,
            data_bytes: 64,
            facets: 2,
            tags: 4,
            items: 0,
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: IndexStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
