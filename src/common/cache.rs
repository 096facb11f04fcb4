//! Bounded in-memory map shared between engine tasks.
//!
//! Backed by moka's concurrent cache; the engine uses it to track the
//! activation currently in flight for each chain.

use moka::sync::Cache;

/// Thread-safe keyed cache with a capacity bound.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`] holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.get(key)
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.entries.invalidate(key);
    }

    /// Return an iterator over the entries of the cache.
    pub fn iter(&self) -> moka::sync::Iter<'_, K, V> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::MemCache;

    #[test]
    fn test_set_get_remove() {
        let cache: MemCache<String, u32> = MemCache::new(8);
        cache.set("chain-1".to_string(), 1);

        assert_eq!(cache.get(&"chain-1".to_string()), Some(1));

        cache.remove(&"chain-1".to_string());
        assert_eq!(cache.get(&"chain-1".to_string()), None);
    }
}
