use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Concurrent table from a Vulkan handle to the layer's tracked state for it.
///
/// Lookups hand out shared `Arc`s so callers never hold a shard guard while
/// they take the object's own lock. An unknown handle is `None`, never an
/// error: checks that depend on it are skipped.
pub struct ObjectMap<K, V> {
    objects: DashMap<K, Arc<V>>,
}

impl<K, V> ObjectMap<K, V>
where
    K: Eq + Hash + Copy,
{
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    /// Track a new object, replacing any stale entry with the same handle.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.objects.insert(key, Arc::clone(&value));
        value
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.objects.get(key).map(|v| Arc::clone(v.value()))
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.objects.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.objects.contains_key(key)
    }

    /// Copy out every entry. Used by walks that lock individual objects.
    pub fn snapshot(&self) -> Vec<(K, Arc<V>)> {
        self.objects
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect()
    }

    /// Return number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<K, V> Default for ObjectMap<K, V>
where
    K: Eq + Hash + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
