use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::RwLock;

use storeflow_core::StoreId;

/// Store-isolated key/value index abstraction for disposable read models.
///
/// Read models are rebuildable caches of the event log; losing one is an
/// inconvenience, never data loss.
pub trait StoreIndex<K, V>: Send + Sync {
    fn get(&self, store_id: StoreId, key: &K) -> Option<V>;
    fn upsert(&self, store_id: StoreId, key: K, value: V);
    fn list(&self, store_id: StoreId) -> Vec<V>;
    /// Clear all read-model records for a store (rebuild support).
    fn clear_store(&self, store_id: StoreId);
}

impl<K, V, S> StoreIndex<K, V> for Arc<S>
where
    S: StoreIndex<K, V> + ?Sized,
{
    fn get(&self, store_id: StoreId, key: &K) -> Option<V> {
        (**self).get(store_id, key)
    }

    fn upsert(&self, store_id: StoreId, key: K, value: V) {
        (**self).upsert(store_id, key, value)
    }

    fn list(&self, store_id: StoreId) -> Vec<V> {
        (**self).list(store_id)
    }

    fn clear_store(&self, store_id: StoreId) {
        (**self).clear_store(store_id)
    }
}

/// In-memory store-isolated index for tests/dev.
#[derive(Debug)]
pub struct InMemoryStoreIndex<K, V> {
    inner: RwLock<HashMap<(StoreId, K), V>>,
}

impl<K, V> InMemoryStoreIndex<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryStoreIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> StoreIndex<K, V> for InMemoryStoreIndex<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, store_id: StoreId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(store_id, key.clone())).cloned()
    }

    fn upsert(&self, store_id: StoreId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((store_id, key), value);
        }
    }

    fn list(&self, store_id: StoreId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((s, _k), v)| if *s == store_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_store(&self, store_id: StoreId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(s, _k), _v| *s != store_id);
        }
    }
}
