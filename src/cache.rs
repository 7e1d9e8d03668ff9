use ahash::AHashMap;
use parking_lot::RwLock;

/// (label, property, encoded value)
type LookupKey = (String, String, String);

/// Memoized node-id lookups for relation endpoints.
#[derive(Default)]
pub struct LookupCache {
    inner: RwLock<AHashMap<LookupKey, Vec<i64>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
        }
    }

    pub fn get(&self, label: &str, property: &str, value: &str) -> Option<Vec<i64>> {
        self.inner
            .read()
            .get(&(label.to_string(), property.to_string(), value.to_string()))
            .cloned()
    }

    pub fn insert(&self, label: &str, property: &str, value: &str, ids: Vec<i64>) {
        self.inner
            .write()
            .insert((label.to_string(), property.to_string(), value.to_string()), ids);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
