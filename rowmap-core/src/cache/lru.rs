use crate::{CacheController, CacheKey, DataObject};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Least-recently-used eviction: every successful `get` promotes its key to
/// most-recently-used; inserting past `capacity` evicts the coldest entry.
pub struct LruController {
    inner: Mutex<LruState>,
    capacity: usize,
}

struct LruState {
    entries: HashMap<CacheKey, (DataObject, u64)>,
    clock: u64,
}

impl LruController {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruState {
                entries: HashMap::new(),
                clock: 0,
            }),
            capacity: capacity.max(1),
        }
    }
}

impl LruState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_coldest(&mut self) {
        let coldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, stamp))| *stamp)
            .map(|(key, _)| key.clone());
        if let Some(key) = coldest {
            self.entries.remove(&key);
        }
    }
}

impl CacheController for LruController {
    fn get(&self, key: &CacheKey) -> Option<DataObject> {
        let mut state = self.inner.lock();
        let stamp = state.tick();
        let (value, last_used) = state.entries.get_mut(key)?;
        *last_used = stamp;
        Some(value.clone())
    }

    fn put(&self, key: CacheKey, value: DataObject) {
        let mut state = self.inner.lock();
        let stamp = state.tick();
        state.entries.insert(key, (value, stamp));
        while state.entries.len() > self.capacity {
            state.evict_coldest();
        }
    }

    fn remove(&self, key: &CacheKey) -> Option<DataObject> {
        self.inner.lock().entries.remove(key).map(|(value, _)| value)
    }

    fn flush(&self) {
        self.inner.lock().entries.clear();
    }
}
