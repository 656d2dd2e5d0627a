use crate::{CacheController, CacheKey, DataObject};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// First-in-first-out eviction: once `capacity` entries are held, the
/// oldest-inserted key is dropped to make room.
pub struct FifoController {
    inner: Mutex<FifoState>,
    capacity: usize,
}

struct FifoState {
    entries: HashMap<CacheKey, DataObject>,
    order: VecDeque<CacheKey>,
}

impl FifoController {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FifoState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }
}

impl CacheController for FifoController {
    fn get(&self, key: &CacheKey) -> Option<DataObject> {
        self.inner.lock().entries.get(key).cloned()
    }

    fn put(&self, key: CacheKey, value: DataObject) {
        let mut state = self.inner.lock();
        if state.entries.insert(key.clone(), value).is_none() {
            state.order.push_back(key);
        }
        while state.entries.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    fn remove(&self, key: &CacheKey) -> Option<DataObject> {
        let mut state = self.inner.lock();
        let removed = state.entries.remove(key);
        if removed.is_some() {
            state.order.retain(|k| k != key);
        }
        removed
    }

    fn flush(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.order.clear();
    }
}
