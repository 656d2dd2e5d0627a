mod fifo;
mod key;
mod lru;
mod memory;

pub use fifo::*;
pub use key::*;
pub use lru::*;
pub use memory::*;

use crate::DataObject;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Eviction policy over a shared keyed store. Implementations must support
/// concurrent put/get/remove/flush from multiple sessions without external
/// locking.
pub trait CacheController: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<DataObject>;
    fn put(&self, key: CacheKey, value: DataObject);
    fn remove(&self, key: &CacheKey) -> Option<DataObject>;
    fn flush(&self);
}

/// Statement-level cache: a named controller plus flush bookkeeping.
///
/// An expired flush interval empties the controller before the next lookup;
/// update statements configured to flush this model call [`CacheModel::flush`]
/// directly.
pub struct CacheModel {
    pub id: String,
    controller: Box<dyn CacheController>,
    flush_interval: Option<Duration>,
    last_flush: Mutex<Instant>,
}

impl CacheModel {
    pub fn new(id: impl Into<String>, controller: Box<dyn CacheController>) -> Self {
        Self {
            id: id.into(),
            controller,
            flush_interval: None,
            last_flush: Mutex::new(Instant::now()),
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    fn flush_if_expired(&self) {
        let Some(interval) = self.flush_interval else {
            return;
        };
        let mut last_flush = self.last_flush.lock();
        if last_flush.elapsed() >= interval {
            log::debug!("Flush interval expired for cache model `{}`", self.id);
            self.controller.flush();
            *last_flush = Instant::now();
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<DataObject> {
        self.flush_if_expired();
        let hit = self.controller.get(key);
        log::debug!(
            "Cache model `{}`: {}",
            self.id,
            if hit.is_some() { "hit" } else { "miss" }
        );
        hit
    }

    pub fn put(&self, key: CacheKey, value: DataObject) {
        self.flush_if_expired();
        self.controller.put(key, value);
    }

    pub fn flush(&self) {
        self.controller.flush();
        *self.last_flush.lock() = Instant::now();
    }
}
