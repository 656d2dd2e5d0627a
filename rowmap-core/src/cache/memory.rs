use crate::{CacheController, CacheKey, DataObject, LruController};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Reference strength requested for cached entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceLevel {
    Strong,
    Soft,
    #[default]
    Weak,
}

/// Default bound of the tier approximating SOFT references.
pub const SOFT_TIER_SIZE: usize = 4096;
/// Default bound of the tier approximating WEAK references.
pub const WEAK_TIER_SIZE: usize = 256;

/// Reference-strength cache.
///
/// STRONG holds entries without bound. Rust has no
/// soft/weak references to arbitrary owned data, so SOFT and WEAK are
/// approximated by a bounded most-recently-used tier ([`SOFT_TIER_SIZE`] and
/// [`WEAK_TIER_SIZE`] entries respectively) instead of delegating eviction to
/// host-runtime memory pressure. That is a semantic gap: entries can be
/// evicted earlier (tier full) or later (no memory pressure coupling) than a
/// reference-based cache would.
pub enum MemoryController {
    Strong(Mutex<HashMap<CacheKey, DataObject>>),
    Bounded(LruController),
}

impl MemoryController {
    pub fn new(level: ReferenceLevel) -> Self {
        match level {
            ReferenceLevel::Strong => MemoryController::Strong(Mutex::new(HashMap::new())),
            ReferenceLevel::Soft => MemoryController::Bounded(LruController::new(SOFT_TIER_SIZE)),
            ReferenceLevel::Weak => MemoryController::Bounded(LruController::new(WEAK_TIER_SIZE)),
        }
    }
}

impl CacheController for MemoryController {
    fn get(&self, key: &CacheKey) -> Option<DataObject> {
        match self {
            MemoryController::Strong(entries) => entries.lock().get(key).cloned(),
            MemoryController::Bounded(tier) => tier.get(key),
        }
    }

    fn put(&self, key: CacheKey, value: DataObject) {
        match self {
            MemoryController::Strong(entries) => {
                entries.lock().insert(key, value);
            }
            MemoryController::Bounded(tier) => tier.put(key, value),
        }
    }

    fn remove(&self, key: &CacheKey) -> Option<DataObject> {
        match self {
            MemoryController::Strong(entries) => entries.lock().remove(key),
            MemoryController::Bounded(tier) => tier.remove(key),
        }
    }

    fn flush(&self) {
        match self {
            MemoryController::Strong(entries) => entries.lock().clear(),
            MemoryController::Bounded(tier) => tier.flush(),
        }
    }
}
