use crate::Value;
use std::hash::{Hash, Hasher};

const SEED: i64 = 17;
const MULTIPLIER: i64 = 37;

/// Structural fingerprint of a statement execution: element count, a
/// position-weighted arithmetic checksum, a running multiplicative hash and
/// the retained ordered values themselves for exact tie-break equality.
///
/// Built by repeated [`CacheKey::update`] calls and treated as immutable once
/// every contributing value has been folded in.
#[derive(Debug, Clone)]
pub struct CacheKey {
    count: usize,
    checksum: i64,
    hashcode: i64,
    values: Vec<Value>,
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            count: 0,
            checksum: 0,
            hashcode: SEED,
            values: Vec::new(),
        }
    }

    pub fn update(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let hash = value.hash_code();
        self.count += 1;
        self.checksum = self
            .checksum
            .wrapping_add(hash.wrapping_mul(self.count as i64));
        self.hashcode = self.hashcode.wrapping_mul(MULTIPLIER).wrapping_add(hash);
        self.values.push(value);
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(left, right)| left == right)
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Only the running multiplicative hash participates.
        self.hashcode.hash(state);
    }
}
