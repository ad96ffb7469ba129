use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::{AccountId, Cents};

/// Read-through cache of account limits.
///
/// Limits are write-once, so entries never go stale and are never invalidated.
/// Growth is capped: once `capacity` accounts are cached, further lookups go
/// to the store every time.
#[derive(Debug)]
pub struct LimitCache {
    entries: RwLock<HashMap<AccountId, Cents>>,
    capacity: usize,
}

impl LimitCache {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn get(&self, id: AccountId) -> Option<Cents> {
        // Values are immutable once inserted, so a poisoned lock still holds valid data.
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    /// Remember a limit. Returns `false` if the cache is full.
    pub fn insert(&self, id: AccountId, limit: Cents) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, limit);
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LimitCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
