use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// The embedded TTL store backend: a plain map with lazy expiry.
///
/// Entries record their insertion time and every access checks it against
/// the TTL, so no background eviction task is needed. Expired entries linger
/// in memory until the next insert under the same key, which is fine at file
/// notification rates.
pub struct MemoryStore {
    data: HashMap<String, StoreValue>,
    ttl: Duration,
}

#[derive(Debug)]
struct StoreValue {
    data: String,
    inserted: Instant,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        MemoryStore {
            data: HashMap::new(),
            ttl,
        }
    }

    /// Store `value` under `key` unless a live entry already exists.
    ///
    /// Re-inserting a live key keeps the original value and its original
    /// expiry time. An expired entry is overwritten and the clock restarts.
    pub fn insert_if_absent(&mut self, key: &str, value: &str) {
        if self.contains(key) {
            return;
        }
        self.data.insert(
            key.to_string(),
            StoreValue {
                data: value.to_string(),
                inserted: Instant::now(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self.data.get(key) {
            Some(value) if !self.is_expired(value) => Some(&value.data),
            _ => None,
        }
    }

    fn is_expired(&self, value: &StoreValue) -> bool {
        Instant::now() > value.inserted + self.ttl
    }
}
