use thiserror::Error;

use crate::config::SelectorConfig;
use crate::memory::MemoryStore;
use crate::redis::RedisStore;

/// Failures talking to the backing store.
///
/// A key that is simply absent (or expired) is not an error: lookups return
/// `Option`. These variants all mean the store itself is broken, which is
/// fatal to the selector since neither "everything is novel" nor "everything
/// is a duplicate" is a safe fallback.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("store protocol violation: {0}")]
    Protocol(String),
    #[error("store at {addr} unavailable: {reason}")]
    Unavailable { addr: String, reason: String },
}

/// A key-value store whose entries expire after a fixed time-to-live.
///
/// First write wins: inserting a key that already has a live entry neither
/// replaces the value nor refreshes the expiry. Once the TTL has elapsed the
/// key behaves as if it had never been inserted.
pub enum TtlStore {
    /// In-process map, state local to this selector instance.
    Memory(MemoryStore),
    /// Shared external server, so several selector instances can coordinate.
    Redis(RedisStore),
}

impl TtlStore {
    /// Build the store described by the selector configuration: a remote
    /// store when an address is configured, the embedded one otherwise.
    pub async fn from_config(config: &SelectorConfig) -> Result<Self, StoreError> {
        if config.host.is_some() || config.port.is_some() || config.directory.is_some() {
            let host = config.host.as_deref().unwrap_or("localhost");
            let store = RedisStore::connect(host, config.server_port(), config.ttl_duration()).await?;
            Ok(TtlStore::Redis(store))
        } else {
            Ok(TtlStore::Memory(MemoryStore::new(config.ttl_duration())))
        }
    }

    /// Store `value` under `key` unless a live entry already exists.
    pub async fn insert_if_absent(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            TtlStore::Memory(store) => {
                store.insert_if_absent(key, value);
                Ok(())
            }
            TtlStore::Redis(store) => store.insert_if_absent(key, value).await,
        }
    }

    /// Whether `key` has a live, unexpired entry.
    pub async fn contains(&mut self, key: &str) -> Result<bool, StoreError> {
        match self {
            TtlStore::Memory(store) => Ok(store.contains(key)),
            TtlStore::Redis(store) => store.contains(key).await,
        }
    }

    /// The live value stored under `key`, or `None` if absent or expired.
    pub async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            TtlStore::Memory(store) => Ok(store.get(key).map(str::to_string)),
            TtlStore::Redis(store) => store.get(key).await,
        }
    }
}
