use anyhow::Context;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::message::Notification;
use crate::publisher::Publisher;
use crate::server::StoreServer;
use crate::store::{StoreError, TtlStore};
use crate::subscriber::Subscriber;

#[derive(Debug, Error)]
pub enum SelectorError {
    /// Upstream contract violation: every file notification must carry a
    /// uid. Failing loudly here keeps this distinguishable from a discarded
    /// duplicate.
    #[error("message without a uid field: {0}")]
    MissingUid(String),
    /// The store broke mid-run. There is no safe degraded mode: treating
    /// everything as novel floods downstream, treating everything as a
    /// duplicate black-holes the data.
    #[error("backing store failure")]
    Store(#[from] StoreError),
}

/// What the selector decided to do with a message.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Forwarded,
    Discarded,
}

/// The deduplication engine. Two-state per key: a uid is either absent
/// (initially, or after its TTL ran out) or present; only the first message
/// of a presence window is forwarded.
pub struct Selector {
    store: TtlStore,
}

impl Selector {
    pub fn new(store: TtlStore) -> Self {
        Selector { store }
    }

    /// Decide the fate of one file notification.
    ///
    /// Sequential check-then-insert is race-free within one selector; when
    /// several selectors share a store, the store's atomic insert-if-absent
    /// keeps forwarding at-most-once per key per window.
    pub async fn handle(&mut self, message: &Notification) -> Result<Decision, SelectorError> {
        let key = message
            .uid()
            .ok_or_else(|| SelectorError::MissingUid(message.raw().to_string()))?;
        if self.store.contains(key).await? {
            debug!("discarded {}", message.raw());
            Ok(Decision::Discarded)
        } else {
            self.store.insert_if_absent(key, message.raw()).await?;
            info!("new content {}", message.raw());
            Ok(Decision::Forwarded)
        }
    }
}

/// Run the selector described by `config` until the subscription ends, an
/// error occurs, or a shutdown is requested.
///
/// Starts a managed store server first when the configuration asks for one,
/// and tears it down again on every exit path.
pub async fn run_selector(config: &Config, shutdown: mpsc::Receiver<()>) -> anyhow::Result<()> {
    let server = match &config.selector_config.directory {
        Some(directory) => Some(
            StoreServer::start(config.selector_config.server_port(), directory)
                .await
                .context("backing store server failed to start")?,
        ),
        None => None,
    };

    let result = run_loop(config, shutdown).await;

    let shutdown_result = match server {
        Some(server) => server.shutdown().await,
        None => Ok(()),
    };
    result.and(shutdown_result)
}

async fn run_loop(config: &Config, mut shutdown: mpsc::Receiver<()>) -> anyhow::Result<()> {
    let store = TtlStore::from_config(&config.selector_config)
        .await
        .context("could not reach the backing store")?;
    let mut publisher = Publisher::bind(&config.publisher_config).await?;
    let mut subscriber = Subscriber::connect(&config.subscriber_config).await?;
    let mut selector = Selector::new(store);

    loop {
        // Each message is fully processed (store consulted, forwarded or
        // dropped) before the next one is pulled; shutdown only lands
        // between messages, so no half-processed state is left behind.
        tokio::select! {
            _ = shutdown.recv() => {
                info!("shutdown requested, stopping selector");
                return Ok(());
            }
            next = subscriber.next_file_message() => {
                let message = next.context("subscription failed")?;
                match selector.handle(&message).await? {
                    Decision::Forwarded => {
                        publisher.send(message.raw()).await?;
                    }
                    Decision::Discarded => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Decision, Selector, SelectorError};
    use crate::memory::MemoryStore;
    use crate::message::Notification;
    use crate::store::TtlStore;

    fn file_message(uid: &str, uri: &str) -> Notification {
        let raw = format!(
            r#"/segment/viirs/l1b file {{"sensor": "viirs", "uid": "{uid}", "uri": "{uri}"}}"#
        );
        Notification::parse(&raw).unwrap()
    }

    fn selector(ttl: Duration) -> Selector {
        Selector::new(TtlStore::Memory(MemoryStore::new(ttl)))
    }

    #[tokio::test]
    async fn first_message_per_uid_is_forwarded() {
        let mut selector = selector(Duration::from_secs(300));
        let message = file_message("granule_1.h5", "file:///sdr/granule_1.h5");
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Forwarded);
    }

    #[tokio::test]
    async fn duplicates_within_ttl_are_discarded() {
        let mut selector = selector(Duration::from_secs(300));
        let first = file_message("granule_1.h5", "file:///sdr/granule_1.h5");
        // Same file on another reception server, under a different uri
        let replica = file_message("granule_1.h5", "ssh://other-site/sdr/granule_1.h5");
        assert_eq!(selector.handle(&first).await.unwrap(), Decision::Forwarded);
        assert_eq!(selector.handle(&replica).await.unwrap(), Decision::Discarded);
        assert_eq!(selector.handle(&first).await.unwrap(), Decision::Discarded);
    }

    #[tokio::test]
    async fn distinct_uids_do_not_suppress_each_other() {
        let mut selector = selector(Duration::from_secs(300));
        let a = file_message("granule_a.h5", "file:///sdr/a.h5");
        let b = file_message("granule_b.h5", "file:///sdr/b.h5");
        let a_again = file_message("granule_a.h5", "file:///sdr/a.h5");
        assert_eq!(selector.handle(&a).await.unwrap(), Decision::Forwarded);
        assert_eq!(selector.handle(&b).await.unwrap(), Decision::Forwarded);
        assert_eq!(selector.handle(&a_again).await.unwrap(), Decision::Discarded);
    }

    #[tokio::test]
    async fn uid_reappearing_after_expiry_is_forwarded_again() {
        let mut selector = selector(Duration::from_millis(100));
        let message = file_message("granule_1.h5", "file:///sdr/granule_1.h5");
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Forwarded);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Discarded);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Forwarded);
    }

    #[tokio::test]
    async fn duplicate_does_not_extend_the_window() {
        let mut selector = selector(Duration::from_millis(100));
        let message = file_message("granule_1.h5", "file:///sdr/granule_1.h5");
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Forwarded);
        tokio::time::sleep(Duration::from_millis(60)).await;
        // A discarded duplicate must not restart the ttl clock
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Discarded);
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(selector.handle(&message).await.unwrap(), Decision::Forwarded);
    }

    #[tokio::test]
    async fn message_without_uid_is_an_error() {
        let mut selector = selector(Duration::from_secs(300));
        let message =
            Notification::parse(r#"/segment/viirs/l1b file {"uri": "file:///sdr/a.h5"}"#).unwrap();
        let error = selector.handle(&message).await.unwrap_err();
        assert!(matches!(error, SelectorError::MissingUid(_)));
    }
}
