//! Deduplicating message selector.
//!
//! Subscribes to file notifications from multiple redundant sources (for
//! example two reception servers announcing the same incoming satellite
//! data), forwards exactly one notification per unique file within a
//! configurable time window, and republishes the survivors verbatim.
//! Uniqueness is decided on the `uid` payload field, so replicas of one file
//! at different locations count as duplicates.

pub mod config;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod redis;
pub mod resp;
pub mod selector;
pub mod server;
pub mod store;
pub mod subscriber;

pub use config::{Config, PublisherConfig, SelectorConfig, SubscriberConfig};
pub use message::Notification;
pub use selector::{run_selector, Decision, Selector, SelectorError};
pub use store::{StoreError, TtlStore};
