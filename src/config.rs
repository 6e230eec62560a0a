use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_TTL_SECONDS: f64 = 300.0;
const DEFAULT_STORE_PORT: u16 = 6379;

/// Top-level configuration, loaded from a yaml file with one section per
/// collaborator.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selector_config: SelectorConfig,
    pub subscriber_config: SubscriberConfig,
    pub publisher_config: PublisherConfig,
}

/// Settings for the deduplication window and its backing store.
///
/// With no host, port or directory the selector keeps its state in an
/// embedded in-process store. A `host`/`port` points at an already running
/// shared store server. A `directory` additionally makes the selector spawn
/// and manage that server itself, persisting into the given directory.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    /// Time-to-live of seen keys, in (possibly fractional) seconds.
    #[serde(default = "default_ttl")]
    pub ttl: f64,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberConfig {
    /// Addresses of the publishers to subscribe to.
    pub addresses: Vec<String>,
    /// Topic prefixes to filter on. Empty means everything.
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublisherConfig {
    /// Address to bind the outbound publisher to.
    pub address: String,
    pub name: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

impl SelectorConfig {
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs_f64(self.ttl)
    }

    pub fn server_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_STORE_PORT)
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            ttl: default_ttl(),
            host: None,
            port: None,
            directory: None,
        }
    }
}

fn default_ttl() -> f64 {
    DEFAULT_TTL_SECONDS
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Config;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
selector_config:
  ttl: 30
  host: localhost
  port: 6388
  directory: /tmp/selector-store
subscriber_config:
  addresses:
    - tcp://reception_1:9999
    - tcp://reception_2:9999
  topics:
    - /1b/hrit-segment/0deg
publisher_config:
  name: hrit_selector
  address: tcp://0.0.0.0:40000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.selector_config.ttl_duration(), Duration::from_secs(30));
        assert_eq!(config.selector_config.server_port(), 6388);
        assert_eq!(config.subscriber_config.addresses.len(), 2);
        assert_eq!(config.subscriber_config.topics, ["/1b/hrit-segment/0deg"]);
        assert_eq!(config.publisher_config.name.as_deref(), Some("hrit_selector"));
    }

    #[test]
    fn selector_section_is_optional_and_defaults() {
        let yaml = r#"
subscriber_config:
  addresses:
    - ipc:///tmp/in.ipc
publisher_config:
  address: ipc:///tmp/out.ipc
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.selector_config.ttl_duration(), Duration::from_secs(300));
        assert!(config.selector_config.host.is_none());
        assert!(config.selector_config.directory.is_none());
        assert!(config.subscriber_config.topics.is_empty());
    }

    #[test]
    fn fractional_ttl() {
        let yaml = r#"
selector_config:
  ttl: 0.1
subscriber_config:
  addresses: []
publisher_config:
  address: ipc:///tmp/out.ipc
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.selector_config.ttl_duration(),
            Duration::from_millis(100)
        );
    }
}
