use anyhow::Context;
use tracing::info;
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

use crate::config::PublisherConfig;

/// Sink for the messages that survive selection.
pub struct Publisher {
    socket: PubSocket,
    name: String,
}

impl Publisher {
    pub async fn bind(config: &PublisherConfig) -> anyhow::Result<Self> {
        let mut socket = PubSocket::new();
        socket
            .bind(&config.address)
            .await
            .with_context(|| format!("failed to bind publisher to {}", config.address))?;
        let name = config.name.clone().unwrap_or_else(|| "selector".to_string());
        info!("publisher {} bound to {}", name, config.address);
        Ok(Publisher { socket, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish the verbatim wire representation of a selected message.
    pub async fn send(&mut self, raw: &str) -> anyhow::Result<()> {
        let message = ZmqMessage::from(raw.as_bytes().to_vec());
        self.socket
            .send(message)
            .await
            .context("publication failed")?;
        Ok(())
    }
}
