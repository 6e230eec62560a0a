use anyhow::Context;
use tracing::{debug, warn};
use zeromq::{Socket, SocketRecv, SubSocket};

use crate::config::SubscriberConfig;
use crate::message::Notification;

/// Source of inbound notification messages.
///
/// Connects a SUB socket to every configured publisher address. Topic
/// filtering is prefix-based on the wire representation, which starts with
/// the topic; an empty topic list subscribes to everything.
pub struct Subscriber {
    socket: SubSocket,
}

impl Subscriber {
    pub async fn connect(config: &SubscriberConfig) -> anyhow::Result<Self> {
        let mut socket = SubSocket::new();
        for address in &config.addresses {
            socket
                .connect(address)
                .await
                .with_context(|| format!("failed to subscribe to {address}"))?;
        }
        if config.topics.is_empty() {
            socket.subscribe("").await?;
        } else {
            for topic in &config.topics {
                socket.subscribe(topic).await?;
            }
        }
        Ok(Subscriber { socket })
    }

    /// Receive the next file notification, blocking until one arrives.
    ///
    /// Messages of other kinds are skipped silently; frames that fail to
    /// decode are logged and skipped, so one bad producer cannot kill the
    /// stream. A transport error ends the stream and is returned.
    pub async fn next_file_message(&mut self) -> anyhow::Result<Notification> {
        loop {
            let frames = self
                .socket
                .recv()
                .await
                .context("subscription receive failed")?;
            let Some(frame) = frames.get(0) else {
                warn!("skipping empty message");
                continue;
            };
            let raw = match std::str::from_utf8(&frame[..]) {
                Ok(raw) => raw,
                Err(_) => {
                    warn!("skipping non-utf8 message of {} bytes", frame.len());
                    continue;
                }
            };
            match Notification::parse(raw) {
                Ok(message) if message.is_file() => return Ok(message),
                Ok(message) => {
                    debug!("skipping {} message on {}", message.kind(), message.topic());
                }
                Err(e) => {
                    warn!("skipping undecodable message: {e:#}");
                }
            }
        }
    }
}
