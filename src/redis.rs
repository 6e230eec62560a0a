use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

use crate::resp::{RespError, RespValue};
use crate::store::StoreError;

/// How long to keep retrying the initial connection before giving up.
/// Covers the settle time of a freshly spawned server.
const CONNECT_DEADLINE: Duration = Duration::from_secs(3);
const CONNECT_RETRY: Duration = Duration::from_millis(100);

/// TTL store backend talking to a Redis-compatible server.
///
/// The server enforces both the atomicity of insert-if-absent (`SET ... NX`)
/// and the expiry (`PX`), so multiple selector instances can share one store
/// without a lost-update window.
pub struct RedisStore {
    stream: TcpStream,
    addr: String,
    ttl: Duration,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

/// An owned, already-validated server reply.
#[derive(Debug)]
enum Reply {
    Simple(String),
    Integer(i64),
    Bulk(String),
    Null,
}

impl RedisStore {
    /// Connect to the server, retrying until `CONNECT_DEADLINE` passes.
    ///
    /// Fails loudly if the server cannot be reached in time: silently
    /// treating every key as absent would defeat deduplication.
    pub async fn connect(host: &str, port: u16, ttl: Duration) -> Result<Self, StoreError> {
        let addr = format!("{host}:{port}");
        let deadline = Instant::now() + CONNECT_DEADLINE;
        loop {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let mut store = RedisStore {
                        stream,
                        addr,
                        ttl,
                        read_buf: BytesMut::with_capacity(512),
                        write_buf: BytesMut::with_capacity(512),
                    };
                    store.ping().await?;
                    return Ok(store);
                }
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Unavailable {
                            addr,
                            reason: e.to_string(),
                        });
                    }
                    debug!("store at {} not reachable yet: {}", addr, e);
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
            }
        }
    }

    pub async fn insert_if_absent(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let expiry_millis = self.ttl.as_millis().to_string();
        let reply = self
            .command(vec![
                RespValue::BulkString("SET"),
                RespValue::BulkString(key),
                RespValue::BulkString(value),
                RespValue::BulkString("NX"),
                RespValue::BulkString("PX"),
                RespValue::OwnedBulkString(expiry_millis),
            ])
            .await?;
        match reply {
            // OK: stored; null: a live entry already exists, which the NX
            // flag left untouched. Both are fine.
            Reply::Simple(s) if s == "OK" => Ok(()),
            Reply::Null => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected SET reply: {:?}",
                other
            ))),
        }
    }

    pub async fn contains(&mut self, key: &str) -> Result<bool, StoreError> {
        let reply = self
            .command(vec![
                RespValue::BulkString("EXISTS"),
                RespValue::BulkString(key),
            ])
            .await?;
        match reply {
            Reply::Integer(n) => Ok(n > 0),
            other => Err(StoreError::Protocol(format!(
                "unexpected EXISTS reply: {:?}",
                other
            ))),
        }
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let reply = self
            .command(vec![
                RespValue::BulkString("GET"),
                RespValue::BulkString(key),
            ])
            .await?;
        match reply {
            Reply::Bulk(value) => Ok(Some(value)),
            Reply::Null => Ok(None),
            other => Err(StoreError::Protocol(format!(
                "unexpected GET reply: {:?}",
                other
            ))),
        }
    }

    async fn ping(&mut self) -> Result<(), StoreError> {
        match self.command(vec![RespValue::BulkString("PING")]).await? {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected PING reply: {:?}",
                other
            ))),
        }
    }

    /// Send one command and read its reply. One request in flight at a time;
    /// the reply is re-parsed as bytes arrive until the frame is complete.
    async fn command(&mut self, parts: Vec<RespValue<'_>>) -> Result<Reply, StoreError> {
        self.write_buf.clear();
        RespValue::Array(parts).serialize(&mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;

        self.read_buf.clear();
        loop {
            let bytes_read = self.stream.read_buf(&mut self.read_buf).await?;
            if bytes_read == 0 {
                return Err(StoreError::Unavailable {
                    addr: self.addr.clone(),
                    reason: "connection closed by server".to_string(),
                });
            }
            match RespValue::deserialize(&self.read_buf) {
                Ok((value, _rest)) => return reply_from(value),
                Err(RespError::Incomplete) => continue,
                Err(RespError::Invalid(reason)) => return Err(StoreError::Protocol(reason)),
            }
        }
    }
}

fn reply_from(value: RespValue<'_>) -> Result<Reply, StoreError> {
    match value {
        RespValue::SimpleString(s) => Ok(Reply::Simple(s.to_string())),
        RespValue::SimpleError(e) => Err(StoreError::Protocol(format!("server error: {e}"))),
        RespValue::Integer(n) => Ok(Reply::Integer(n)),
        RespValue::BulkString(s) => Ok(Reply::Bulk(s.to_string())),
        RespValue::NullBulkString => Ok(Reply::Null),
        other => Err(StoreError::Protocol(format!(
            "unexpected reply value: {:?}",
            other
        ))),
    }
}
