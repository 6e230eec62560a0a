use serde_json::{Map, Value};

/// Kind tag of messages announcing a new file.
pub const FILE_KIND: &str = "file";

/// A notification message as received from the wire.
///
/// The wire form is `<topic> <kind> <json-payload>`. The raw string is kept
/// verbatim so that forwarding never re-encodes the payload and accidentally
/// drops fields the selector does not model.
#[derive(Debug, Clone)]
pub struct Notification {
    raw: String,
    topic: String,
    kind: String,
    payload: Map<String, Value>,
}

impl Notification {
    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let mut parts = data.splitn(3, ' ');
        let topic = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::format_err!("message without a topic: {:?}", data))?;
        let kind = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::format_err!("message without a kind tag: {:?}", data))?;
        let payload = parts
            .next()
            .ok_or_else(|| anyhow::format_err!("message without a payload: {:?}", data))?;
        let payload = match serde_json::from_str(payload)? {
            Value::Object(map) => map,
            other => anyhow::bail!("message payload is not an object: {:?}", other),
        };
        Ok(Notification {
            raw: data.to_string(),
            topic: topic.to_string(),
            kind: kind.to_string(),
            payload,
        })
    }

    /// The verbatim wire representation this message was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == FILE_KIND
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The unique identifier of the object this message refers to, if any.
    ///
    /// Two messages with the same uid refer to the same logical file, even
    /// when their uris point at different replicas.
    pub fn uid(&self) -> Option<&str> {
        self.payload.get("uid").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{Notification, FILE_KIND};

    #[test]
    fn parse_file_message() {
        let raw = r#"/segment/viirs/l1b file {"sensor": "viirs", "uid": "IVCDB_j01.h5", "uri": "file:///sdr/IVCDB_j01.h5"}"#;
        let message = Notification::parse(raw).unwrap();
        assert_eq!(message.topic(), "/segment/viirs/l1b");
        assert_eq!(message.kind(), FILE_KIND);
        assert!(message.is_file());
        assert_eq!(message.uid(), Some("IVCDB_j01.h5"));
        assert_eq!(message.raw(), raw);
    }

    #[test]
    fn parse_other_kinds() {
        let message = Notification::parse(r#"/segment/viirs/l1b del {"uid": "gone.h5"}"#).unwrap();
        assert!(!message.is_file());
        assert_eq!(message.kind(), "del");
    }

    #[test]
    fn uid_missing_or_not_a_string() {
        let message = Notification::parse(r#"/topic file {"uri": "file:///a.h5"}"#).unwrap();
        assert_eq!(message.uid(), None);
        let message = Notification::parse(r#"/topic file {"uid": 42}"#).unwrap();
        assert_eq!(message.uid(), None);
    }

    #[test]
    fn malformed_messages() {
        // No payload
        assert!(Notification::parse("/topic file").is_err());
        // Invalid json
        assert!(Notification::parse("/topic file {not json").is_err());
        // Payload not an object
        assert!(Notification::parse("/topic file [1, 2]").is_err());
        // Empty string
        assert!(Notification::parse("").is_err());
    }
}
