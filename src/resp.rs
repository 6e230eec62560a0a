use bytes::{BufMut, BytesMut};
use thiserror::Error;

const TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, Error)]
pub enum RespError {
    /// The buffer ends before the value does. Read more and try again.
    #[error("incomplete RESP frame")]
    Incomplete,
    #[error("invalid RESP data: {0}")]
    Invalid(String),
}

/// The subset of RESP values exchanged with the backing store server.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue<'data> {
    SimpleString(&'data str),
    SimpleError(&'data str),
    Integer(i64),
    BulkString(&'data str),
    OwnedBulkString(String),
    NullBulkString,
    Array(Vec<RespValue<'data>>),
}

impl<'data> RespValue<'data> {
    fn tag(&self) -> u8 {
        match self {
            RespValue::SimpleString(_) => b'+',
            RespValue::SimpleError(_) => b'-',
            RespValue::Integer(_) => b':',
            RespValue::BulkString(_) => b'$',
            RespValue::OwnedBulkString(_) => b'$',
            RespValue::NullBulkString => b'$',
            RespValue::Array(_) => b'*',
        }
    }

    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag());
        match self {
            RespValue::SimpleString(s) | RespValue::SimpleError(s) => {
                buf.put(s.as_bytes());
                buf.put(TERMINATOR);
            }
            RespValue::Integer(n) => {
                buf.put(n.to_string().as_bytes());
                buf.put(TERMINATOR);
            }
            RespValue::BulkString(s) => serialize_bulk(buf, s),
            RespValue::OwnedBulkString(s) => serialize_bulk(buf, s),
            RespValue::NullBulkString => {
                buf.put(&b"-1"[..]);
                buf.put(TERMINATOR);
            }
            RespValue::Array(elements) => {
                buf.put(elements.len().to_string().as_bytes());
                buf.put(TERMINATOR);
                for e in elements.iter() {
                    e.serialize(buf);
                }
            }
        }
    }

    pub fn deserialize(data: &'data [u8]) -> Result<(Self, &'data [u8]), RespError> {
        if data.is_empty() {
            return Err(RespError::Incomplete);
        }

        match data[0] {
            b'+' => {
                // Simple string: "+OK\r\n"
                let (line, rest) = read_line(data)?;
                Ok((RespValue::SimpleString(line), rest))
            }
            b'-' => {
                // Simple error: "-ERR message\r\n"
                let (line, rest) = read_line(data)?;
                Ok((RespValue::SimpleError(line), rest))
            }
            b':' => {
                // Integer: ":[<+|->]<value>\r\n"
                let (line, rest) = read_line(data)?;
                let n = line
                    .parse::<i64>()
                    .map_err(|_| RespError::Invalid(format!("invalid integer {:?}", line)))?;
                Ok((RespValue::Integer(n), rest))
            }
            b'$' => {
                // Bulk string: "$<length>\r\n<data>\r\n", or "$-1\r\n"
                let (line, rest) = read_line(data)?;
                if line == "-1" {
                    return Ok((RespValue::NullBulkString, rest));
                }
                let data_len = line
                    .parse::<usize>()
                    .map_err(|_| RespError::Invalid(format!("invalid bulk length {:?}", line)))?;
                if rest.len() < data_len + 2 {
                    return Err(RespError::Incomplete);
                }
                if &rest[data_len..data_len + 2] != TERMINATOR {
                    return Err(RespError::Invalid("unterminated bulk string".to_string()));
                }
                let string = std::str::from_utf8(&rest[..data_len])
                    .map_err(|_| RespError::Invalid("bulk string is not utf-8".to_string()))?;
                Ok((RespValue::BulkString(string), &rest[data_len + 2..]))
            }
            b'*' => {
                // Array: "*<number-of-elements>\r\n<element-1>...<element-n>"
                let (line, rest) = read_line(data)?;
                let num_elements = line
                    .parse::<usize>()
                    .map_err(|_| RespError::Invalid(format!("invalid array length {:?}", line)))?;
                let mut rest = rest;
                let mut elements = Vec::with_capacity(num_elements);
                for _ in 0..num_elements {
                    let result = RespValue::deserialize(rest)?;
                    elements.push(result.0);
                    rest = result.1;
                }
                Ok((RespValue::Array(elements), rest))
            }
            tag => Err(RespError::Invalid(format!("unexpected RESP tag {}", tag))),
        }
    }
}

fn serialize_bulk(buf: &mut BytesMut, s: &str) {
    buf.put(s.len().to_string().as_bytes());
    buf.put(TERMINATOR);
    buf.put(s.as_bytes());
    buf.put(TERMINATOR);
}

/// Split off the line after the leading tag byte, up to the next terminator.
fn read_line(data: &[u8]) -> Result<(&str, &[u8]), RespError> {
    match find_terminator(data) {
        Some(terminator_index) => {
            let line = std::str::from_utf8(&data[1..terminator_index])
                .map_err(|_| RespError::Invalid("line is not utf-8".to_string()))?;
            Ok((line, &data[terminator_index + 2..]))
        }
        None => Err(RespError::Incomplete),
    }
}

/// Find `Some(index)` of the first occurence of b'\r\n' in the slice,
/// or `None` if the slice doesn't contain a terminator.
fn find_terminator(data: &[u8]) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    let mut i = 0;
    while i < data.len() - 1 {
        if &data[i..i + 2] == TERMINATOR {
            return Some(i);
        }
        i += 1;
    }
    None
}
