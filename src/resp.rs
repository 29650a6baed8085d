//! RESP (Redis Serialization Protocol) framing.
//!
//! The decoder consumes client request frames, which are always arrays of
//! bulk strings. The encoder produces the reply shapes the server needs:
//! simple strings, errors, integers, bulk strings, null bulks and arrays.
//! Both halves are pure byte manipulation; sockets live elsewhere. Bulk
//! payloads are consumed by exact byte count and carried as raw bytes, so
//! arbitrary binary keys and values survive the codec untouched.

use bytes::{Buf, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid RESP header")]
    BadHeader,
    #[error("invalid array size: {0:?} (must be >= 1)")]
    BadCount(String),
    #[error("invalid bulk string header")]
    BadBulkHeader,
    #[error("invalid string length: {0:?} (must be >= 0)")]
    BadLength(String),
}

/// A decoded client request frame.
///
/// `name` is the first bulk, folded to lowercase for dispatch (a
/// non-UTF-8 name cannot match any command and is rejected as unknown by
/// the dispatcher). The remaining bulks are raw bytes, byte-for-byte as
/// sent; option tokens such as `PX` are matched case-insensitively where
/// they are interpreted.
#[derive(Debug, PartialEq, Clone)]
pub struct Command {
    pub name: String,
    pub args: Vec<Vec<u8>>,
    /// Serialized length of the frame on the wire, as consumed from the
    /// stream. Replica-mode offset accounting adds this per frame.
    pub wire_len: usize,
}

/// Incremental decoder over an internal reassembly buffer.
///
/// Frames may arrive split across any number of socket reads; `feed`
/// appends raw bytes and `decode` yields at most one complete frame per
/// call, leaving partial input buffered.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Attempts to decode exactly one array frame.
    ///
    /// Returns `Ok(None)` when the buffered input is an incomplete prefix of
    /// a valid frame; nothing is consumed in that case.
    pub fn decode(&mut self) -> Result<Option<Command>, RespError> {
        let Some((header, mut pos)) = read_line(&self.buffer, 0) else {
            return Ok(None);
        };

        if header.first() != Some(&b'*') {
            return Err(RespError::BadHeader);
        }

        let count = match parse_integer(&header[1..]) {
            Some(n) if n >= 1 => n as usize,
            _ => {
                return Err(RespError::BadCount(
                    String::from_utf8_lossy(&header[1..]).into_owned(),
                ))
            }
        };

        let mut bulks: Vec<Vec<u8>> = Vec::with_capacity(count);

        for _ in 0..count {
            let Some((line, line_end)) = read_line(&self.buffer, pos) else {
                return Ok(None);
            };

            if line.first() != Some(&b'$') {
                return Err(RespError::BadBulkHeader);
            }

            let length = match parse_integer(&line[1..]) {
                Some(n) if n >= 0 => n as usize,
                _ => {
                    return Err(RespError::BadLength(
                        String::from_utf8_lossy(&line[1..]).into_owned(),
                    ))
                }
            };
            pos = line_end;

            // Payload is consumed by exact byte count, then the trailing
            // CRLF is discarded.
            if self.buffer.len() < pos + length + 2 {
                return Ok(None);
            }

            bulks.push(self.buffer[pos..pos + length].to_vec());
            pos += length + 2;
        }

        self.buffer.advance(pos);

        let mut bulks = bulks.into_iter();
        let name_bytes = bulks
            .next()
            .expect("count >= 1 guarantees at least one bulk");
        let name = String::from_utf8_lossy(&name_bytes).to_ascii_lowercase();

        Ok(Some(Command {
            name,
            args: bulks.collect(),
            wire_len: pos,
        }))
    }
}

/// Reads one CRLF-terminated line starting at `pos` and returns it with
/// the position just past the terminator. `None` means the line is
/// incomplete.
fn read_line(buffer: &BytesMut, pos: usize) -> Option<(&[u8], usize)> {
    let end = buffer[pos..].windows(2).position(|w| w == b"\r\n")?;

    Some((&buffer[pos..pos + end], pos + end + 2))
}

fn parse_integer(digits: &[u8]) -> Option<i64> {
    std::str::from_utf8(digits).ok()?.parse::<i64>().ok()
}

/// Reply shapes produced by the server.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Vec<u8>),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s).into_bytes(),
            RespValue::Error(msg) => format!("-{}\r\n", msg).into_bytes(),
            RespValue::Integer(n) => format!(":{}\r\n", n).into_bytes(),
            RespValue::BulkString(payload) => {
                let mut output = format!("${}\r\n", payload.len()).into_bytes();
                output.extend_from_slice(payload);
                output.extend_from_slice(b"\r\n");
                output
            }
            RespValue::NullBulkString => b"$-1\r\n".to_vec(),
            RespValue::Array(elements) => {
                let mut output = format!("*{}\r\n", elements.len()).into_bytes();
                for element in elements {
                    output.extend_from_slice(&element.encode());
                }
                output
            }
        }
    }
}

/// Serializes a command and its arguments as an array of bulk strings.
///
/// Used by the replication handshake and by write propagation to replicas.
pub fn encode_command<S: AsRef<[u8]>>(parts: &[S]) -> Vec<u8> {
    RespValue::Array(
        parts
            .iter()
            .map(|part| RespValue::BulkString(part.as_ref().to_vec()))
            .collect(),
    )
    .encode()
}
