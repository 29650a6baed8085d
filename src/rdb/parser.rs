//! Byte-driven state machine over the binary snapshot format.
//!
//! The machine consumes one byte at a time so the surrounding reader can
//! feed it arbitrarily sized chunks; multi-byte items (expiry timestamps,
//! key and value payloads) reassemble across chunk boundaries. Keys and
//! values are length-driven raw bytes, so binary payloads pass through
//! untouched. Memory stays bounded by the largest single payload, never
//! the file size.
//!
//! Length fields are single bytes. This is a deliberate simplification of
//! the full RDB length encoding and bounds keys and values at 255 bytes;
//! fixtures document the boundary.

use std::collections::HashMap;

use jiff::Timestamp;
use thiserror::Error;

use crate::store::Entry;

const OPCODE_METADATA: u8 = 0xFA;
const OPCODE_DATABASE: u8 = 0xFE;
const OPCODE_RESIZE: u8 = 0xFB;
const OPCODE_EXPIRY_MILLIS: u8 = 0xFC;
const OPCODE_EXPIRY_SECONDS: u8 = 0xFD;
const OPCODE_EOF: u8 = 0xFF;
const STRING_ENCODING: u8 = 0x00;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot truncated while reading {0}")]
    Truncated(&'static str),
    #[error("invalid expiry timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Start,
    Meta,
    DbSection,
    DbIndex,
    HashCount,
    ExpiryHashCount,
    ExpiryOrEncoding,
    ExpiryParse,
    KeyEncoding,
    KeyLength,
    KeyParse,
    ValueLength,
    ValueParse,
    Eof,
}

/// Streaming snapshot parser.
///
/// Feed bytes with [`SnapshotParser::feed`], then call
/// [`SnapshotParser::finish`] at stream end to obtain the decoded map. With
/// a target key set, parsing stops as soon as that key has been emitted.
#[derive(Debug)]
pub struct SnapshotParser {
    state: ParserState,
    db_index: u8,
    hash_count: u8,
    expiry_hash_count: u8,
    key_encoding: u8,
    expiry_width: usize,
    expiry_bytes: Vec<u8>,
    pending_expiry: Option<Timestamp>,
    key_len: usize,
    key_bytes: Vec<u8>,
    current_key: Vec<u8>,
    value_len: usize,
    value_bytes: Vec<u8>,
    entries: HashMap<Vec<u8>, Entry>,
    target: Option<Vec<u8>>,
    done: bool,
}

impl Default for SnapshotParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Start,
            db_index: 0,
            hash_count: 0,
            expiry_hash_count: 0,
            key_encoding: STRING_ENCODING,
            expiry_width: 0,
            expiry_bytes: Vec::new(),
            pending_expiry: None,
            key_len: 0,
            key_bytes: Vec::new(),
            current_key: Vec::new(),
            value_len: 0,
            value_bytes: Vec::new(),
            entries: HashMap::new(),
            target: None,
            done: false,
        }
    }

    /// Single-key mode: stop parsing as soon as `key` has been emitted.
    pub fn with_target(key: &[u8]) -> Self {
        let mut parser = Self::new();
        parser.target = Some(key.to_vec());
        parser
    }

    /// True once the end-of-file opcode was consumed or the target key was
    /// found; further input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Index byte from the database selector section. Only database 0 is
    /// meaningful to the rest of the pipeline.
    pub fn db_index(&self) -> u8 {
        self.db_index
    }

    /// Declared hash-table size from the resize block.
    pub fn hash_count(&self) -> u8 {
        self.hash_count
    }

    /// Declared expiry hash-table size from the resize block.
    pub fn expiry_hash_count(&self) -> u8 {
        self.expiry_hash_count
    }

    /// Type byte of the record currently being decoded. Informational; only
    /// string records are produced.
    pub fn key_encoding(&self) -> u8 {
        self.key_encoding
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), SnapshotError> {
        for &byte in chunk {
            if self.done {
                break;
            }
            self.step(byte)?;
        }
        Ok(())
    }

    /// Consumes the parser at stream end.
    ///
    /// A stream that ends mid-payload is reported as truncated; a stream
    /// that simply never reached the end-of-file opcode yields the partial
    /// map, and the caller decides what that means.
    pub fn finish(self) -> Result<HashMap<Vec<u8>, Entry>, SnapshotError> {
        if self.done {
            return Ok(self.entries);
        }

        match self.state {
            ParserState::ExpiryParse => Err(SnapshotError::Truncated("expiry timestamp")),
            ParserState::KeyParse => Err(SnapshotError::Truncated("key payload")),
            ParserState::ValueParse if self.value_len > 0 => {
                Err(SnapshotError::Truncated("value payload"))
            }
            _ => Ok(self.entries),
        }
    }

    fn step(&mut self, byte: u8) -> Result<(), SnapshotError> {
        match self.state {
            // Header and metadata noise is tolerated; anything that is not
            // the expected section opcode is skipped.
            ParserState::Start => {
                if byte == OPCODE_METADATA {
                    self.state = ParserState::Meta;
                }
            }
            ParserState::Meta => {
                if byte == OPCODE_DATABASE {
                    self.state = ParserState::DbSection;
                }
            }
            ParserState::DbSection => {
                // Database index; only database 0 is meaningful here.
                self.db_index = byte;
                self.state = ParserState::DbIndex;
            }
            ParserState::DbIndex => {
                if byte == OPCODE_RESIZE {
                    self.state = ParserState::HashCount;
                }
            }
            ParserState::HashCount => {
                self.hash_count = byte;
                self.state = ParserState::ExpiryHashCount;
            }
            ParserState::ExpiryHashCount => {
                self.expiry_hash_count = byte;
                self.state = ParserState::ExpiryOrEncoding;
            }
            ParserState::ExpiryOrEncoding => match byte {
                OPCODE_EXPIRY_MILLIS => self.begin_expiry(8),
                OPCODE_EXPIRY_SECONDS => self.begin_expiry(4),
                encoding => self.begin_key(encoding),
            },
            ParserState::ExpiryParse => {
                self.expiry_bytes.push(byte);
                if self.expiry_bytes.len() == self.expiry_width {
                    self.pending_expiry = Some(self.decode_expiry()?);
                    self.state = ParserState::KeyEncoding;
                }
            }
            ParserState::KeyEncoding => self.begin_key(byte),
            ParserState::KeyLength => {
                self.key_len = byte as usize;
                self.key_bytes.clear();
                if self.key_len == 0 {
                    self.current_key = Vec::new();
                    self.state = ParserState::ValueLength;
                } else {
                    self.state = ParserState::KeyParse;
                }
            }
            ParserState::KeyParse => {
                self.key_bytes.push(byte);
                if self.key_bytes.len() == self.key_len {
                    self.current_key = std::mem::take(&mut self.key_bytes);
                    self.state = ParserState::ValueLength;
                }
            }
            ParserState::ValueLength => {
                self.value_len = byte as usize;
                self.value_bytes.clear();
                self.state = ParserState::ValueParse;
                if self.value_len == 0 {
                    self.emit(Vec::new());
                }
            }
            ParserState::ValueParse => {
                if self.value_len == 0 {
                    // Between records: the byte after an emitted value is
                    // either a control opcode or the next key's encoding.
                    match byte {
                        OPCODE_EOF => {
                            self.state = ParserState::Eof;
                            self.done = true;
                        }
                        OPCODE_EXPIRY_MILLIS => self.begin_expiry(8),
                        encoding => self.begin_key(encoding),
                    }
                    return Ok(());
                }

                self.value_bytes.push(byte);
                if self.value_bytes.len() == self.value_len {
                    let value = std::mem::take(&mut self.value_bytes);
                    self.emit(value);
                }
            }
            ParserState::Eof => {}
        }

        Ok(())
    }

    fn begin_expiry(&mut self, width: usize) {
        self.expiry_width = width;
        self.expiry_bytes.clear();
        self.state = ParserState::ExpiryParse;
    }

    fn begin_key(&mut self, encoding: u8) {
        self.key_encoding = encoding;
        self.state = ParserState::KeyLength;
    }

    fn decode_expiry(&self) -> Result<Timestamp, SnapshotError> {
        // 0xFC carries 8 little-endian bytes of epoch milliseconds; 0xFD
        // carries 4 little-endian bytes of epoch seconds.
        match self.expiry_width {
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&self.expiry_bytes);
                let millis = u64::from_le_bytes(raw);
                Timestamp::from_millisecond(millis as i64)
                    .map_err(|e| SnapshotError::InvalidTimestamp(e.to_string()))
            }
            _ => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&self.expiry_bytes);
                let seconds = u32::from_le_bytes(raw);
                Timestamp::from_second(seconds as i64)
                    .map_err(|e| SnapshotError::InvalidTimestamp(e.to_string()))
            }
        }
    }

    /// Emits the current record. Duplicate keys within the file resolve as
    /// last write wins; the pending expiry applies to this record only.
    fn emit(&mut self, value: Vec<u8>) {
        let key = std::mem::take(&mut self.current_key);
        let entry = Entry::new(value, self.pending_expiry.take());
        self.entries.insert(key, entry);
        self.value_len = 0;

        if let Some(target) = &self.target {
            if self.entries.contains_key(target) {
                self.done = true;
            }
        }
    }
}
