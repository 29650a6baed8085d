//! In-memory key/value store with per-entry expiry.
//!
//! Keys and content are raw bytes; anything the codec can frame can be
//! stored. Expiries are absolute wall-clock instants. The whole store sits
//! behind a single `tokio::sync::Mutex` at the call sites so that the
//! `{content, expires_at}` pair is always observed atomically; `get` takes
//! the same lock as `set`.

use std::collections::HashMap;

use jiff::Timestamp;

/// A stored record. `expires_at = None` means the entry never expires.
#[derive(Debug, PartialEq, Clone)]
pub struct Entry {
    pub content: Vec<u8>,
    pub expires_at: Option<Timestamp>,
}

impl Entry {
    pub fn new(content: Vec<u8>, expires_at: Option<Timestamp>) -> Self {
        Self {
            content,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<Vec<u8>, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts or replaces the record for `key`.
    pub fn set(&mut self, key: Vec<u8>, content: Vec<u8>, expires_at: Option<Timestamp>) {
        self.entries.insert(key, Entry::new(content, expires_at));
    }

    /// Returns the live content for `key`, removing the entry if its expiry
    /// has passed.
    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(Timestamp::now()) => {
                self.entries.remove(key);
                None
            }
            Some(entry) => Some(entry.content.clone()),
            None => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
