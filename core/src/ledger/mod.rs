//! Ledger
//!
//! Append-only keyed object store that every other component reads and
//! writes through.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Ledger Keys                             │
//! │                                                                  │
//! │  set_<id>          EncryptedSet record                          │
//! │  owner_<party>     current set id of a party                    │
//! │  req_<request>     PsiRequest record                            │
//! │  result_<request>  PsiResult record                             │
//! │                                                                  │
//! │  set_keys          index: set ids in submission order           │
//! │  request_keys      index: request ids in dispatch order         │
//! │  result_keys       index: request ids in commit order           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod db;
pub mod memory;

pub use codec::{Record, decode_index, decode_record, encode_index, encode_record};
pub use db::RocksLedger;
pub use memory::MemoryLedger;

use std::sync::Arc;

use arcpsi_party::PartyId;
use thiserror::Error;

use codec::{decode_entry, encode_entry};

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("rocksdb: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("codec error at {key}: {reason}")]
    Codec { key: String, reason: String },

    /// A `create` in the batch named a key that already exists.
    #[error("key already exists: {0}")]
    Conflict(String),
}

/// One stored entry and the party that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: String,
    pub payload: Vec<u8>,
    pub writer: PartyId,
}

/// A set of writes committed together by one writer.
///
/// Creates are checked first, then puts land, then index appends. An append
/// adds the member only if the index does not already contain it. Every
/// entry the batch touches, indexes included, is attributed to the writer.
#[derive(Debug, Clone)]
pub struct LedgerBatch {
    writer: PartyId,
    creates: Vec<(String, Vec<u8>)>,
    puts: Vec<(String, Vec<u8>)>,
    appends: Vec<(String, String)>,
}

impl LedgerBatch {
    pub fn new(writer: PartyId) -> Self {
        Self {
            writer,
            creates: Vec::new(),
            puts: Vec::new(),
            appends: Vec::new(),
        }
    }

    pub fn writer(&self) -> &PartyId {
        &self.writer
    }

    /// Write `key` only if it is absent. Otherwise nothing in the batch is
    /// committed and `apply` fails with `LedgerError::Conflict`.
    pub fn create(mut self, key: impl Into<String>, payload: Vec<u8>) -> Self {
        self.creates.push((key.into(), payload));
        self
    }

    pub fn put(mut self, key: impl Into<String>, payload: Vec<u8>) -> Self {
        self.puts.push((key.into(), payload));
        self
    }

    pub fn append(mut self, index: impl Into<String>, member: impl Into<String>) -> Self {
        self.appends.push((index.into(), member.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.puts.is_empty() && self.appends.is_empty()
    }

    /// Flatten into stored writes, reading stored bytes through `read`.
    /// Callers must hold whatever lock serializes `apply`.
    pub(crate) fn resolve<F>(self, mut read: F) -> Result<Vec<(String, Vec<u8>)>, LedgerError>
    where
        F: FnMut(&str) -> Result<Option<Vec<u8>>, LedgerError>,
    {
        let LedgerBatch {
            writer,
            creates,
            puts,
            appends,
        } = self;

        for (key, _) in &creates {
            if read(key)?.is_some() {
                return Err(LedgerError::Conflict(key.clone()));
            }
        }

        let mut writes: Vec<(String, Vec<u8>)> = creates
            .into_iter()
            .chain(puts)
            .map(|(key, payload)| {
                let stored = encode_entry(&writer, &payload);
                (key, stored)
            })
            .collect();

        let mut touched: Vec<(String, Vec<String>)> = Vec::new();
        for (index, member) in appends {
            let pos = match touched.iter().position(|(k, _)| *k == index) {
                Some(pos) => pos,
                None => {
                    let members = match read(&index)? {
                        Some(stored) => {
                            decode_index(&index, &decode_entry(&index, stored)?.payload)?
                        }
                        None => Vec::new(),
                    };
                    touched.push((index, members));
                    touched.len() - 1
                }
            };
            let members = &mut touched[pos].1;
            if !members.contains(&member) {
                members.push(member);
            }
        }

        for (index, members) in touched {
            let payload = encode_index(&index, &members)?;
            writes.push((index, encode_entry(&writer, &payload)));
        }
        Ok(writes)
    }
}

/// String-keyed store shared by every protocol component.
pub trait Ledger: Send + Sync {
    /// Read an entry with its writer. Absent keys are `Ok(None)`.
    fn entry(&self, key: &str) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Commit a batch atomically. Creates and index appends are checked
    /// against every other `apply` on the same ledger.
    fn apply(&self, batch: LedgerBatch) -> Result<(), LedgerError>;

    /// Read a payload. Absent keys are `Ok(None)`, never an error.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.entry(key)?.map(|e| e.payload))
    }

    /// Party that last wrote `key`.
    fn writer_of(&self, key: &str) -> Result<Option<PartyId>, LedgerError> {
        Ok(self.entry(key)?.map(|e| e.writer))
    }

    /// Unconditional upsert.
    fn put(&self, key: &str, writer: PartyId, payload: Vec<u8>) -> Result<(), LedgerError> {
        self.apply(LedgerBatch::new(writer).put(key, payload))
    }

    /// Append `member` to the index at `index` unless already present.
    fn append_to_index(
        &self,
        index: &str,
        writer: PartyId,
        member: &str,
    ) -> Result<(), LedgerError> {
        self.apply(LedgerBatch::new(writer).append(index, member))
    }

    /// Members of an index in append order. Missing index is empty.
    fn index(&self, index: &str) -> Result<Vec<String>, LedgerError> {
        match self.get(index)? {
            Some(bytes) => decode_index(index, &bytes),
            None => Ok(Vec::new()),
        }
    }
}

pub type SharedLedger = Arc<dyn Ledger>;
