use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::codec::decode_entry;
use super::{Ledger, LedgerBatch, LedgerEntry, LedgerError};

/// In-process ledger. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `LedgerError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("memory ledger offline".to_string()));
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn entry(&self, key: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        self.check_available()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::Unavailable("memory ledger lock poisoned".to_string()))?;
        entries
            .get(key)
            .cloned()
            .map(|stored| decode_entry(key, stored))
            .transpose()
    }

    fn apply(&self, batch: LedgerBatch) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LedgerError::Unavailable("memory ledger lock poisoned".to_string()))?;

        let writes = batch.resolve(|key| Ok(entries.get(key).cloned()))?;
        for (key, payload) in writes {
            entries.insert(key, payload);
        }
        Ok(())
    }
}
