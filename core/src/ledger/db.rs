use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};

use super::codec::decode_entry;
use super::{Ledger, LedgerBatch, LedgerEntry, LedgerError};

const CF_ENTRIES: &str = "entries";

/// A thread-safe, persistent ledger backed by RocksDB.
#[derive(Clone)]
pub struct RocksLedger {
    db: Arc<DB>,
    /// Held across every read-modify-write of an index or create check.
    write_lock: Arc<Mutex<()>>,
}

impl RocksLedger {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = vec![ColumnFamilyDescriptor::new(CF_ENTRIES, Options::default())];

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn entries(&self) -> Result<&rocksdb::ColumnFamily, LedgerError> {
        self.db
            .cf_handle(CF_ENTRIES)
            .ok_or_else(|| LedgerError::Unavailable("entries CF missing".to_string()))
    }

    /// Number of stored keys (indexes included).
    pub fn key_count(&self) -> Result<usize, LedgerError> {
        let cf = self.entries()?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl Ledger for RocksLedger {
    fn entry(&self, key: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let cf = self.entries()?;
        self.db
            .get_cf(cf, key.as_bytes())?
            .map(|stored| decode_entry(key, stored))
            .transpose()
    }

    fn apply(&self, batch: LedgerBatch) -> Result<(), LedgerError> {
        if batch.is_empty() {
            return Ok(());
        }

        // The unit guard carries no data, so a poisoned lock is still usable.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let cf = self.entries()?;
        let writes = batch.resolve(|key| Ok(self.db.get_cf(cf, key.as_bytes())?))?;

        let mut wb = WriteBatch::default();
        for (key, payload) in &writes {
            wb.put_cf(cf, key.as_bytes(), payload);
        }
        self.db.write(wb)?;

        debug!("ledger committed {} writes", writes.len());
        Ok(())
    }
}
