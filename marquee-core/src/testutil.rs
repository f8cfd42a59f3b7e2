//! In-memory record store for host tests, with write-fault injection.

use std::vec::Vec;

use crate::storage::{RecordKey, RecordStore, StorageError};
use crate::store::MessageText;

/// Record store backed by a plain table. `fail_after_writes(n)` makes
/// every write past the next `n` fail, which is how the tests simulate
/// interrupted batches and stuck flash.
pub struct MemStore {
    records: Vec<(RecordKey, Vec<u8>)>,
    writes_until_failure: Option<usize>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            writes_until_failure: None,
        }
    }

    pub fn fail_after_writes(&mut self, n: usize) {
        self.writes_until_failure = Some(n);
    }

    pub fn clear_failures(&mut self) {
        self.writes_until_failure = None;
    }

    pub fn contains(&self, key: RecordKey) -> bool {
        self.records.iter().any(|(k, _)| *k == key)
    }

    /// Chop a stored record down to `len` bytes, as a torn write would.
    pub fn truncate_record(&mut self, key: RecordKey, len: usize) {
        if let Some((_, data)) = self.records.iter_mut().find(|(k, _)| *k == key) {
            data.truncate(len);
        }
    }

    fn check_write_budget(&mut self) -> Result<(), StorageError> {
        match self.writes_until_failure {
            Some(0) => Err(StorageError::Io),
            Some(ref mut n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl RecordStore for MemStore {
    fn read(&mut self, key: RecordKey, buf: &mut [u8]) -> Result<usize, StorageError> {
        let (_, data) = self
            .records
            .iter()
            .find(|(k, _)| *k == key)
            .ok_or(StorageError::NotFound)?;
        if buf.len() < data.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, key: RecordKey, data: &[u8]) -> Result<(), StorageError> {
        self.check_write_budget()?;
        if let Some((_, existing)) = self.records.iter_mut().find(|(k, _)| *k == key) {
            existing.clear();
            existing.extend_from_slice(data);
        } else {
            self.records.push((key, data.to_vec()));
        }
        Ok(())
    }

    fn delete(&mut self, key: RecordKey) -> Result<(), StorageError> {
        let before = self.records.len();
        self.records.retain(|(k, _)| *k != key);
        if self.records.len() == before {
            Err(StorageError::NotFound)
        } else {
            Ok(())
        }
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        self.records.clear();
        Ok(())
    }
}

/// Shorthand for building bounded message text in tests.
pub fn text(s: &str) -> MessageText {
    let mut t = MessageText::new();
    t.push_str(s).unwrap();
    t
}
