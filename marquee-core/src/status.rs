//! Last-status record
//!
//! A small durable record capturing how often the device has booted and
//! why it last reset. Read and rewritten at boot, rewritten again when
//! the API requests a reboot. Not part of the store's consistency
//! domain; losing it costs a counter, nothing else.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::storage::{write_with_retry, RecordKey, RecordStore, StorageError};

/// Maximum reset-reason text length
pub const RESET_REASON_MAX: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LastStatus {
    pub reboot_count: u32,
    pub last_reset: String<RESET_REASON_MAX>,
}

impl Default for LastStatus {
    fn default() -> Self {
        Self {
            reboot_count: 0,
            last_reset: String::new(),
        }
    }
}

impl LastStatus {
    /// Read the record, bump the reboot counter, record this boot's
    /// reset reason, and write it back. Storage trouble degrades to an
    /// in-memory record; the device still boots.
    pub fn boot_load<S: RecordStore>(store: &mut S, reset_reason: &str) -> Self {
        let mut buf = [0u8; 64];
        let mut status: LastStatus = match store.read(RecordKey::LastStatus, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len]).unwrap_or_default(),
            Err(_) => LastStatus::default(),
        };

        status.reboot_count = status.reboot_count.wrapping_add(1);
        status.last_reset.clear();
        for c in reset_reason.chars() {
            if status.last_reset.push(c).is_err() {
                break;
            }
        }

        let _ = status.persist(store);
        status
    }

    pub fn persist<S: RecordStore>(&self, store: &mut S) -> Result<(), StorageError> {
        let mut buf = [0u8; 64];
        let data =
            postcard::to_slice(self, &mut buf).map_err(|_| StorageError::BufferTooSmall)?;
        write_with_retry(store, RecordKey::LastStatus, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemStore;

    #[test]
    fn test_boot_increments_counter() {
        let mut store = MemStore::new();
        let first = LastStatus::boot_load(&mut store, "power-on");
        assert_eq!(first.reboot_count, 1);
        assert_eq!(first.last_reset.as_str(), "power-on");

        let second = LastStatus::boot_load(&mut store, "software");
        assert_eq!(second.reboot_count, 2);
        assert_eq!(second.last_reset.as_str(), "software");
    }

    #[test]
    fn test_over_long_reason_truncated() {
        let mut store = MemStore::new();
        let reason = "a very long reset reason text indeed";
        let status = LastStatus::boot_load(&mut store, reason);
        assert_eq!(status.last_reset.len(), RESET_REASON_MAX);
        assert!(reason.starts_with(status.last_reset.as_str()));
    }

    #[test]
    fn test_storage_failure_still_boots() {
        let mut store = MemStore::new();
        store.fail_after_writes(0);
        let status = LastStatus::boot_load(&mut store, "brown-out");
        assert_eq!(status.reboot_count, 1);
    }
}
