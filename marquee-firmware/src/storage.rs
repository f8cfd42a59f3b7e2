//! Flash record store
//!
//! Implements the engine's `RecordStore` on the chip flash through
//! sequential-storage's wear-leveled, CRC-checked map. Items are
//! committed atomically by the map layer, which is what gives settings
//! and message records their never-torn property.
//!
//! Flash access on this chip is blocking; the async map API is driven
//! to completion inline, matching the engine's bounded-blocking storage
//! model.

use core::ops::Range;

use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_futures::block_on;
use esp_storage::FlashStorage;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use marquee_core::storage::{RecordKey, RecordStore, StorageError};

/// Flash range reserved for the record map: the last 256KB of the 4MB
/// part, clear of the application image and its OTA slot.
pub const STORE_RANGE: Range<u32> = 0x3C_0000..0x40_0000;

/// Scratch buffer for map item (de)serialization
const DATA_BUF: usize = 1024;

pub struct FlashStore {
    flash: BlockingAsync<FlashStorage>,
}

impl FlashStore {
    pub fn new() -> Self {
        Self {
            flash: BlockingAsync::new(FlashStorage::new()),
        }
    }
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::new()
    }
}

fn map_error(e: sequential_storage::Error<esp_storage::FlashStorageError>) -> StorageError {
    match e {
        sequential_storage::Error::FullStorage => StorageError::Full,
        sequential_storage::Error::Corrupted { .. } => StorageError::Corrupted,
        sequential_storage::Error::BufferTooSmall(_) => StorageError::BufferTooSmall,
        _ => StorageError::Io,
    }
}

impl RecordStore for FlashStore {
    fn read(&mut self, key: RecordKey, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut data_buffer = [0u8; DATA_BUF];
        let fetched = block_on(map::fetch_item::<RecordKey, &[u8], _>(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        ))
        .map_err(map_error)?;

        match fetched {
            Some(data) => {
                if buf.len() < data.len() {
                    return Err(StorageError::BufferTooSmall);
                }
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, key: RecordKey, data: &[u8]) -> Result<(), StorageError> {
        let mut data_buffer = [0u8; DATA_BUF];
        block_on(map::store_item(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        ))
        .map_err(map_error)
    }

    fn delete(&mut self, key: RecordKey) -> Result<(), StorageError> {
        let mut data_buffer = [0u8; DATA_BUF];
        block_on(map::remove_item(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        ))
        .map_err(map_error)
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        block_on(sequential_storage::erase_all(&mut self.flash, STORE_RANGE))
            .map_err(map_error)
    }
}
