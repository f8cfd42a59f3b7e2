//! Durable record-store abstraction
//!
//! The engine persists everything as small keyed records so the storage
//! medium (a wear-leveled flash map in the firmware, an in-memory table
//! in tests) stays swappable. Keys are stable two-byte values; the
//! implementation is expected to make each `write` atomic with respect
//! to the record's previous content (CRC-checked append storage gives
//! this for free).

/// Largest record the engine ever reads or writes: a news message plus
/// its serialization framing.
pub const RECORD_BUF: usize = 640;

/// Write attempts before a durable failure is surfaced. A stuck flash
/// must not hang the tick loop; after this many attempts the engine
/// keeps operating on its in-memory copy.
pub const WRITE_RETRIES: usize = 3;

/// Keys for every record the engine owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordKey {
    /// Settings as `name=value` lines
    Settings,
    /// Reboot counter and last reset reason
    LastStatus,
    /// News admission filter words
    FilterWords,
    /// Committed news generation marker
    NewsMeta,
    /// One local message
    Local(u8),
    /// One news message of the given generation parity
    News { id: u8, parity: u8 },
}

impl RecordKey {
    /// Stable two-byte wire form.
    pub fn encode(self) -> [u8; 2] {
        match self {
            RecordKey::Settings => [0x00, 0],
            RecordKey::LastStatus => [0x01, 0],
            RecordKey::FilterWords => [0x02, 0],
            RecordKey::NewsMeta => [0x03, 0],
            RecordKey::Local(id) => [0x10, id],
            RecordKey::News { id, parity } => [0x20 | (parity & 1), id],
        }
    }

    pub fn decode(bytes: [u8; 2]) -> Option<Self> {
        match bytes {
            [0x00, 0] => Some(RecordKey::Settings),
            [0x01, 0] => Some(RecordKey::LastStatus),
            [0x02, 0] => Some(RecordKey::FilterWords),
            [0x03, 0] => Some(RecordKey::NewsMeta),
            [0x10, id] => Some(RecordKey::Local(id)),
            [tag, id] if tag & 0xfe == 0x20 => Some(RecordKey::News {
                id,
                parity: tag & 1,
            }),
            _ => None,
        }
    }
}

/// Errors from the storage medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No record under this key
    NotFound,
    /// Record present but failed its integrity check
    Corrupted,
    /// Medium out of space
    Full,
    /// Caller buffer too small for the stored record
    BufferTooSmall,
    /// Underlying medium fault
    Io,
}

/// Keyed record storage.
///
/// `delete` of an absent key is not an error at this layer; the message
/// store distinguishes caller-visible delete-of-missing itself.
pub trait RecordStore {
    /// Read the record into `buf`, returning its length.
    fn read(&mut self, key: RecordKey, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Create or replace the record.
    fn write(&mut self, key: RecordKey, data: &[u8]) -> Result<(), StorageError>;

    /// Remove the record if present.
    fn delete(&mut self, key: RecordKey) -> Result<(), StorageError>;

    /// Erase every record (filesystem format).
    fn erase_all(&mut self) -> Result<(), StorageError>;
}

/// Write with the bounded retry policy.
pub fn write_with_retry<S: RecordStore>(
    store: &mut S,
    key: RecordKey,
    data: &[u8],
) -> Result<(), StorageError> {
    let mut last = StorageError::Io;
    for _ in 0..WRITE_RETRIES {
        match store.write(key, data) {
            Ok(()) => return Ok(()),
            Err(e) => last = e,
        }
    }
    Err(last)
}

// Key impl for sequential-storage's map, kept here with the key type so
// the firmware crate does not hit the orphan rule.
#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for RecordKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        if buffer.len() < 2 {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        buffer[..2].copy_from_slice(&self.encode());
        Ok(2)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        if buffer.len() < 2 {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        match RecordKey::decode([buffer[0], buffer[1]]) {
            Some(key) => Ok((key, 2)),
            None => Err(sequential_storage::map::SerializationError::InvalidFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        let keys = [
            RecordKey::Settings,
            RecordKey::LastStatus,
            RecordKey::FilterWords,
            RecordKey::NewsMeta,
            RecordKey::Local(0),
            RecordKey::Local(24),
            RecordKey::News { id: 3, parity: 0 },
            RecordKey::News { id: 19, parity: 1 },
        ];
        for key in keys {
            assert_eq!(RecordKey::decode(key.encode()), Some(key));
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert_eq!(RecordKey::decode([0x7f, 0]), None);
        assert_eq!(RecordKey::decode([0x00, 1]), None);
    }
}
