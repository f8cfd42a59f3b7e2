//! News admission filter
//!
//! A small list of blocked words; any candidate whose text contains one
//! (ASCII case-insensitive) is dropped during ingestion. The list lives
//! in its own storage record, seeded out of band; an absent or
//! unreadable record means an empty filter.

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::storage::{write_with_retry, RecordKey, RecordStore, StorageError, RECORD_BUF};

/// Maximum number of filter words
pub const MAX_FILTER_WORDS: usize = 20;

/// Maximum length of one filter word
pub const FILTER_WORD_MAX: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterList {
    words: Vec<String<FILTER_WORD_MAX>, MAX_FILTER_WORDS>,
}

impl FilterList {
    pub fn load<S: RecordStore>(store: &mut S) -> Self {
        let mut buf = [0u8; RECORD_BUF];
        match store.read(RecordKey::FilterWords, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len]).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn persist<S: RecordStore>(&self, store: &mut S) -> Result<(), StorageError> {
        let mut buf = [0u8; RECORD_BUF];
        let data =
            postcard::to_slice(self, &mut buf).map_err(|_| StorageError::BufferTooSmall)?;
        write_with_retry(store, RecordKey::FilterWords, data)
    }

    /// True when `text` contains any filter word, ignoring ASCII case.
    pub fn blocks(&self, text: &str) -> bool {
        self.words.iter().any(|word| {
            !word.is_empty()
                && text
                    .as_bytes()
                    .windows(word.len())
                    .any(|window| window.eq_ignore_ascii_case(word.as_bytes()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[cfg(test)]
    pub fn from_words(words: &[&str]) -> Self {
        let mut list = Self::default();
        for w in words {
            let mut word = String::new();
            word.push_str(w).unwrap();
            list.words.push(word).unwrap();
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemStore;

    #[test]
    fn test_blocks_case_insensitive() {
        let list = FilterList::from_words(&["murder", "crash"]);
        assert!(list.blocks("Plane CRASH near airport"));
        assert!(list.blocks("murder investigation"));
        assert!(!list.blocks("cash markets rally"));
    }

    #[test]
    fn test_empty_filter_blocks_nothing() {
        let list = FilterList::default();
        assert!(!list.blocks("anything at all"));
    }

    #[test]
    fn test_persist_load_round_trip() {
        let mut store = MemStore::new();
        let list = FilterList::from_words(&["spoiler"]);
        list.persist(&mut store).unwrap();
        assert_eq!(FilterList::load(&mut store), list);
    }

    #[test]
    fn test_missing_record_is_empty_filter() {
        let mut store = MemStore::new();
        assert!(FilterList::load(&mut store).is_empty());
    }
}
