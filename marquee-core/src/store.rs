//! Message store
//!
//! Two bounded collections of displayable messages: operator-authored
//! Local messages and machine-authored News messages. Each message is
//! one durable record keyed by `(collection, id)`; the in-memory copy
//! is the reader's view and is only mutated after the durable write has
//! been attempted, so API handlers respond only once persistence is
//! settled.
//!
//! News refresh uses generation-parity keys: a `replace_all_news` batch
//! writes the incoming messages under the opposite parity and commits
//! by rewriting the meta record last. A crash anywhere before the meta
//! write reloads as the complete previous generation; readers in the
//! running process only ever see the old list or the new list.

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::storage::{write_with_retry, RecordKey, RecordStore, StorageError, RECORD_BUF};

/// Hard ceiling on local messages, independent of the operator setting
pub const MAX_LOCAL_MESSAGES: usize = 25;

/// Hard ceiling on news messages, independent of the operator setting
pub const MAX_NEWS_MESSAGES: usize = 20;

/// Longest operator-authored message text (bytes)
pub const LOCAL_TEXT_MAX: usize = 255;

/// Longest ingested news text (bytes)
pub const NEWS_TEXT_MAX: usize = 512;

/// Message body storage, sized for the larger collection
pub type MessageText = String<NEWS_TEXT_MAX>;

/// The two message collections, in rotation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Collection {
    Local,
    News,
}

impl Collection {
    /// Byte bound on message text in this collection.
    pub fn text_max(self) -> usize {
        match self {
            Collection::Local => LOCAL_TEXT_MAX,
            Collection::News => NEWS_TEXT_MAX,
        }
    }
}

/// One displayable message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    pub id: u8,
    pub text: MessageText,
    /// Ingestion time (epoch seconds), news only
    pub fetched_at: Option<u32>,
}

/// Durable form of one message.
#[derive(Serialize, Deserialize)]
struct MessageRecord<'a> {
    text: &'a str,
    fetched_at: Option<u32>,
}

/// Durable news commit marker.
#[derive(Serialize, Deserialize)]
struct NewsMeta {
    generation: u32,
    count: u8,
}

/// Errors from message-store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// No message under this `(collection, id)`
    NotFound,
    /// Collection already holds its configured maximum
    CapacityExceeded,
    /// Text exceeds the collection's byte bound
    TextTooLong,
    /// Durable write failed after retries; the in-memory state was
    /// still updated and the store runs degraded until reboot
    StorageFailure,
}

/// Bounded Local + News collections with write-through persistence.
#[derive(Debug)]
pub struct MessageStore {
    local: Vec<Message, MAX_LOCAL_MESSAGES>,
    news: Vec<Message, MAX_NEWS_MESSAGES>,
    news_generation: u32,
    degraded: bool,
}

impl MessageStore {
    /// Empty store (first boot, or after a format).
    pub fn new() -> Self {
        Self {
            local: Vec::new(),
            news: Vec::new(),
            news_generation: 0,
            degraded: false,
        }
    }

    /// Load both collections from storage.
    ///
    /// Unreadable or oversized records are skipped: a crash mid-write
    /// must never surface a truncated message to a caller. News records
    /// are only admitted from the committed generation parity.
    pub fn load<S: RecordStore>(store: &mut S) -> Self {
        let mut ms = Self::new();
        let mut buf = [0u8; RECORD_BUF];

        for id in 0..MAX_LOCAL_MESSAGES as u8 {
            if let Some(msg) = read_message(store, RecordKey::Local(id), id, LOCAL_TEXT_MAX, &mut buf)
            {
                // Capacity equals the id range, so this cannot overflow.
                let _ = ms.local.push(msg);
            }
        }

        if let Ok(len) = store.read(RecordKey::NewsMeta, &mut buf) {
            if let Ok(meta) = postcard::from_bytes::<NewsMeta>(&buf[..len]) {
                ms.news_generation = meta.generation;
                let parity = (meta.generation & 1) as u8;
                for id in 0..MAX_NEWS_MESSAGES as u8 {
                    if let Some(msg) = read_message(
                        store,
                        RecordKey::News { id, parity },
                        id,
                        NEWS_TEXT_MAX,
                        &mut buf,
                    ) {
                        let _ = ms.news.push(msg);
                    }
                }
            }
        }

        ms
    }

    /// Messages in ascending id order (the rotation order).
    pub fn list(&self, collection: Collection) -> &[Message] {
        match collection {
            Collection::Local => &self.local,
            Collection::News => &self.news,
        }
    }

    pub fn get(&self, collection: Collection, id: u8) -> Option<&Message> {
        self.list(collection).iter().find(|m| m.id == id)
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.list(collection).len()
    }

    /// True once any durable write has been given up on; the in-memory
    /// state is then ahead of flash until the next reboot.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Smallest id not in use, bounded by the configured maximum.
    pub fn allocate_id(&self, collection: Collection, max_count: usize) -> Result<u8, StoreError> {
        let cap = max_count.min(collection_cap(collection));
        for id in 0..cap as u8 {
            if self.get(collection, id).is_none() {
                return Ok(id);
            }
        }
        Err(StoreError::CapacityExceeded)
    }

    /// Create or overwrite one message.
    ///
    /// The durable write happens first; the in-memory copy is updated
    /// even when the write ultimately fails (degraded mode), so the
    /// device keeps showing what the caller asked for.
    pub fn put<S: RecordStore>(
        &mut self,
        store: &mut S,
        collection: Collection,
        id: u8,
        text: &str,
        fetched_at: Option<u32>,
        max_count: usize,
    ) -> Result<(), StoreError> {
        if text.len() > collection.text_max() {
            return Err(StoreError::TextTooLong);
        }
        if id as usize >= collection_cap(collection) {
            return Err(StoreError::CapacityExceeded);
        }
        let is_new = self.get(collection, id).is_none();
        if is_new && self.count(collection) >= max_count.min(collection_cap(collection)) {
            return Err(StoreError::CapacityExceeded);
        }

        let key = self.message_key(collection, id);
        let write_result = self.write_message(store, key, text, fetched_at);

        let mut message = Message {
            id,
            text: MessageText::new(),
            fetched_at,
        };
        // Length was checked against NEWS_TEXT_MAX or tighter above.
        let _ = message.text.push_str(text);
        self.insert(collection, message);

        write_result.map_err(|_| {
            self.degraded = true;
            StoreError::StorageFailure
        })
    }

    /// Delete one message. Deleting an absent id is an explicit error:
    /// it tells the caller their view of the store is stale.
    pub fn delete<S: RecordStore>(
        &mut self,
        store: &mut S,
        collection: Collection,
        id: u8,
    ) -> Result<(), StoreError> {
        if self.get(collection, id).is_none() {
            return Err(StoreError::NotFound);
        }

        let key = self.message_key(collection, id);
        let result = match store.delete(key) {
            Ok(()) | Err(StorageError::NotFound) => Ok(()),
            Err(_) => Err(StoreError::StorageFailure),
        };

        match collection {
            Collection::Local => self.local.retain(|m| m.id != id),
            Collection::News => self.news.retain(|m| m.id != id),
        }

        if result.is_err() {
            self.degraded = true;
        }
        result
    }

    /// Replace the entire News collection with `batch` as one unit of
    /// work. Candidates are re-validated; too-long or surplus entries
    /// are dropped rather than admitted.
    ///
    /// Readers never observe an intermediate state: the in-memory list
    /// is swapped once, after all durable writes have been attempted.
    pub fn replace_all_news<S: RecordStore>(
        &mut self,
        store: &mut S,
        batch: &[MessageText],
        fetched_at: Option<u32>,
        max_count: usize,
    ) -> Result<usize, StoreError> {
        let next_gen = self.news_generation.wrapping_add(1);
        let parity = (next_gen & 1) as u8;
        let old_parity = (self.news_generation & 1) as u8;
        let cap = max_count.min(MAX_NEWS_MESSAGES);

        let mut admitted: Vec<&MessageText, MAX_NEWS_MESSAGES> = Vec::new();
        for text in batch {
            if admitted.len() >= cap {
                break;
            }
            if text.is_empty() || text.len() > NEWS_TEXT_MAX {
                continue;
            }
            if admitted.iter().any(|t| t.as_str() == text.as_str()) {
                continue;
            }
            let _ = admitted.push(text);
        }

        let mut storage_ok = true;
        for (id, text) in admitted.iter().enumerate() {
            let key = RecordKey::News {
                id: id as u8,
                parity,
            };
            if self.write_message(store, key, text, fetched_at).is_err() {
                storage_ok = false;
                break;
            }
        }

        if storage_ok {
            let meta = NewsMeta {
                generation: next_gen,
                count: admitted.len() as u8,
            };
            let mut buf = [0u8; 16];
            storage_ok = postcard::to_slice(&meta, &mut buf)
                .map_err(|_| StorageError::BufferTooSmall)
                .and_then(|data| write_with_retry(store, RecordKey::NewsMeta, data))
                .is_ok();
        }

        if storage_ok {
            // Committed; the stale parity is dead weight now.
            for id in 0..MAX_NEWS_MESSAGES as u8 {
                let _ = store.delete(RecordKey::News {
                    id,
                    parity: old_parity,
                });
            }
        }

        // The reader-visible swap, a single step.
        self.news.clear();
        for (id, text) in admitted.iter().enumerate() {
            let _ = self.news.push(Message {
                id: id as u8,
                text: (*text).clone(),
                fetched_at,
            });
        }
        self.news_generation = next_gen;

        if storage_ok {
            Ok(self.news.len())
        } else {
            self.degraded = true;
            Err(StoreError::StorageFailure)
        }
    }

    /// Drop all in-memory state (used after a filesystem format).
    pub fn reset(&mut self) {
        self.local.clear();
        self.news.clear();
        self.news_generation = 0;
        self.degraded = false;
    }

    /// First message in rotation order, Local before News.
    pub fn first(&self) -> Option<(Collection, u8)> {
        self.local
            .first()
            .map(|m| (Collection::Local, m.id))
            .or_else(|| self.news.first().map(|m| (Collection::News, m.id)))
    }

    /// Next entry after `(collection, id)` in rotation order, wrapping
    /// to the front. The current entry does not need to exist, which is
    /// what lets the scheduler skip concurrently deleted messages.
    pub fn next_after(&self, collection: Collection, id: u8) -> Option<(Collection, u8)> {
        let after = |msgs: &[Message], id: u8| {
            msgs.iter()
                .map(|m| m.id)
                .find(|&candidate| candidate > id)
        };

        match collection {
            Collection::Local => after(&self.local, id)
                .map(|id| (Collection::Local, id))
                .or_else(|| self.news.first().map(|m| (Collection::News, m.id)))
                .or_else(|| self.first()),
            Collection::News => after(&self.news, id)
                .map(|id| (Collection::News, id))
                .or_else(|| self.first()),
        }
    }

    fn message_key(&self, collection: Collection, id: u8) -> RecordKey {
        match collection {
            Collection::Local => RecordKey::Local(id),
            Collection::News => RecordKey::News {
                id,
                parity: (self.news_generation & 1) as u8,
            },
        }
    }

    fn write_message<S: RecordStore>(
        &self,
        store: &mut S,
        key: RecordKey,
        text: &str,
        fetched_at: Option<u32>,
    ) -> Result<(), StorageError> {
        let record = MessageRecord { text, fetched_at };
        let mut buf = [0u8; RECORD_BUF];
        let data =
            postcard::to_slice(&record, &mut buf).map_err(|_| StorageError::BufferTooSmall)?;
        write_with_retry(store, key, data)
    }

    fn insert(&mut self, collection: Collection, message: Message) {
        match collection {
            Collection::Local => insert_sorted(&mut self.local, message),
            Collection::News => insert_sorted(&mut self.news, message),
        }
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

fn collection_cap(collection: Collection) -> usize {
    match collection {
        Collection::Local => MAX_LOCAL_MESSAGES,
        Collection::News => MAX_NEWS_MESSAGES,
    }
}

fn insert_sorted<const N: usize>(msgs: &mut Vec<Message, N>, message: Message) {
    if let Some(existing) = msgs.iter_mut().find(|m| m.id == message.id) {
        *existing = message;
        return;
    }
    let pos = msgs
        .iter()
        .position(|m| m.id > message.id)
        .unwrap_or(msgs.len());
    // Callers enforce capacity before insertion.
    let _ = msgs.insert(pos, message);
}

fn read_message<S: RecordStore>(
    store: &mut S,
    key: RecordKey,
    id: u8,
    text_max: usize,
    buf: &mut [u8],
) -> Option<Message> {
    let len = store.read(key, buf).ok()?;
    let record = postcard::from_bytes::<MessageRecord>(&buf[..len]).ok()?;
    if record.text.is_empty() || record.text.len() > text_max {
        return None;
    }
    let mut text = MessageText::new();
    text.push_str(record.text).ok()?;
    Some(Message {
        id,
        text,
        fetched_at: record.fetched_at,
    })
}
