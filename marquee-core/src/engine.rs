//! The engine context
//!
//! One explicit object owning all process-wide state: settings, the two
//! message collections, the rotation scheduler, the ingestion
//! coordinator, and the last-status record. The process root constructs
//! it at boot and passes it by reference to whatever drives it (API
//! handlers, tick task, ingestion tasks); no component reaches into
//! ambient globals.

use crate::ingest::Ingest;
use crate::settings::Settings;
use crate::status::LastStatus;
use crate::storage::{RecordStore, StorageError};
use crate::store::MessageStore;
use crate::ticker::{intensity_from_light, TickAction, Ticker};

pub struct Engine {
    pub settings: Settings,
    pub messages: MessageStore,
    pub ticker: Ticker,
    pub ingest: Ingest,
    pub status: LastStatus,
    pub fw_version: &'static str,
}

impl Engine {
    /// Load everything from storage. Each piece degrades independently:
    /// missing or corrupt records become defaults, and the device always
    /// comes up.
    pub fn boot<S: RecordStore>(
        store: &mut S,
        fw_version: &'static str,
        reset_reason: &str,
    ) -> Self {
        Self {
            settings: Settings::load(store),
            messages: MessageStore::load(store),
            ticker: Ticker::new(),
            ingest: Ingest::load(store),
            status: LastStatus::boot_load(store, reset_reason),
            fw_version,
        }
    }

    /// One scheduler tick. Returns a panel action when the rotation
    /// advances or runs dry.
    pub fn tick(&mut self, now_ms: u32) -> Option<TickAction<'_>> {
        self.ticker.tick(now_ms, &self.settings, &self.messages)
    }

    /// Panel intensity for the given ambient-light reading.
    pub fn intensity(&self, light_raw: u16) -> u8 {
        intensity_from_light(light_raw, &self.settings)
    }

    /// Filesystem format: erase storage and reinitialize defaults.
    pub fn format<S: RecordStore>(&mut self, store: &mut S) -> Result<(), StorageError> {
        store.erase_all()?;
        self.settings = Settings::default();
        self.messages.reset();
        self.ticker = Ticker::new();
        self.ingest = Ingest::default();
        self.status = LastStatus::default();
        self.settings.persist(store)?;
        self.status.persist(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;
    use crate::testutil::MemStore;
    use crate::ticker::TickAction;

    #[test]
    fn test_boot_from_empty_storage() {
        let mut store = MemStore::new();
        let engine = Engine::boot(&mut store, "v1.0.0", "power-on");
        assert_eq!(engine.settings, Settings::default());
        assert_eq!(engine.messages.count(Collection::Local), 0);
        assert_eq!(engine.status.reboot_count, 1);
    }

    #[test]
    fn test_state_survives_reboot() {
        let mut store = MemStore::new();
        {
            let mut engine = Engine::boot(&mut store, "v1.0.0", "power-on");
            engine.settings.set("textSpeed", "40").unwrap();
            engine.settings.persist(&mut store).unwrap();
            engine
                .messages
                .put(&mut store, Collection::Local, 0, "persisted", None, 10)
                .unwrap();
        }

        let engine = Engine::boot(&mut store, "v1.0.0", "software");
        assert_eq!(engine.settings.text_speed, 40);
        assert_eq!(
            engine.messages.get(Collection::Local, 0).unwrap().text.as_str(),
            "persisted"
        );
        assert_eq!(engine.status.reboot_count, 2);
    }

    #[test]
    fn test_format_wipes_everything() {
        let mut store = MemStore::new();
        let mut engine = Engine::boot(&mut store, "v1.0.0", "power-on");
        engine
            .messages
            .put(&mut store, Collection::Local, 0, "gone soon", None, 10)
            .unwrap();
        engine.settings.set("textSpeed", "12").unwrap();

        engine.format(&mut store).unwrap();
        assert_eq!(engine.settings, Settings::default());
        assert_eq!(engine.messages.count(Collection::Local), 0);

        let reloaded = Engine::boot(&mut store, "v1.0.0", "software");
        assert_eq!(reloaded.messages.count(Collection::Local), 0);
        assert_eq!(reloaded.settings, Settings::default());
    }

    #[test]
    fn test_write_visible_to_next_tick() {
        let mut store = MemStore::new();
        let mut engine = Engine::boot(&mut store, "v1.0.0", "power-on");
        assert!(engine.tick(0).is_none());

        engine
            .messages
            .put(&mut store, Collection::Local, 0, "now showing", None, 10)
            .unwrap();
        match engine.tick(1) {
            Some(TickAction::Show { text, .. }) => assert_eq!(text, "now showing"),
            other => panic!("expected Show, got {:?}", other),
        }
    }
}
