//! Rotation scheduler
//!
//! Decides what the panel shows and when to advance: the logical
//! concatenation `Local ++ News` in ascending id order, wrapping. The
//! scheduler is a read-only consumer of the stores and emits commands
//! instead of touching hardware; brightness is derived separately from
//! the ambient-light reading.

use crate::settings::Settings;
use crate::store::{Collection, MessageStore};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum TickerState {
    /// Both collections empty; panel blanked
    Idle,
    /// A message is on the panel
    Showing {
        collection: Collection,
        id: u8,
        since_ms: u32,
        duration_ms: u32,
    },
}

/// What a tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction<'a> {
    /// Put this text on the panel
    Show { text: &'a str, speed: u8 },
    /// Nothing to show; blank the panel
    Blank,
}

/// The rotation scheduler. Drive with `tick(now)` on a short period;
/// each call returns an action only when the panel should change.
#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    state: TickerState,
}

impl Ticker {
    pub const fn new() -> Self {
        Self {
            state: TickerState::Idle,
        }
    }

    /// Advance the rotation if the current message has run its course
    /// or vanished. Deleted entries are skipped without error; an empty
    /// store blanks the panel and the next message to appear ends the
    /// idle state on the following tick.
    pub fn tick<'a>(
        &mut self,
        now_ms: u32,
        settings: &Settings,
        messages: &'a MessageStore,
    ) -> Option<TickAction<'a>> {
        match self.state {
            TickerState::Idle => match messages.first() {
                Some((collection, id)) => self.show(now_ms, settings, messages, collection, id),
                None => None,
            },
            TickerState::Showing {
                collection,
                id,
                since_ms,
                duration_ms,
            } => {
                let gone = messages.get(collection, id).is_none();
                let expired = now_ms.wrapping_sub(since_ms) >= duration_ms;
                if !gone && !expired {
                    return None;
                }
                match messages.next_after(collection, id) {
                    Some((next_collection, next_id)) => {
                        self.show(now_ms, settings, messages, next_collection, next_id)
                    }
                    None => {
                        self.state = TickerState::Idle;
                        Some(TickAction::Blank)
                    }
                }
            }
        }
    }

    fn show<'a>(
        &mut self,
        now_ms: u32,
        settings: &Settings,
        messages: &'a MessageStore,
        collection: Collection,
        id: u8,
    ) -> Option<TickAction<'a>> {
        // The entry was present a moment ago; if it vanished between
        // lookup and here the next tick will resolve it.
        let message = messages.get(collection, id)?;
        self.state = TickerState::Showing {
            collection,
            id,
            since_ms: now_ms,
            duration_ms: display_duration_ms(settings.text_speed, message.text.len()),
        };
        Some(TickAction::Show {
            text: &message.text,
            speed: settings.text_speed,
        })
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

/// How long a message stays on the panel: one full scroll pass. The
/// panel shifts one column per speed step, glyphs average six columns,
/// and the text has to clear the 64-column panel.
pub fn display_duration_ms(speed: u8, text_len: usize) -> u32 {
    let columns = text_len as u32 * 6 + 64;
    columns * speed.clamp(1, crate::settings::SPEED_MAX) as u32
}

/// Map an ambient-light reading into panel intensity.
///
/// Readings at or below `LDRlowOffset` give intensity 0, at or above
/// `LDRhighOffset` give `maxIntensity`, linear in between. Inverted or
/// degenerate offsets clamp rather than fail.
pub fn intensity_from_light(raw: u16, settings: &Settings) -> u8 {
    let low = settings.ldr_low_offset;
    let high = settings.ldr_high_offset;
    let max = settings.max_intensity;

    if high <= low {
        return if raw >= high { max } else { 0 };
    }
    let clamped = raw.clamp(low, high);
    let scaled = (clamped - low) as u32 * max as u32 / (high - low) as u32;
    scaled as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{text, MemStore};

    fn store_with(local: &[(u8, &str)], news: &[&str]) -> (MemStore, MessageStore) {
        let mut store = MemStore::new();
        let mut ms = MessageStore::new();
        for (id, body) in local {
            ms.put(&mut store, Collection::Local, *id, body, None, 25)
                .unwrap();
        }
        let batch: std::vec::Vec<_> = news.iter().map(|t| text(t)).collect();
        if !batch.is_empty() {
            ms.replace_all_news(&mut store, &batch, None, 20).unwrap();
        }
        (store, ms)
    }

    fn shown<'a>(action: Option<TickAction<'a>>) -> &'a str {
        match action {
            Some(TickAction::Show { text, .. }) => text,
            other => panic!("expected Show, got {:?}", other),
        }
    }

    #[test]
    fn test_rotation_visits_local_then_news_then_wraps() {
        let (_store, ms) = store_with(&[(0, "A"), (1, "B")], &["C"]);
        let settings = Settings::default();
        let mut ticker = Ticker::new();

        let mut now = 0u32;
        assert_eq!(shown(ticker.tick(now, &settings, &ms)), "A");
        for expected in ["B", "C", "A"] {
            now += display_duration_ms(settings.text_speed, 1);
            assert_eq!(shown(ticker.tick(now, &settings, &ms)), expected);
        }
    }

    #[test]
    fn test_no_action_while_message_running() {
        let (_store, ms) = store_with(&[(0, "A")], &[]);
        let settings = Settings::default();
        let mut ticker = Ticker::new();

        assert_eq!(shown(ticker.tick(0, &settings, &ms)), "A");
        assert_eq!(ticker.tick(10, &settings, &ms), None);
    }

    #[test]
    fn test_deleted_message_skipped_mid_rotation() {
        let (mut store, mut ms) = store_with(&[(0, "A"), (1, "B")], &["C"]);
        let settings = Settings::default();
        let mut ticker = Ticker::new();

        assert_eq!(shown(ticker.tick(0, &settings, &ms)), "A");
        ms.delete(&mut store, Collection::Local, 1).unwrap();
        let later = display_duration_ms(settings.text_speed, 1);
        assert_eq!(shown(ticker.tick(later, &settings, &ms)), "C");
    }

    #[test]
    fn test_current_message_vanishing_advances_immediately() {
        let (mut store, mut ms) = store_with(&[(0, "A"), (1, "B")], &[]);
        let settings = Settings::default();
        let mut ticker = Ticker::new();

        assert_eq!(shown(ticker.tick(0, &settings, &ms)), "A");
        ms.delete(&mut store, Collection::Local, 0).unwrap();
        // Well before the display duration elapsed.
        assert_eq!(shown(ticker.tick(5, &settings, &ms)), "B");
    }

    #[test]
    fn test_idle_on_empty_and_recovery() {
        let (mut store, mut ms) = store_with(&[(0, "A")], &[]);
        let settings = Settings::default();
        let mut ticker = Ticker::new();

        assert_eq!(shown(ticker.tick(0, &settings, &ms)), "A");
        ms.delete(&mut store, Collection::Local, 0).unwrap();
        assert_eq!(ticker.tick(1, &settings, &ms), Some(TickAction::Blank));
        assert_eq!(ticker.tick(2, &settings, &ms), None);

        ms.put(&mut store, Collection::Local, 0, "back", None, 10)
            .unwrap();
        assert_eq!(shown(ticker.tick(3, &settings, &ms)), "back");
    }

    #[test]
    fn test_empty_store_never_acts() {
        let (_store, ms) = store_with(&[], &[]);
        let settings = Settings::default();
        let mut ticker = Ticker::new();
        assert_eq!(ticker.tick(0, &settings, &ms), None);
    }

    #[test]
    fn test_intensity_mapping() {
        let mut settings = Settings::default();
        settings.set("LDRlowOffset", "100").unwrap();
        settings.set("LDRhighOffset", "900").unwrap();
        settings.set("maxIntensity", "15").unwrap();

        assert_eq!(intensity_from_light(0, &settings), 0);
        assert_eq!(intensity_from_light(100, &settings), 0);
        assert_eq!(intensity_from_light(900, &settings), 15);
        assert_eq!(intensity_from_light(1023, &settings), 15);
        let mid = intensity_from_light(500, &settings);
        assert!(mid > 0 && mid < 15, "mid reading maps inside the range");
    }

    #[test]
    fn test_intensity_degenerate_offsets_clamp() {
        let mut settings = Settings::default();
        settings.set("LDRlowOffset", "600").unwrap();
        settings.set("LDRhighOffset", "600").unwrap();
        assert_eq!(intensity_from_light(0, &settings), 0);
        assert_eq!(
            intensity_from_light(1023, &settings),
            settings.max_intensity
        );
    }

    #[test]
    fn test_duration_scales_with_speed_and_length() {
        assert!(display_duration_ms(25, 100) > display_duration_ms(25, 10));
        assert!(display_duration_ms(50, 10) > display_duration_ms(10, 10));
        // Degenerate speed still produces a positive duration.
        assert!(display_duration_ms(0, 0) > 0);
    }
}
