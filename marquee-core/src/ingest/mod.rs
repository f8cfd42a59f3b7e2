//! External-data ingestion
//!
//! Policy and parsing for the two periodic feeds. The firmware owns the
//! transport (fetch bytes with a timeout); everything after the bytes
//! arrive happens here, synchronously, so the fold-into-store semantics
//! are testable on the host:
//!
//! - a transport or parse failure leaves the previous News collection
//!   untouched and does not advance any schedule bookkeeping beyond the
//!   attempt itself;
//! - the latest weather line is cached and re-injected as candidate 0
//!   of every news refresh, and freshens News id 0 in between.

pub mod filter;
pub mod newsapi;
pub mod weerlive;

pub use filter::FilterList;

use heapless::Vec;

use crate::settings::Settings;
use crate::storage::RecordStore;
use crate::store::{Collection, MessageStore, MessageText, StoreError, MAX_NEWS_MESSAGES};

/// Fetch timeout; a non-responding feed must not starve the tick loop.
pub const FETCH_TIMEOUT_MS: u32 = 10_000;

/// Errors from folding a fetched payload into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngestError {
    /// Body did not look like the feed (previous content kept)
    ParseFailure,
    /// Store-level failure applying the refresh
    Store(StoreError),
}

/// Interval schedule for one feed.
///
/// An attempt is granted whenever the interval has elapsed since the
/// previous attempt, successful or not: the interval itself is the
/// retry policy, and a failure never pushes the next attempt further
/// out than one interval.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshTimer {
    next_due_ms: Option<u32>,
}

impl RefreshTimer {
    pub const fn new() -> Self {
        Self { next_due_ms: None }
    }

    /// Returns true (and schedules the next attempt) when an attempt is
    /// due. The first call is always due.
    pub fn poll(&mut self, now_ms: u32, interval_ms: u32) -> bool {
        let due = match self.next_due_ms {
            None => true,
            Some(at) => now_ms.wrapping_sub(at) < u32::MAX / 2,
        };
        if due {
            self.next_due_ms = Some(now_ms.wrapping_add(interval_ms));
        }
        due
    }
}

/// Ingestion coordinator: schedules, filter, cached weather.
#[derive(Debug, Default)]
pub struct Ingest {
    pub news_timer: RefreshTimer,
    pub weather_timer: RefreshTimer,
    pub filter: FilterList,
    weather: Option<MessageText>,
}

impl Ingest {
    pub fn load<S: RecordStore>(store: &mut S) -> Self {
        Self {
            news_timer: RefreshTimer::new(),
            weather_timer: RefreshTimer::new(),
            filter: FilterList::load(store),
            weather: None,
        }
    }

    /// The weather line currently folded into the news rotation.
    pub fn weather(&self) -> Option<&MessageText> {
        self.weather.as_ref()
    }

    /// Fold a news feed response into the store, replacing the News
    /// collection wholesale.
    pub fn apply_news<S: RecordStore>(
        &mut self,
        store: &mut S,
        messages: &mut MessageStore,
        settings: &Settings,
        body: &str,
        epoch_s: Option<u32>,
    ) -> Result<usize, IngestError> {
        let max = settings.news_max_msg as usize;
        let titles = newsapi::collect_titles(body, max, &self.filter)
            .map_err(|_| IngestError::ParseFailure)?;

        let mut batch: Vec<MessageText, MAX_NEWS_MESSAGES> = Vec::new();
        if let Some(weather) = &self.weather {
            let _ = batch.push(weather.clone());
        }
        for title in titles {
            if batch.len() >= max.min(MAX_NEWS_MESSAGES) {
                break;
            }
            let _ = batch.push(title);
        }

        messages
            .replace_all_news(store, &batch, epoch_s, max)
            .map_err(IngestError::Store)
    }

    /// Fold a weather feed response in as News id 0.
    pub fn apply_weather<S: RecordStore>(
        &mut self,
        store: &mut S,
        messages: &mut MessageStore,
        settings: &Settings,
        body: &str,
        epoch_s: Option<u32>,
    ) -> Result<(), IngestError> {
        let line = weerlive::summary(body).map_err(|_| IngestError::ParseFailure)?;
        self.weather = Some(line.clone());
        messages
            .put(
                store,
                Collection::News,
                0,
                &line,
                epoch_s,
                settings.news_max_msg as usize,
            )
            .map_err(IngestError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemStore;

    const NEWS_BODY: &str = r#"{"status":"ok","articles":[
        {"title":"Alpha"},{"title":"Beta"},{"title":"Gamma"}]}"#;
    const WEATHER_BODY: &str = r#"{"liveweer":[{"samenv":"Bewolkt","temp":"9.1"}]}"#;

    #[test]
    fn test_refresh_timer_first_poll_due() {
        let mut t = RefreshTimer::new();
        assert!(t.poll(1_000, 60_000));
        assert!(!t.poll(30_000, 60_000));
        assert!(t.poll(61_000, 60_000));
    }

    #[test]
    fn test_refresh_timer_failure_does_not_suppress() {
        let mut t = RefreshTimer::new();
        assert!(t.poll(0, 60_000));
        // Caller's attempt failed; nothing else is recorded, and the
        // next attempt is exactly one interval out.
        assert!(!t.poll(59_999, 60_000));
        assert!(t.poll(60_000, 60_000));
    }

    #[test]
    fn test_news_refresh_replaces_collection() {
        let mut store = MemStore::new();
        let mut messages = MessageStore::new();
        let settings = Settings::default();
        let mut ingest = Ingest::load(&mut store);

        let n = ingest
            .apply_news(&mut store, &mut messages, &settings, NEWS_BODY, Some(5))
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(messages.count(Collection::News), 3);
        assert_eq!(messages.get(Collection::News, 0).unwrap().text.as_str(), "Alpha");
        assert_eq!(messages.get(Collection::News, 0).unwrap().fetched_at, Some(5));
    }

    #[test]
    fn test_parse_failure_keeps_previous_news() {
        let mut store = MemStore::new();
        let mut messages = MessageStore::new();
        let settings = Settings::default();
        let mut ingest = Ingest::load(&mut store);

        ingest
            .apply_news(&mut store, &mut messages, &settings, NEWS_BODY, None)
            .unwrap();
        let err = ingest
            .apply_news(&mut store, &mut messages, &settings, "<html>503</html>", None)
            .unwrap_err();
        assert_eq!(err, IngestError::ParseFailure);
        assert_eq!(messages.count(Collection::News), 3);
        assert_eq!(messages.get(Collection::News, 0).unwrap().text.as_str(), "Alpha");
    }

    #[test]
    fn test_weather_takes_slot_zero_and_survives_refresh() {
        let mut store = MemStore::new();
        let mut messages = MessageStore::new();
        let settings = Settings::default();
        let mut ingest = Ingest::load(&mut store);

        ingest
            .apply_weather(&mut store, &mut messages, &settings, WEATHER_BODY, Some(1))
            .unwrap();
        assert_eq!(
            messages.get(Collection::News, 0).unwrap().text.as_str(),
            "Bewolkt, 9.1\u{b0}C"
        );

        ingest
            .apply_news(&mut store, &mut messages, &settings, NEWS_BODY, Some(2))
            .unwrap();
        assert_eq!(
            messages.get(Collection::News, 0).unwrap().text.as_str(),
            "Bewolkt, 9.1\u{b0}C"
        );
        assert_eq!(messages.get(Collection::News, 1).unwrap().text.as_str(), "Alpha");
        assert_eq!(messages.count(Collection::News), 4);
    }

    #[test]
    fn test_news_capacity_respects_setting() {
        let mut store = MemStore::new();
        let mut messages = MessageStore::new();
        let mut settings = Settings::default();
        settings.set("newsMaxMsg", "2").unwrap();
        let mut ingest = Ingest::load(&mut store);

        let n = ingest
            .apply_news(&mut store, &mut messages, &settings, NEWS_BODY, None)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(messages.count(Collection::News), 2);
    }
}
