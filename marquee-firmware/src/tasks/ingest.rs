//! Feed ingestion tasks
//!
//! One task per feed, each polling its interval timer and fetching with
//! the bounded HTTP client. The engine lock is NOT held during the
//! fetch; only the schedule check before it and the fold-in after it
//! take the lock, so a slow feed never blocks the API or the ticks.
//!
//! Failures of any kind leave the previous collection untouched and are
//! retried one interval later; the timer advances on the attempt, not
//! the outcome.

use defmt::*;
use embassy_net::Stack;
use embassy_time::{Duration, Instant, Timer};
use heapless::String;

use marquee_core::ingest::{newsapi, weerlive};

use crate::channels::{epoch_now, SharedCell};
use crate::fetch::http_get;

/// How often the interval timers are checked
const POLL_PERIOD_S: u64 = 10;

struct Attempt {
    path: String<160>,
}

#[embassy_executor::task]
pub async fn news_task(stack: Stack<'static>, shared: &'static SharedCell) {
    info!("News ingestion task started");

    loop {
        Timer::after(Duration::from_secs(POLL_PERIOD_S)).await;
        stack.wait_config_up().await;

        let now_ms = Instant::now().as_millis() as u32;
        let attempt = {
            let mut guard = shared.lock().await;
            let engine = &mut guard.engine;
            if engine.settings.news_auth_token.is_empty() {
                None
            } else {
                let interval_ms = engine.settings.news_interval_min as u32 * 60_000;
                if engine.ingest.news_timer.poll(now_ms, interval_ms) {
                    let mut path = String::new();
                    let _ = path.push_str(&newsapi::request_path(
                        &engine.settings.news_auth_token,
                        engine.settings.news_max_msg,
                    ));
                    Some(Attempt { path })
                } else {
                    None
                }
            }
        };

        let Some(attempt) = attempt else { continue };

        match http_get(stack, newsapi::NEWSAPI_HOST, &attempt.path).await {
            Ok(body) => {
                let mut guard = shared.lock().await;
                let shared_ref = &mut *guard;
                let uptime_s = Instant::now().as_secs() as u32;
                let result = shared_ref.engine.ingest.apply_news(
                    &mut shared_ref.store,
                    &mut shared_ref.engine.messages,
                    &shared_ref.engine.settings,
                    &body,
                    epoch_now(uptime_s),
                );
                match result {
                    Ok(count) => info!("News refresh: {} messages", count),
                    Err(e) => warn!("News refresh rejected: {:?}", e),
                }
            }
            Err(e) => warn!("News fetch failed: {:?}", e),
        }
    }
}

#[embassy_executor::task]
pub async fn weather_task(stack: Stack<'static>, shared: &'static SharedCell) {
    info!("Weather ingestion task started");

    loop {
        Timer::after(Duration::from_secs(POLL_PERIOD_S)).await;
        stack.wait_config_up().await;

        let now_ms = Instant::now().as_millis() as u32;
        let attempt = {
            let mut guard = shared.lock().await;
            let engine = &mut guard.engine;
            if engine.settings.weerlive_auth_token.is_empty() {
                None
            } else {
                let interval_ms = engine.settings.weerlive_interval_min as u32 * 60_000;
                if engine.ingest.weather_timer.poll(now_ms, interval_ms) {
                    let mut path = String::new();
                    let _ = path
                        .push_str(&weerlive::request_path(&engine.settings.weerlive_auth_token));
                    Some(Attempt { path })
                } else {
                    None
                }
            }
        };

        let Some(attempt) = attempt else { continue };

        match http_get(stack, weerlive::WEERLIVE_HOST, &attempt.path).await {
            Ok(body) => {
                let mut guard = shared.lock().await;
                let shared_ref = &mut *guard;
                let uptime_s = Instant::now().as_secs() as u32;
                let result = shared_ref.engine.ingest.apply_weather(
                    &mut shared_ref.store,
                    &mut shared_ref.engine.messages,
                    &shared_ref.engine.settings,
                    &body,
                    epoch_now(uptime_s),
                );
                match result {
                    Ok(()) => info!("Weather refreshed"),
                    Err(e) => warn!("Weather rejected: {:?}", e),
                }
            }
            Err(e) => warn!("Weather fetch failed: {:?}", e),
        }
    }
}
