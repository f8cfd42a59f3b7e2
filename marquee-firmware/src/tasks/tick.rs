//! Scheduler tick task
//!
//! Drives the rotation on a short period and derives panel intensity
//! from the ambient-light reading. The engine lock is held only for the
//! synchronous tick; link commands are sent after it is released.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};
use heapless::String;
use portable_atomic::Ordering;

use marquee_core::ticker::TickAction;
use marquee_protocol::{LinkCommand, LINK_TEXT_MAX};

use crate::channels::{SharedCell, LIGHT_RAW, LINK_CHANNEL};

/// Rotation/brightness evaluation period
pub const TICK_INTERVAL_MS: u64 = 250;

#[embassy_executor::task]
pub async fn tick_task(shared: &'static SharedCell) {
    info!("Tick task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let mut last_intensity: Option<u8> = None;

    loop {
        ticker.next().await;
        let now_ms = Instant::now().as_millis() as u32;
        let light = LIGHT_RAW.load(Ordering::Relaxed);

        let (intensity, command) = {
            let mut guard = shared.lock().await;
            let intensity = guard.engine.intensity(light);
            let command = guard.engine.tick(now_ms).map(|action| match action {
                TickAction::Show { text, speed } => {
                    let mut owned: String<LINK_TEXT_MAX> = String::new();
                    // Stored text is never longer than the link bound.
                    let _ = owned.push_str(text);
                    LinkCommand::ShowText { speed, text: owned }
                }
                TickAction::Blank => LinkCommand::Clear,
            });
            (intensity, command)
        };

        if last_intensity != Some(intensity) {
            last_intensity = Some(intensity);
            LINK_CHANNEL.send(LinkCommand::SetIntensity(intensity)).await;
        }
        if let Some(command) = command {
            if let LinkCommand::ShowText { ref text, .. } = command {
                debug!("Showing {} bytes", text.len());
            }
            LINK_CHANNEL.send(command).await;
        }
    }
}
