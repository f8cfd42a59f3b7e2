//! Ambient-light sampling
//!
//! Reads the LDR divider on an ADC pin and publishes the reading,
//! scaled to the 0..=1023 range the intensity mapping expects. The
//! C3's ADC is 12-bit, so readings are shifted down two bits.

use defmt::*;
use embassy_time::{Duration, Ticker};
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::peripherals::{ADC1, GPIO2};
use esp_hal::Blocking;
use portable_atomic::Ordering;

use crate::channels::LIGHT_RAW;

const SAMPLE_PERIOD_MS: u64 = 2000;

#[embassy_executor::task]
pub async fn light_task(
    mut adc: Adc<'static, ADC1<'static>, Blocking>,
    mut pin: AdcPin<GPIO2<'static>, ADC1<'static>>,
) {
    info!("Light sampling task started");

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS));
    loop {
        ticker.next().await;
        let raw = adc.read_blocking(&mut pin);
        LIGHT_RAW.store((raw >> 2).min(1023), Ordering::Relaxed);
    }
}
