//! Marquee - Network Scrolling-Display Firmware
//!
//! Main firmware binary for ESP32-C3 based ticker boards. Boots the
//! engine from flash, brings up Wi-Fi, and spawns the task set:
//! scheduler ticks, HTTP API workers, feed ingestion, time sync,
//! ambient-light sampling, and the panel link.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use esp_backtrace as _;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::reset_reason;
use esp_hal::system::Cpu;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_println as _;
use heapless::String;
use static_cell::StaticCell;

use marquee_core::engine::Engine;
use marquee_core::status::RESET_REASON_MAX;

use crate::channels::{Shared, SharedCell};
use crate::storage::FlashStore;

mod channels;
mod fetch;
mod net;
mod storage;
mod tasks;

/// Firmware version reported by the device-info endpoint
pub const FW_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

esp_bootloader_esp_idf::esp_app_desc!();

static SHARED: StaticCell<SharedCell> = StaticCell::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    info!("Marquee firmware {} starting", FW_VERSION);

    // Heap for transient HTTP/feed bodies; engine state is all static.
    esp_alloc::heap_allocator!(size: 96 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(
        timg0.timer0,
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT)
            .software_interrupt0,
    );

    // Boot the engine from flash before anything network-facing runs.
    let mut store = FlashStore::new();
    let reset_reason = reset_reason_text();
    let engine = Engine::boot(&mut store, FW_VERSION, &reset_reason);
    info!(
        "Engine up: boot #{}, {} local / {} news messages",
        engine.status.reboot_count,
        engine.messages.count(marquee_core::store::Collection::Local),
        engine.messages.count(marquee_core::store::Collection::News),
    );
    let shared: &'static SharedCell =
        SHARED.init(embassy_sync::mutex::Mutex::new(Shared { engine, store }));

    // Panel link UART.
    let uart = Uart::new(peripherals.UART1, UartConfig::default())
        .unwrap()
        .with_tx(peripherals.GPIO10)
        .into_async();
    let (_rx, tx) = uart.split();

    // LDR on GPIO2 / ADC1.
    let mut adc_config = AdcConfig::new();
    let adc_pin = adc_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    // Wi-Fi and the network stack.
    let rng = Rng::new();
    let stack = net::start(&spawner, peripherals.WIFI, rng);

    spawner.spawn(tasks::display_tx::display_tx_task(tx)).ok();
    spawner.spawn(tasks::light::light_task(adc, adc_pin)).ok();
    spawner.spawn(tasks::tick::tick_task(shared)).ok();
    for worker_id in 0..tasks::http::HTTP_WORKER_COUNT {
        spawner
            .spawn(tasks::http::http_worker(stack, shared, worker_id))
            .ok();
    }
    spawner.spawn(tasks::ingest::news_task(stack, shared)).ok();
    spawner.spawn(tasks::ingest::weather_task(stack, shared)).ok();
    spawner.spawn(tasks::time_sync::time_sync_task(stack)).ok();

    info!("All tasks spawned");

    // Heartbeat; everything real happens in the tasks.
    loop {
        Timer::after(Duration::from_secs(300)).await;
        debug!("Uptime {}s", Instant::now().as_secs());
    }
}

/// Short text form of the chip's reset reason for the status record.
fn reset_reason_text() -> String<RESET_REASON_MAX> {
    let mut text: String<RESET_REASON_MAX> = String::new();
    match reset_reason(Cpu::ProCpu) {
        Some(reason) => {
            let _ = core::fmt::write(&mut text, format_args!("{:?}", reason));
            // Over-long debug names are clipped by the bounded string.
            if text.is_empty() {
                let _ = text.push_str("unknown");
            }
        }
        None => {
            let _ = text.push_str("power-on");
        }
    }
    text
}
