//! Display-link TX task
//!
//! Drains the link channel and serializes commands onto the UART that
//! feeds the panel controller. The controller is a dumb terminal: it
//! owns glyphs and scrolling, this side owns what text is shown, at
//! what speed, and how bright.

use defmt::*;
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use esp_hal::uart::UartTx;
use esp_hal::Async;

use marquee_protocol::link::{self, MAX_FRAME_LEN};

use crate::channels::LINK_CHANNEL;

#[embassy_executor::task]
pub async fn display_tx_task(mut tx: UartTx<'static, Async>) {
    info!("Display TX task started");

    let mut frame_buf = [0u8; MAX_FRAME_LEN];
    loop {
        let command = LINK_CHANNEL.receive().await;
        match link::encode(&command, &mut frame_buf) {
            Ok(frame) => {
                if tx.write_all(frame).await.is_err() {
                    // The panel link is fire-and-forget; a wedged UART
                    // only costs this frame.
                    warn!("Display link write failed");
                    Timer::after(Duration::from_millis(50)).await;
                }
            }
            Err(e) => warn!("Display frame encode failed: {:?}", e),
        }
    }
}
