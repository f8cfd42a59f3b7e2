//! SNTP time sync
//!
//! One UDP round-trip to an NTP pool server on a long interval. Only
//! whole seconds are kept: the clock feeds the devtime endpoint and the
//! news timestamps, nothing that needs sub-second accuracy. Failure is
//! tolerated; the device simply reports an unsynced clock.

use defmt::*;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant, Timer};

use crate::channels::set_epoch_base;

const NTP_SERVER: &str = "pool.ntp.org";
const NTP_PORT: u16 = 123;
const LOCAL_PORT: u16 = 49_123;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
const NTP_UNIX_OFFSET: u32 = 2_208_988_800;

const SYNC_INTERVAL: Duration = Duration::from_secs(6 * 3600);
const RETRY_INTERVAL: Duration = Duration::from_secs(60);
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[embassy_executor::task]
pub async fn time_sync_task(stack: Stack<'static>) {
    info!("Time sync task started");

    loop {
        stack.wait_config_up().await;

        match with_timeout(QUERY_TIMEOUT, query_once(stack)).await {
            Ok(Ok(epoch_s)) => {
                let uptime_s = Instant::now().as_secs() as u32;
                set_epoch_base(epoch_s.wrapping_sub(uptime_s));
                info!("Time synced: epoch {}", epoch_s);
                Timer::after(SYNC_INTERVAL).await;
            }
            Ok(Err(())) | Err(_) => {
                warn!("Time sync failed; retrying later");
                Timer::after(RETRY_INTERVAL).await;
            }
        }
    }
}

async fn query_once(stack: Stack<'static>) -> Result<u32, ()> {
    let addrs = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|_| ())?;
    let addr = *addrs.first().ok_or(())?;

    let mut rx_meta = [PacketMetadata::EMPTY; 2];
    let mut rx_buf = [0u8; 64];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buf = [0u8; 64];
    let mut socket = UdpSocket::new(stack, &mut rx_meta, &mut rx_buf, &mut tx_meta, &mut tx_buf);
    socket.bind(LOCAL_PORT).map_err(|_| ())?;

    // Client request: version 4, mode 3, everything else zero.
    let mut packet = [0u8; 48];
    packet[0] = 0x23;
    socket.send_to(&packet, (addr, NTP_PORT)).await.map_err(|_| ())?;

    let mut response = [0u8; 64];
    let (n, _) = socket.recv_from(&mut response).await.map_err(|_| ())?;
    if n < 48 {
        return Err(());
    }

    // Transmit timestamp, seconds field.
    let secs = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    if secs < NTP_UNIX_OFFSET {
        return Err(());
    }
    Ok(secs - NTP_UNIX_OFFSET)
}
