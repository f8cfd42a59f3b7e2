//! Wi-Fi and network stack bring-up
//!
//! Station mode with DHCP. The connection task owns the Wi-Fi
//! controller and reconnects forever; everything else just waits for
//! `stack.wait_config_up()`.

use defmt::*;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use esp_radio::Controller as RadioController;
use static_cell::StaticCell;

/// Station credentials, baked in at build time. An empty SSID leaves
/// the device offline (engine and panel still run from flash state).
pub const WIFI_SSID: &str = match option_env!("MARQUEE_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
pub const WIFI_PSK: &str = match option_env!("MARQUEE_WIFI_PSK") {
    Some(psk) => psk,
    None => "",
};

static RADIO_CONTROLLER: StaticCell<RadioController<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<8>> = StaticCell::new();

/// Bring up the radio and the network stack, spawning the runner and
/// connection tasks.
pub fn start(spawner: &Spawner, wifi: WIFI<'static>, rng: Rng) -> Stack<'static> {
    let radio = RADIO_CONTROLLER.init(esp_radio::init().unwrap());
    let (controller, interfaces) =
        esp_radio::wifi::new(radio, wifi, Default::default()).unwrap();

    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner.spawn(net_task(runner)).ok();
    spawner.spawn(connection_task(controller)).ok();

    stack
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[embassy_executor::task]
async fn connection_task(mut controller: WifiController<'static>) {
    if WIFI_SSID.is_empty() {
        warn!("No Wi-Fi credentials configured; staying offline");
        return;
    }

    loop {
        let config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(WIFI_SSID.into())
                .with_password(WIFI_PSK.into()),
        );
        if let Err(e) = controller.set_config(&config) {
            error!("Wi-Fi config rejected: {:?}", e);
            Timer::after(Duration::from_secs(30)).await;
            continue;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            if let Err(e) = controller.start_async().await {
                error!("Wi-Fi start failed: {:?}", e);
                Timer::after(Duration::from_secs(10)).await;
                continue;
            }
        }

        match controller.connect_async().await {
            Ok(()) => {
                info!("Wi-Fi connected to {}", WIFI_SSID);
                // Park until the link drops, then loop to reconnect.
                controller.wait_for_event(WifiEvent::StaDisconnected).await;
                warn!("Wi-Fi disconnected; reconnecting");
            }
            Err(e) => {
                warn!("Wi-Fi connect failed: {:?}; retrying", e);
            }
        }
        Timer::after(Duration::from_secs(5)).await;
    }
}
