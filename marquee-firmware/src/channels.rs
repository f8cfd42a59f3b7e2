//! Inter-task communication
//!
//! Static channels, signals, and atomics shared between the Embassy
//! tasks. The engine itself lives behind one async mutex: every task
//! takes the lock for a bounded synchronous section, which is what
//! makes an API write visible to the very next scheduler tick.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use portable_atomic::{AtomicU16, AtomicU32, Ordering};

use marquee_core::engine::Engine;
use marquee_protocol::LinkCommand;

use crate::storage::FlashStore;

/// Commands queued for the display-link TX task
const LINK_CHANNEL_SIZE: usize = 4;

/// Engine plus its storage, locked together so handlers can complete
/// their durable writes before releasing.
pub struct Shared {
    pub engine: Engine,
    pub store: FlashStore,
}

pub type SharedCell = Mutex<CriticalSectionRawMutex, Shared>;

/// Commands for the panel controller
pub static LINK_CHANNEL: Channel<CriticalSectionRawMutex, LinkCommand, LINK_CHANNEL_SIZE> =
    Channel::new();

/// Latest ambient-light reading, scaled to 0..=1023
pub static LIGHT_RAW: AtomicU16 = AtomicU16::new(0);

/// Wall-clock epoch seconds at boot (0 = not yet synced)
static EPOCH_BASE: AtomicU32 = AtomicU32::new(0);

/// Record a successful time sync.
pub fn set_epoch_base(epoch_at_boot: u32) {
    EPOCH_BASE.store(epoch_at_boot, Ordering::Relaxed);
}

/// Current wall-clock time, if time sync has happened.
pub fn epoch_now(uptime_s: u32) -> Option<u32> {
    match EPOCH_BASE.load(Ordering::Relaxed) {
        0 => None,
        base => Some(base.wrapping_add(uptime_s)),
    }
}
