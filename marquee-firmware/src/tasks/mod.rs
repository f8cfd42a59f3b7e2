//! Embassy tasks
//!
//! Each task drives one engine entry point: the tick task runs the
//! rotation scheduler, the HTTP workers serve the REST API, the ingest
//! tasks fetch the feeds on their configured intervals, the time-sync
//! task keeps a wall-clock offset, and the display task serializes
//! panel commands onto the UART link.

pub mod display_tx;
pub mod http;
pub mod ingest;
pub mod light;
pub mod tick;
pub mod time_sync;
