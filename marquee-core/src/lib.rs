//! Board-agnostic engine for the Marquee ticker
//!
//! This crate contains all application logic that does not depend on
//! hardware, transports, or an async runtime:
//!
//! - Record-store abstraction over the durable flash storage
//! - Settings store with typed, bounds-checked values
//! - Message store (Local and News collections)
//! - News/weather ingestion policy and feed parsing
//! - Rotation scheduler and brightness mapping
//! - REST API handlers
//!
//! Everything here is synchronous and driven through explicit
//! `tick(now)`/request entry points, so it runs unchanged under the
//! firmware's cooperative tasks and under host tests.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod api;
pub mod engine;
pub mod ingest;
pub mod settings;
pub mod status;
pub mod storage;
pub mod store;
pub mod ticker;

#[cfg(test)]
pub(crate) mod testutil;
