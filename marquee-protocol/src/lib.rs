//! Wire surfaces of the Marquee ticker
//!
//! This crate defines the two external surfaces the engine is reached
//! through, without depending on any transport:
//!
//! - The REST/JSON control API: route table, response status mapping,
//!   and bounded JSON emission/scanning helpers.
//! - The display link: framed commands sent to the LED-matrix panel
//!   controller, which acts as a dumb terminal (the engine decides what
//!   text to show and for how long, never how pixels are drawn).

#![no_std]
#![deny(unsafe_code)]

pub mod json;
pub mod link;
pub mod response;
pub mod routes;

pub use link::{LinkCommand, LinkError, LINK_TEXT_MAX, MAX_FRAME_LEN};
pub use response::ApiStatus;
pub use routes::{parse_request, ApiRequest};
