//! Response status mapping and canned error bodies

use core::fmt::{self, Write};

use crate::json::JsonObject;

/// Outcome class of an API operation, mapped onto HTTP status lines by
/// the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApiStatus {
    Ok,
    /// Missing or malformed parameter, out-of-bounds value, text too long
    BadRequest,
    /// Resource (not route) does not exist
    NotFound,
    /// Collection already at its configured capacity
    CapacityExceeded,
    /// Durable write failed after retries; the in-memory state was
    /// still updated (degraded mode)
    StorageFailed,
}

impl ApiStatus {
    pub fn status_line(self) -> &'static str {
        match self {
            ApiStatus::Ok => "200 OK",
            ApiStatus::BadRequest => "400 Bad Request",
            ApiStatus::NotFound => "404 Not Found",
            ApiStatus::CapacityExceeded => "409 Conflict",
            ApiStatus::StorageFailed => "500 Internal Server Error",
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, ApiStatus::Ok)
    }
}

/// Machine-readable error kind plus a human-readable message.
pub fn write_error<W: Write>(w: &mut W, kind: &str, message: &str) -> fmt::Result {
    let mut obj = JsonObject::new(w)?;
    obj.str_field("error", kind)?;
    obj.str_field("message", message)?;
    obj.finish()
}

/// Body for an unrecognized route, carrying the requested path.
pub fn write_not_found<W: Write>(w: &mut W, uri: &str) -> fmt::Result {
    let mut obj = JsonObject::new(w)?;
    obj.str_field("error", "not found")?;
    obj.str_field("uri", uri)?;
    obj.finish()
}
