//! REST API handlers
//!
//! One handler per operation, all synchronous: a handler completes its
//! durable writes before the response body is final, so a caller that
//! got a 2xx knows the mutation is persisted (or got the explicit
//! degraded status when it is not). Store-level errors map to distinct
//! response statuses and machine-readable kinds; nothing is swallowed.
//!
//! The HTTP transport lives in the firmware crate; it resolves the
//! route with `marquee_protocol::parse_request` and hands the typed
//! request here.

use core::fmt::{self, Write};

use marquee_protocol::json::{
    scan_raw, scan_str, unescape, JsonObject, JsonValue, ObjectFields, UnescapeError,
};
use marquee_protocol::response::{write_error, ApiStatus};
use marquee_protocol::routes::ApiRequest;

use crate::engine::Engine;
use crate::settings::SettingsError;
use crate::storage::RecordStore;
use crate::store::{Collection, StoreError, LOCAL_TEXT_MAX};

/// Volatile device readings supplied by the runtime per request.
#[derive(Debug, Clone, Copy)]
pub struct SystemSnapshot {
    pub uptime_s: u32,
    pub free_heap: u32,
    /// Wall-clock seconds, when time sync has happened
    pub epoch_s: Option<u32>,
}

/// Side effect the transport must perform after sending the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceAction {
    Reboot,
}

/// Handler result: response status plus any post-response action.
#[derive(Debug, Clone, Copy)]
pub struct ApiOutcome {
    pub status: ApiStatus,
    pub action: Option<DeviceAction>,
}

impl ApiOutcome {
    fn status(status: ApiStatus) -> Self {
        Self {
            status,
            action: None,
        }
    }
}

/// Dispatch one API request against the engine, writing the response
/// body into `out`.
pub fn handle<S: RecordStore, W: Write>(
    engine: &mut Engine,
    store: &mut S,
    request: &ApiRequest<'_>,
    sys: &SystemSnapshot,
    out: &mut W,
) -> ApiOutcome {
    let result = match request {
        ApiRequest::DeviceInfo => device_info(engine, sys, out),
        ApiRequest::DeviceTime => device_time(sys, out),
        ApiRequest::GetSettings => get_settings(engine, out),
        ApiRequest::PostSettings { body } => post_settings(engine, store, body, out),
        ApiRequest::GetLocalMessages => list_messages(engine, Collection::Local, out),
        ApiRequest::GetNewsMessages => list_messages(engine, Collection::News, out),
        ApiRequest::PostLocalMessage { body } => post_local_message(engine, store, body, out),
        ApiRequest::DeleteLocalMessage { id } => delete_local_message(engine, store, *id, out),
        ApiRequest::Reboot => reboot(engine, store, out),
        ApiRequest::Format => format_storage(engine, store, out),
    };

    // A sink that refuses bytes is a transport problem, not a store
    // problem; report it as an internal failure.
    result.unwrap_or(ApiOutcome::status(ApiStatus::StorageFailed))
}

fn device_info<W: Write>(
    engine: &Engine,
    sys: &SystemSnapshot,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    let mut obj = JsonObject::new(out)?;
    obj.str_field("version", engine.fw_version)?;
    obj.str_field("hostname", &engine.settings.hostname)?;
    obj.uint_field("uptime", sys.uptime_s)?;
    obj.uint_field("freeHeap", sys.free_heap)?;
    obj.uint_field("nrReboots", engine.status.reboot_count)?;
    obj.str_field("lastReset", &engine.status.last_reset)?;
    obj.bool_field("storageDegraded", engine.messages.is_degraded())?;
    obj.finish()?;
    Ok(ApiOutcome::status(ApiStatus::Ok))
}

fn device_time<W: Write>(sys: &SystemSnapshot, out: &mut W) -> Result<ApiOutcome, fmt::Error> {
    let epoch = sys.epoch_s.unwrap_or(0);

    let mut time: heapless::String<10> = heapless::String::new();
    let secs = epoch % 86_400;
    write!(
        time,
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )?;

    let mut date: heapless::String<12> = heapless::String::new();
    let (y, m, d) = civil_from_days((epoch / 86_400) as i64);
    write!(date, "{:04}-{:02}-{:02}", y, m, d)?;

    let mut obj = JsonObject::new(out)?;
    obj.str_field("time", &time)?;
    obj.str_field("date", &date)?;
    obj.bool_field("synced", sys.epoch_s.is_some())?;
    obj.finish()?;
    Ok(ApiOutcome::status(ApiStatus::Ok))
}

/// Days-since-epoch to civil date (Gregorian), valid far beyond the
/// device's lifetime.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn get_settings<W: Write>(engine: &Engine, out: &mut W) -> Result<ApiOutcome, fmt::Error> {
    let settings = &engine.settings;
    let mut obj = JsonObject::new(out)?;
    obj.str_field("hostname", &settings.hostname)?;
    obj.str_field("newsAuthToken", &settings.news_auth_token)?;
    obj.str_field("weerLiveAuthToken", &settings.weerlive_auth_token)?;
    obj.uint_field("localMaxMsg", settings.local_max_msg.into())?;
    obj.uint_field("textSpeed", settings.text_speed.into())?;
    obj.uint_field("maxIntensity", settings.max_intensity.into())?;
    obj.uint_field("LDRlowOffset", settings.ldr_low_offset.into())?;
    obj.uint_field("LDRhighOffset", settings.ldr_high_offset.into())?;
    obj.uint_field("newsInterval", settings.news_interval_min.into())?;
    obj.uint_field("newsMaxMsg", settings.news_max_msg.into())?;
    obj.uint_field("weerLiveInterval", settings.weerlive_interval_min.into())?;
    obj.finish()?;
    Ok(ApiOutcome::status(ApiStatus::Ok))
}

fn post_settings<S: RecordStore, W: Write>(
    engine: &mut Engine,
    store: &mut S,
    body: &str,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    if ObjectFields::new(body).next().is_none() {
        write_error(out, "badRequest", "no settings in body")?;
        return Ok(ApiOutcome::status(ApiStatus::BadRequest));
    }

    let mut obj = JsonObject::new(out)?;
    let mut fields = obj.array_field("fields")?;

    for (name, value) in ObjectFields::new(body) {
        // Each field is applied and persisted independently
        // (write-through, no batching).
        let applied = match value {
            JsonValue::Str(raw) => match unescape::<64>(raw) {
                Ok(text) => engine.settings.set(name, &text),
                Err(_) => Err(SettingsError::InvalidValue),
            },
            JsonValue::Scalar(raw) => engine.settings.set(name, raw),
        };

        let verdict = match applied {
            Ok(()) => match engine.settings.persist(store) {
                Ok(()) => "ok",
                Err(_) => "storageFailed",
            },
            Err(SettingsError::Unknown) => "unknown",
            Err(SettingsError::InvalidValue) => "invalidValue",
        };

        let mut item = fields.object()?;
        item.str_field("name", name)?;
        item.str_field("status", verdict)?;
        item.finish()?;
    }

    fields.finish()?;
    obj.finish()?;
    Ok(ApiOutcome::status(ApiStatus::Ok))
}

fn list_messages<W: Write>(
    engine: &Engine,
    collection: Collection,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    let mut obj = JsonObject::new(out)?;
    let mut arr = obj.array_field("messages")?;
    for message in engine.messages.list(collection) {
        let mut item = arr.object()?;
        item.uint_field("id", message.id.into())?;
        item.str_field("text", &message.text)?;
        if let Some(fetched_at) = message.fetched_at {
            item.uint_field("fetchedAt", fetched_at)?;
        }
        item.finish()?;
    }
    arr.finish()?;
    obj.finish()?;
    Ok(ApiOutcome::status(ApiStatus::Ok))
}

fn post_local_message<S: RecordStore, W: Write>(
    engine: &mut Engine,
    store: &mut S,
    body: &str,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    let raw_text = match scan_str(body, "text") {
        Some(raw) => raw,
        None => {
            write_error(out, "badRequest", "missing text")?;
            return Ok(ApiOutcome::status(ApiStatus::BadRequest));
        }
    };
    let text = match unescape::<LOCAL_TEXT_MAX>(raw_text) {
        Ok(text) => text,
        Err(UnescapeError::Overflow) => {
            write_error(out, "textTooLong", "text exceeds local message bound")?;
            return Ok(ApiOutcome::status(ApiStatus::BadRequest));
        }
        Err(_) => {
            write_error(out, "badRequest", "malformed text")?;
            return Ok(ApiOutcome::status(ApiStatus::BadRequest));
        }
    };
    if text.trim().is_empty() {
        write_error(out, "badRequest", "empty text")?;
        return Ok(ApiOutcome::status(ApiStatus::BadRequest));
    }

    let max = engine.settings.local_max_msg as usize;
    let id = match scan_raw(body, "id") {
        Some(raw) => match raw.parse::<u8>() {
            Ok(id) => id,
            Err(_) => {
                write_error(out, "badRequest", "id must be a small integer")?;
                return Ok(ApiOutcome::status(ApiStatus::BadRequest));
            }
        },
        // Omitted id: allocate the smallest free one.
        None => match engine.messages.allocate_id(Collection::Local, max) {
            Ok(id) => id,
            Err(e) => return store_error(e, out).map(ApiOutcome::status),
        },
    };

    match engine
        .messages
        .put(store, Collection::Local, id, &text, None, max)
    {
        Ok(()) => {
            let mut obj = JsonObject::new(out)?;
            obj.uint_field("id", id.into())?;
            obj.finish()?;
            Ok(ApiOutcome::status(ApiStatus::Ok))
        }
        Err(e) => store_error(e, out).map(ApiOutcome::status),
    }
}

fn delete_local_message<S: RecordStore, W: Write>(
    engine: &mut Engine,
    store: &mut S,
    id: u8,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    match engine.messages.delete(store, Collection::Local, id) {
        Ok(()) => {
            let mut obj = JsonObject::new(out)?;
            obj.uint_field("deleted", id.into())?;
            obj.finish()?;
            Ok(ApiOutcome::status(ApiStatus::Ok))
        }
        Err(e) => store_error(e, out).map(ApiOutcome::status),
    }
}

fn reboot<S: RecordStore, W: Write>(
    engine: &mut Engine,
    store: &mut S,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    // Last chance to get the status record onto flash before the reset.
    let persisted = engine.status.persist(store).is_ok();
    let mut obj = JsonObject::new(out)?;
    obj.bool_field("reboot", true)?;
    obj.finish()?;
    Ok(ApiOutcome {
        status: if persisted {
            ApiStatus::Ok
        } else {
            ApiStatus::StorageFailed
        },
        action: Some(DeviceAction::Reboot),
    })
}

fn format_storage<S: RecordStore, W: Write>(
    engine: &mut Engine,
    store: &mut S,
    out: &mut W,
) -> Result<ApiOutcome, fmt::Error> {
    match engine.format(store) {
        Ok(()) => {
            let mut obj = JsonObject::new(out)?;
            obj.str_field("format", "ok")?;
            obj.finish()?;
            Ok(ApiOutcome::status(ApiStatus::Ok))
        }
        Err(_) => {
            write_error(out, "storageFailure", "format failed")?;
            Ok(ApiOutcome::status(ApiStatus::StorageFailed))
        }
    }
}

/// Map a store error onto its response status and body.
fn store_error<W: Write>(error: StoreError, out: &mut W) -> Result<ApiStatus, fmt::Error> {
    let (status, kind, message) = match error {
        StoreError::NotFound => (ApiStatus::NotFound, "notFound", "no such message"),
        StoreError::CapacityExceeded => (
            ApiStatus::CapacityExceeded,
            "capacityExceeded",
            "collection is full",
        ),
        StoreError::TextTooLong => (
            ApiStatus::BadRequest,
            "textTooLong",
            "text exceeds message bound",
        ),
        StoreError::StorageFailure => (
            ApiStatus::StorageFailed,
            "storageFailure",
            "applied in memory only",
        ),
    };
    write_error(out, kind, message)?;
    Ok(status)
}
