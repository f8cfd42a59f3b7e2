//! WeerLive (weerlive.nl) response scanning
//!
//! The 10-minute weather feed returns a `liveweer` array with one
//! entry; the ticker composes its weather line from the summary text
//! and the temperature. Temperature arrives as a JSON string in this
//! feed, but a bare number is accepted too.

use heapless::String;

use marquee_protocol::json::{scan_raw, scan_str, unescape};

use crate::store::MessageText;

/// Feed host (plain HTTP)
pub const WEERLIVE_HOST: &str = "weerlive.nl";

/// Request path for the live-weather feed.
pub fn request_path(token: &str) -> String<96> {
    let mut path: String<96> = String::new();
    // Token length is bounded by the setting, so this cannot overflow.
    let _ = core::fmt::write(
        &mut path,
        format_args!("/api/json-data-10min.php?key={}&locatie=Amsterdam", token),
    );
    path
}

/// Compose the weather ticker line from a feed response.
pub fn summary(body: &str) -> Result<MessageText, ()> {
    let raw_summary = scan_str(body, "samenv").ok_or(())?;
    let summary: String<128> = unescape(raw_summary).map_err(|_| ())?;
    if summary.trim().is_empty() {
        return Err(());
    }

    let temp = scan_str(body, "temp")
        .map(|t| t.trim())
        .or_else(|| scan_raw(body, "temp"));

    let mut line = MessageText::new();
    let result = match temp {
        Some(temp) if !temp.is_empty() => core::fmt::write(
            &mut line,
            format_args!("{}, {}\u{b0}C", summary.trim(), temp),
        ),
        _ => core::fmt::write(&mut line, format_args!("{}", summary.trim())),
    };
    result.map_err(|_| ())?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_string_temperature() {
        let body = r#"{"liveweer":[{"plaats":"Amsterdam","temp":"12.4","samenv":"Zwaar bewolkt"}]}"#;
        assert_eq!(summary(body).unwrap().as_str(), "Zwaar bewolkt, 12.4\u{b0}C");
    }

    #[test]
    fn test_summary_with_numeric_temperature() {
        let body = r#"{"liveweer":[{"samenv":"Helder","temp":-3.5}]}"#;
        assert_eq!(summary(body).unwrap().as_str(), "Helder, -3.5\u{b0}C");
    }

    #[test]
    fn test_summary_without_temperature() {
        let body = r#"{"liveweer":[{"samenv":"Mist"}]}"#;
        assert_eq!(summary(body).unwrap().as_str(), "Mist");
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(summary("{}").is_err());
        assert!(summary(r#"{"samenv":""}"#).is_err());
        assert!(summary("<html></html>").is_err());
    }

    #[test]
    fn test_request_path_carries_token() {
        assert_eq!(
            request_path("k3y").as_str(),
            "/api/json-data-10min.php?key=k3y&locatie=Amsterdam"
        );
    }
}
