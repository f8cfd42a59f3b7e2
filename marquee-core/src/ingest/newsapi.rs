//! newsapi.org response scanning
//!
//! The feed body is a JSON envelope with an `articles` array; the only
//! part the ticker cares about is each article's `title`. Rather than
//! modelling the whole schema, titles are pulled out with a string-key
//! scan, so schema drift in fields the ticker ignores cannot break
//! ingestion.

use heapless::{String, Vec};

use marquee_protocol::json::{scan_str, unescape, StrValues, UnescapeError};

use super::filter::FilterList;
use crate::store::{MessageText, MAX_NEWS_MESSAGES, NEWS_TEXT_MAX};

/// Feed host (plain HTTP, as the transport does not carry TLS)
pub const NEWSAPI_HOST: &str = "newsapi.org";

/// Tombstone title newsapi substitutes for withdrawn articles
const REMOVED_MARKER: &str = "[Removed]";

/// Request path for the top-headlines feed.
pub fn request_path(token: &str, page_size: u8) -> String<128> {
    let mut path: String<128> = String::new();
    // Token length is bounded by the setting, so this cannot overflow.
    let _ = core::fmt::write(
        &mut path,
        format_args!(
            "/v2/top-headlines?country=nl&pageSize={}&apiKey={}",
            page_size, token
        ),
    );
    path
}

/// Extract up to `max` admissible titles from a feed response, in feed
/// order. Titles that are empty, withdrawn, blocked by the filter,
/// over-long, or duplicates are dropped.
///
/// A body without the `"status":"ok"` envelope is a parse failure; the
/// caller leaves the previous collection untouched.
pub fn collect_titles(
    body: &str,
    max: usize,
    filter: &FilterList,
) -> Result<Vec<MessageText, MAX_NEWS_MESSAGES>, ()> {
    match scan_str(body, "status") {
        Some("ok") => {}
        _ => return Err(()),
    }

    let mut titles: Vec<MessageText, MAX_NEWS_MESSAGES> = Vec::new();
    for raw in StrValues::new(body, "title") {
        if titles.len() >= max.min(MAX_NEWS_MESSAGES) {
            break;
        }
        let title = match unescape::<NEWS_TEXT_MAX>(raw) {
            Ok(t) => t,
            // Over-long or mangled titles are dropped, not truncated
            // mid-escape.
            Err(UnescapeError::Overflow) | Err(UnescapeError::BadEscape) => continue,
        };
        let trimmed = title.trim();
        if trimmed.is_empty() || trimmed == REMOVED_MARKER {
            continue;
        }
        if filter.blocks(trimmed) {
            continue;
        }
        if titles.iter().any(|t| t.as_str() == trimmed) {
            continue;
        }
        let mut text = MessageText::new();
        // trimmed is no longer than title, which already fit.
        let _ = text.push_str(trimmed);
        let _ = titles.push(text);
    }
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "status":"ok","totalResults":4,
        "articles":[
            {"source":{"name":"a"},"title":"First headline"},
            {"title":"[Removed]"},
            {"title":"First headline"},
            {"title":"Second \"quoted\" headline"}
        ]
    }"#;

    #[test]
    fn test_titles_extracted_in_feed_order() {
        let titles = collect_titles(FEED, 10, &FilterList::default()).unwrap();
        let got: std::vec::Vec<&str> = titles.iter().map(|t| t.as_str()).collect();
        assert_eq!(got, std::vec!["First headline", "Second \"quoted\" headline"]);
    }

    #[test]
    fn test_capacity_truncates_in_order() {
        let titles = collect_titles(FEED, 1, &FilterList::default()).unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].as_str(), "First headline");
    }

    #[test]
    fn test_filtered_titles_dropped() {
        let filter = FilterList::from_words(&["quoted"]);
        let titles = collect_titles(FEED, 10, &filter).unwrap();
        assert_eq!(titles.len(), 1);
    }

    #[test]
    fn test_error_envelope_is_parse_failure() {
        let body = r#"{"status":"error","code":"apiKeyInvalid"}"#;
        assert!(collect_titles(body, 10, &FilterList::default()).is_err());
        assert!(collect_titles("<html>502</html>", 10, &FilterList::default()).is_err());
    }

    #[test]
    fn test_zero_articles_is_valid() {
        let body = r#"{"status":"ok","totalResults":0,"articles":[]}"#;
        let titles = collect_titles(body, 10, &FilterList::default()).unwrap();
        assert!(titles.is_empty());
    }

    #[test]
    fn test_request_path_carries_token() {
        let path = request_path("abc123", 10);
        assert_eq!(
            path.as_str(),
            "/v2/top-headlines?country=nl&pageSize=10&apiKey=abc123"
        );
    }
}
