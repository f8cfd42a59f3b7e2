//! Bounded JSON emission and scanning
//!
//! The API bodies are small and fixed-shape, so instead of a serde JSON
//! layer this module provides a writer that emits into any
//! `core::fmt::Write` sink and a tolerant scanner for the few inbound
//! shapes (flat objects, repeated string keys). Inputs that are not
//! valid JSON produce `None`/errors, never panics.

use core::fmt::{self, Write};

use heapless::String;

/// Write `s` with JSON string escaping (no surrounding quotes).
pub fn escape_into<W: Write>(w: &mut W, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '"' => w.write_str("\\\"")?,
            '\\' => w.write_str("\\\\")?,
            '\n' => w.write_str("\\n")?,
            '\r' => w.write_str("\\r")?,
            '\t' => w.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(w, "\\u{:04x}", c as u32)?,
            c => w.write_char(c)?,
        }
    }
    Ok(())
}

/// Incremental JSON object writer.
///
/// Call `finish()` to emit the closing brace; dropping the writer
/// without it leaves the output truncated, which the caller's sink
/// length check will catch.
pub struct JsonObject<'w, W: Write> {
    w: &'w mut W,
    first: bool,
}

impl<'w, W: Write> JsonObject<'w, W> {
    pub fn new(w: &'w mut W) -> Result<Self, fmt::Error> {
        w.write_char('{')?;
        Ok(Self { w, first: true })
    }

    fn key(&mut self, name: &str) -> fmt::Result {
        if !self.first {
            self.w.write_char(',')?;
        }
        self.first = false;
        self.w.write_char('"')?;
        escape_into(self.w, name)?;
        self.w.write_str("\":")
    }

    pub fn str_field(&mut self, name: &str, value: &str) -> fmt::Result {
        self.key(name)?;
        self.w.write_char('"')?;
        escape_into(self.w, value)?;
        self.w.write_char('"')
    }

    pub fn uint_field(&mut self, name: &str, value: u32) -> fmt::Result {
        self.key(name)?;
        write!(self.w, "{}", value)
    }

    pub fn int_field(&mut self, name: &str, value: i32) -> fmt::Result {
        self.key(name)?;
        write!(self.w, "{}", value)
    }

    pub fn bool_field(&mut self, name: &str, value: bool) -> fmt::Result {
        self.key(name)?;
        self.w.write_str(if value { "true" } else { "false" })
    }

    /// Emit a pre-encoded JSON value verbatim.
    pub fn raw_field(&mut self, name: &str, value: &str) -> fmt::Result {
        self.key(name)?;
        self.w.write_str(value)
    }

    /// Start a nested array value; finish it before the next field.
    pub fn array_field(&mut self, name: &str) -> Result<JsonArray<'_, W>, fmt::Error> {
        self.key(name)?;
        JsonArray::new(self.w)
    }

    pub fn finish(self) -> fmt::Result {
        self.w.write_char('}')
    }
}

/// Incremental JSON array writer.
pub struct JsonArray<'w, W: Write> {
    w: &'w mut W,
    first: bool,
}

impl<'w, W: Write> JsonArray<'w, W> {
    pub fn new(w: &'w mut W) -> Result<Self, fmt::Error> {
        w.write_char('[')?;
        Ok(Self { w, first: true })
    }

    fn sep(&mut self) -> fmt::Result {
        if !self.first {
            self.w.write_char(',')?;
        }
        self.first = false;
        Ok(())
    }

    /// Start a nested object element; finish it before the next element.
    pub fn object(&mut self) -> Result<JsonObject<'_, W>, fmt::Error> {
        self.sep()?;
        JsonObject::new(self.w)
    }

    pub fn finish(self) -> fmt::Result {
        self.w.write_char(']')
    }
}

/// Errors from [`unescape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnescapeError {
    /// Decoded value does not fit the destination capacity
    Overflow,
    /// Malformed escape sequence
    BadEscape,
}

/// Decode a raw (still-escaped) JSON string body into a bounded string.
pub fn unescape<const N: usize>(raw: &str) -> Result<String<N>, UnescapeError> {
    let mut out: String<N> = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        let decoded = if c == '\\' {
            match chars.next() {
                Some('"') => '"',
                Some('\\') => '\\',
                Some('/') => '/',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('b') => '\u{8}',
                Some('f') => '\u{c}',
                Some('u') => {
                    let mut code: u32 = 0;
                    for _ in 0..4 {
                        let d = chars.next().ok_or(UnescapeError::BadEscape)?;
                        code = code * 16 + d.to_digit(16).ok_or(UnescapeError::BadEscape)?;
                    }
                    // Surrogate pairs are not expected from our sources;
                    // map them to the replacement character.
                    char::from_u32(code).unwrap_or('\u{fffd}')
                }
                _ => return Err(UnescapeError::BadEscape),
            }
        } else {
            c
        };
        out.push(decoded).map_err(|_| UnescapeError::Overflow)?;
    }
    Ok(out)
}

/// Slice the raw value of the first `"key":"value"` pair, escapes intact.
pub fn scan_str<'a>(body: &'a str, key: &'a str) -> Option<&'a str> {
    StrValues::new(body, key).next()
}

/// Slice the raw text of the first non-string scalar for `key`
/// (number, boolean, null), trimmed.
pub fn scan_raw<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    let rest = after_key(body, key)?;
    if rest.starts_with('"') {
        return None;
    }
    let end = rest
        .find([',', '}', ']'])
        .unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Find the text following `"key"` and its colon.
fn after_key<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    let mut search = body;
    loop {
        let start = search.find('"')?;
        let name_rest = &search[start + 1..];
        if let Some(stripped) = name_rest.strip_prefix(key) {
            if let Some(after_quote) = stripped.strip_prefix('"') {
                let after_colon = after_quote.trim_start();
                if let Some(value) = after_colon.strip_prefix(':') {
                    return Some(value.trim_start());
                }
            }
        }
        // Not our key; skip past this quote and keep looking.
        search = name_rest;
    }
}

/// Slice a raw string value starting right after its opening quote.
/// Returns the value slice and the remainder after the closing quote.
fn take_str_value(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some((&s[..i], &s[i + 1..])),
            _ => i += 1,
        }
    }
    None
}

/// Iterator over every raw string value stored under `key` anywhere in
/// the document, in document order. Used to pull article titles out of
/// a feed response without modelling its whole schema.
pub struct StrValues<'a> {
    rest: &'a str,
    key: &'a str,
}

impl<'a> StrValues<'a> {
    pub fn new(body: &'a str, key: &'a str) -> Self {
        Self { rest: body, key }
    }
}

impl<'a> Iterator for StrValues<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let after = after_key(self.rest, self.key)?;
        let value_start = after.strip_prefix('"')?;
        let (value, rest) = take_str_value(value_start)?;
        self.rest = rest;
        Some(value)
    }
}

/// A scanned value from a flat JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonValue<'a> {
    /// String value, escapes intact
    Str(&'a str),
    /// Number, boolean, or null, as raw text
    Scalar(&'a str),
}

/// Iterator over the top-level `name: value` pairs of a flat JSON
/// object. Nested containers are not supported; a nested value ends the
/// iteration (the settings and message bodies are always flat).
pub struct ObjectFields<'a> {
    rest: &'a str,
}

impl<'a> ObjectFields<'a> {
    pub fn new(body: &'a str) -> Self {
        let rest = body.trim_start();
        let rest = rest.strip_prefix('{').unwrap_or(rest);
        Self { rest }
    }
}

impl<'a> Iterator for ObjectFields<'a> {
    type Item = (&'a str, JsonValue<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.rest.find('"')?;
        let (name, after_name) = take_str_value(&self.rest[start + 1..])?;
        let after_colon = after_name.trim_start().strip_prefix(':')?.trim_start();

        if let Some(value_start) = after_colon.strip_prefix('"') {
            let (value, rest) = take_str_value(value_start)?;
            self.rest = rest;
            Some((name, JsonValue::Str(value)))
        } else if after_colon.starts_with(['{', '[']) {
            None
        } else {
            let end = after_colon.find([',', '}']).unwrap_or(after_colon.len());
            let value = after_colon[..end].trim();
            self.rest = &after_colon[end..];
            if value.is_empty() {
                None
            } else {
                Some((name, JsonValue::Scalar(value)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_writer_escapes() {
        let mut out: String<128> = String::new();
        let mut obj = JsonObject::new(&mut out).unwrap();
        obj.str_field("text", "a \"b\"\nc").unwrap();
        obj.uint_field("id", 3).unwrap();
        obj.finish().unwrap();
        assert_eq!(out.as_str(), r#"{"text":"a \"b\"\nc","id":3}"#);
    }

    #[test]
    fn test_nested_array_of_objects() {
        let mut out: String<128> = String::new();
        let mut obj = JsonObject::new(&mut out).unwrap();
        let mut arr = obj.array_field("messages").unwrap();
        for (id, text) in [(0u32, "a"), (2, "b")] {
            let mut item = arr.object().unwrap();
            item.uint_field("id", id).unwrap();
            item.str_field("text", text).unwrap();
            item.finish().unwrap();
        }
        arr.finish().unwrap();
        obj.finish().unwrap();
        assert_eq!(
            out.as_str(),
            r#"{"messages":[{"id":0,"text":"a"},{"id":2,"text":"b"}]}"#
        );
    }

    #[test]
    fn test_scan_str_and_raw() {
        let body = r#"{"id": 7, "text": "hello \"world\"", "ok": true}"#;
        assert_eq!(scan_raw(body, "id"), Some("7"));
        assert_eq!(scan_str(body, "text"), Some(r#"hello \"world\""#));
        assert_eq!(scan_raw(body, "ok"), Some("true"));
        assert_eq!(scan_str(body, "missing"), None);
        // A string value is not a scalar and vice versa.
        assert_eq!(scan_raw(body, "text"), None);
    }

    #[test]
    fn test_unescape_bounds() {
        let ok: String<8> = unescape("ab\\ncd").unwrap();
        assert_eq!(ok.as_str(), "ab\ncd");
        assert_eq!(
            unescape::<4>("abcde"),
            Err(UnescapeError::Overflow)
        );
        assert_eq!(
            unescape::<8>("ab\\x"),
            Err(UnescapeError::BadEscape)
        );
        let uni: String<8> = unescape("\\u0041").unwrap();
        assert_eq!(uni.as_str(), "A");
    }

    #[test]
    fn test_str_values_iterates_titles() {
        let body = r#"{"articles":[{"title":"first"},{"title":"sec\"ond"},{"title":"third"}]}"#;
        let titles: heapless::Vec<&str, 4> = StrValues::new(body, "title").collect();
        assert_eq!(titles.as_slice(), &["first", r#"sec\"ond"#, "third"]);
    }

    #[test]
    fn test_object_fields_flat() {
        let body = r#"{"textSpeed": 30, "hostname": "tick", "bad": }"#;
        let mut fields = ObjectFields::new(body);
        assert_eq!(fields.next(), Some(("textSpeed", JsonValue::Scalar("30"))));
        assert_eq!(fields.next(), Some(("hostname", JsonValue::Str("tick"))));
        assert_eq!(fields.next(), None);
    }
}
