//! REST route table
//!
//! Maps an already-parsed request line onto a typed API request. The
//! HTTP transport (request framing, headers, worker pool) lives in the
//! firmware crate; everything past the method and path is decided here
//! so the table is testable on the host.

/// A recognized API operation.
///
/// Bodies are carried as raw JSON text; the handlers scan them with
/// [`crate::json`] so malformed input turns into a typed rejection
/// instead of a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApiRequest<'a> {
    DeviceInfo,
    DeviceTime,
    GetSettings,
    PostSettings { body: &'a str },
    GetLocalMessages,
    PostLocalMessage { body: &'a str },
    DeleteLocalMessage { id: u8 },
    GetNewsMessages,
    Reboot,
    Format,
}

/// Resolve `method` + `path` to an [`ApiRequest`].
///
/// `None` means the route does not exist; the caller answers with a
/// not-found body carrying the offending path so "route doesn't exist"
/// stays distinguishable from "resource doesn't exist".
pub fn parse_request<'a>(method: &str, path: &'a str, body: &'a str) -> Option<ApiRequest<'a>> {
    let path = strip_trailing_slash(path);

    match (method, path) {
        ("GET", "/api/v0/devinfo") => Some(ApiRequest::DeviceInfo),
        ("GET", "/api/v0/devtime") => Some(ApiRequest::DeviceTime),
        ("GET", "/api/v0/settings") => Some(ApiRequest::GetSettings),
        ("POST", "/api/v0/settings") => Some(ApiRequest::PostSettings { body }),
        ("GET", "/api/v0/localmessages") => Some(ApiRequest::GetLocalMessages),
        ("POST", "/api/v0/localmessages") => Some(ApiRequest::PostLocalMessage { body }),
        ("GET", "/api/v0/newsmessages") => Some(ApiRequest::GetNewsMessages),
        ("POST", "/api/v0/reboot") => Some(ApiRequest::Reboot),
        ("POST", "/api/v0/format") => Some(ApiRequest::Format),
        ("DELETE", _) => {
            let id = path.strip_prefix("/api/v0/localmessages/")?;
            let id: u8 = id.parse().ok()?;
            Some(ApiRequest::DeleteLocalMessage { id })
        }
        _ => None,
    }
}

fn strip_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_routes() {
        assert_eq!(
            parse_request("GET", "/api/v0/devinfo", ""),
            Some(ApiRequest::DeviceInfo)
        );
        assert_eq!(
            parse_request("GET", "/api/v0/newsmessages/", ""),
            Some(ApiRequest::GetNewsMessages)
        );
        assert_eq!(
            parse_request("POST", "/api/v0/localmessages", r#"{"text":"x"}"#),
            Some(ApiRequest::PostLocalMessage {
                body: r#"{"text":"x"}"#
            })
        );
        assert_eq!(
            parse_request("DELETE", "/api/v0/localmessages/7", ""),
            Some(ApiRequest::DeleteLocalMessage { id: 7 })
        );
    }

    #[test]
    fn test_unknown_routes() {
        assert_eq!(parse_request("GET", "/api/v0/doesNotExist", ""), None);
        assert_eq!(parse_request("PUT", "/api/v0/settings", ""), None);
        assert_eq!(parse_request("DELETE", "/api/v0/localmessages/x", ""), None);
        assert_eq!(parse_request("DELETE", "/api/v0/newsmessages/1", ""), None);
    }
}
