//! Bounded HTTP GET for the ingestion feeds
//!
//! Plain HTTP/1.1 over a short-lived TCP connection. The whole
//! operation runs under one timeout so a wedged feed can never starve
//! the scheduler; oversized responses are truncated at a fixed cap and
//! handed to the parsers as-is (titles sit early in the feed body).

use alloc::string::String;
use alloc::vec::Vec;

use defmt::*;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;

use marquee_core::ingest::FETCH_TIMEOUT_MS;

/// Response cap; anything past this is ignored, not buffered.
const FETCH_MAX: usize = 24 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum FetchError {
    /// Name resolution failed
    Dns,
    /// TCP connect failed
    Connect,
    /// Socket error mid-transfer
    Io,
    /// The bounded fetch window elapsed
    Timeout,
    /// Response was not a 200 or not parseable HTTP
    Status,
    /// Response body was not valid UTF-8
    Encoding,
}

/// GET `http://host/path` and return the response body.
pub async fn http_get(
    stack: Stack<'static>,
    host: &str,
    path: &str,
) -> Result<String, FetchError> {
    match with_timeout(
        Duration::from_millis(FETCH_TIMEOUT_MS as u64),
        http_get_inner(stack, host, path),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

async fn http_get_inner(
    stack: Stack<'static>,
    host: &str,
    path: &str,
) -> Result<String, FetchError> {
    let addrs = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|_| FetchError::Dns)?;
    let addr = *addrs.first().ok_or(FetchError::Dns)?;

    let mut rx_buf = [0u8; 2048];
    let mut tx_buf = [0u8; 512];
    let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
    socket
        .connect((addr, 80))
        .await
        .map_err(|_| FetchError::Connect)?;

    let mut request: String = String::new();
    core::fmt::write(
        &mut request,
        format_args!(
            // HTTP/1.0 keeps the response unchunked, so the body can be
            // handed to the feed scanners as one piece.
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: marquee\r\nConnection: close\r\n\r\n",
            path, host
        ),
    )
    .map_err(|_| FetchError::Io)?;
    socket
        .write_all(request.as_bytes())
        .await
        .map_err(|_| FetchError::Io)?;

    let mut response: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let take = n.min(FETCH_MAX - response.len());
                response.extend_from_slice(&chunk[..take]);
                if response.len() >= FETCH_MAX {
                    debug!("Response truncated at {} bytes", FETCH_MAX);
                    break;
                }
            }
            Err(_) => return Err(FetchError::Io),
        }
    }
    socket.abort();

    split_body(&response)
}

/// Validate the status line and slice off the header block.
fn split_body(response: &[u8]) -> Result<String, FetchError> {
    let header_end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or(FetchError::Status)?;

    let head = core::str::from_utf8(&response[..header_end]).map_err(|_| FetchError::Status)?;
    let status_line = head.lines().next().unwrap_or("");
    let ok = status_line.starts_with("HTTP/1.1 200") || status_line.starts_with("HTTP/1.0 200");
    if !ok {
        warn!("Feed returned {}", status_line);
        return Err(FetchError::Status);
    }

    let body = core::str::from_utf8(&response[header_end + 4..])
        .map_err(|_| FetchError::Encoding)?;
    Ok(String::from(body))
}
