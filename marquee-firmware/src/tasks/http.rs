//! HTTP API workers
//!
//! A small pool of TCP accept loops serving the REST API. Transport
//! concerns only: request-line and header parsing, body assembly, and
//! response framing. Routing and semantics live in `marquee-protocol`
//! and `marquee-core::api`; the engine lock is held just for the
//! synchronous handler call, so a slow client cannot stall the ticks.

use alloc::string::String;

use defmt::*;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::Write;

use marquee_core::api::{self, DeviceAction, SystemSnapshot};
use marquee_protocol::response::write_not_found;
use marquee_protocol::routes::parse_request;

use crate::channels::{epoch_now, SharedCell};

pub const HTTP_PORT: u16 = 80;

/// Two workers: one can sit in a slow response while the other keeps
/// accepting.
pub const HTTP_WORKER_COUNT: usize = 2;

const MAX_REQUEST_SIZE: usize = 2048;

#[embassy_executor::task(pool_size = HTTP_WORKER_COUNT)]
pub async fn http_worker(stack: Stack<'static>, shared: &'static SharedCell, worker_id: usize) {
    let mut rx_buf = [0u8; 2048];
    let mut tx_buf = [0u8; 2048];

    info!("HTTP worker {} starting (port {})", worker_id, HTTP_PORT);

    loop {
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_secs(10)));

        match socket.accept(HTTP_PORT).await {
            Ok(()) => {
                if let Err(e) = handle_connection(&mut socket, shared).await {
                    warn!("HTTP worker {} connection error: {:?}", worker_id, e);
                }
            }
            Err(e) => {
                warn!("HTTP worker {} accept error: {:?}", worker_id, e);
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.abort();
    }
}

async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    shared: &'static SharedCell,
) -> Result<(), embassy_net::tcp::Error> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0usize;

    // Read until the end of headers or the buffer is full.
    loop {
        let n = socket.read(&mut buf[total..]).await?;
        if n == 0 {
            if total == 0 {
                return Ok(());
            }
            break;
        }
        total += n;
        if total >= MAX_REQUEST_SIZE || buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    // Copy the small request tokens out of the buffer first; the body
    // reads below need the buffer mutably.
    let (method, path, header_end, content_length) = match parse_head(&buf[..total]) {
        Some((method, path, header_end, content_length)) => {
            let method: heapless::String<8> =
                heapless::String::try_from(method).unwrap_or_default();
            let path: heapless::String<128> =
                heapless::String::try_from(path).unwrap_or_default();
            (method, path, header_end, content_length)
        }
        None => {
            return respond(socket, "400 Bad Request", r#"{"error":"bad request"}"#, None).await;
        }
    };

    // Pull in the rest of the body for mutating requests.
    let body_end = (header_end + content_length).min(MAX_REQUEST_SIZE);
    while total < body_end {
        let n = socket.read(&mut buf[total..body_end]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }

    let body_str =
        core::str::from_utf8(&buf[header_end..total.max(header_end)]).unwrap_or("");

    let mut body = String::new();
    let (status_line, action) = match parse_request(&method, &path, body_str) {
        None => {
            debug!("Unknown route {} {}", method.as_str(), path.as_str());
            let _ = write_not_found(&mut body, &path);
            ("404 Not Found", None)
        }
        Some(request) => {
            let mut guard = shared.lock().await;
            let shared_ref = &mut *guard;
            let sys = snapshot();
            let outcome = api::handle(
                &mut shared_ref.engine,
                &mut shared_ref.store,
                &request,
                &sys,
                &mut body,
            );
            (outcome.status.status_line(), outcome.action)
        }
    };

    respond(socket, status_line, &body, action).await
}

/// Parse the request line and the Content-Length header. Returns
/// `(method, path, header_end, content_length)`.
fn parse_head(raw: &[u8]) -> Option<(&str, &str, usize, usize)> {
    let text = core::str::from_utf8(raw).ok()?;
    let header_end = text.find("\r\n\r\n")? + 4;

    let request_line = text.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }

    let mut content_length = 0usize;
    for line in text[..header_end].lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }

    Some((method, path, header_end, content_length.min(MAX_REQUEST_SIZE)))
}

async fn respond(
    socket: &mut TcpSocket<'_>,
    status_line: &str,
    body: &str,
    action: Option<DeviceAction>,
) -> Result<(), embassy_net::tcp::Error> {
    let mut head = String::new();
    let _ = core::fmt::write(
        &mut head,
        format_args!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            body.len()
        ),
    );

    socket.write_all(head.as_bytes()).await?;
    socket.write_all(body.as_bytes()).await?;
    socket.flush().await?;

    if let Some(DeviceAction::Reboot) = action {
        info!("Reboot requested via API");
        Timer::after(Duration::from_millis(250)).await;
        esp_hal::system::software_reset();
    }

    Ok(())
}

fn snapshot() -> SystemSnapshot {
    let uptime_s = Instant::now().as_secs() as u32;
    SystemSnapshot {
        uptime_s,
        free_heap: esp_alloc::HEAP.free() as u32,
        epoch_s: epoch_now(uptime_s),
    }
}
