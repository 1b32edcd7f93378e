//! Single readiness checks against a service endpoint.
//!
//! A check opens a TCP connection and, depending on the endpoint protocol,
//! performs the smallest exchange that proves the service is actually
//! serving rather than just listening.

use super::endpoint::{Protocol, ServiceEndpoint};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Route answered by the framework once a site can serve requests.
pub const HTTP_PING_PATH: &str = "/api/method/ping";

/// MySQL wire protocol version announced in the server greeting.
const MYSQL_PROTOCOL_VERSION: u8 = 0x0a;

/// MySQL packet marker for an error packet.
const MYSQL_ERR_PACKET: u8 = 0xff;

/// Performs one readiness check.
pub trait Probe {
    /// Check `endpoint` once, giving up after `timeout`.
    ///
    /// Returns a short reason on failure.
    fn check(&self, endpoint: &ServiceEndpoint, timeout: Duration) -> Result<(), String>;
}

/// Probes real services over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkProbe;

impl Probe for NetworkProbe {
    fn check(&self, endpoint: &ServiceEndpoint, timeout: Duration) -> Result<(), String> {
        let mut stream = connect(endpoint, timeout)?;
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .map_err(|e| e.to_string())?;

        match endpoint.protocol {
            Protocol::Tcp => Ok(()),
            Protocol::Http => http_ping(&mut stream, endpoint),
            Protocol::Mysql => mysql_greeting(&mut stream),
            Protocol::Redis => redis_ping(&mut stream),
        }
    }
}

fn connect(endpoint: &ServiceEndpoint, timeout: Duration) -> Result<TcpStream, String> {
    let addrs = endpoint
        .address()
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve {}: {}", endpoint.host, e))?;

    let mut last_error = format!("no addresses for {}", endpoint.host);
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = format!("{}: {}", addr, e),
        }
    }
    Err(last_error)
}

fn http_ping(stream: &mut TcpStream, endpoint: &ServiceEndpoint) -> Result<(), String> {
    let request = format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n\r\n",
        endpoint.http_path(),
        endpoint.address()
    );
    stream
        .write_all(request.as_bytes())
        .map_err(|e| e.to_string())?;

    let mut status_line = String::new();
    BufReader::new(stream)
        .read_line(&mut status_line)
        .map_err(|e| e.to_string())?;

    let status = parse_http_status(&status_line)?;
    if (200..400).contains(&status) {
        Ok(())
    } else {
        Err(format!("HTTP {}", status))
    }
}

/// Extract the status code from an HTTP status line.
pub fn parse_http_status(line: &str) -> Result<u16, String> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse()
            .map_err(|_| format!("malformed status line: {}", line.trim())),
        _ if line.trim().is_empty() => Err("connection closed without response".to_string()),
        _ => Err(format!("malformed status line: {}", line.trim())),
    }
}

fn mysql_greeting(stream: &mut TcpStream) -> Result<(), String> {
    // 4-byte packet header followed by the first payload byte.
    let mut head = [0u8; 5];
    stream
        .read_exact(&mut head)
        .map_err(|e| format!("no greeting: {}", e))?;

    if head[4] == MYSQL_ERR_PACKET {
        let mut rest = Vec::new();
        let _ = stream.take(512).read_to_end(&mut rest);
        return Err(parse_mysql_error(&rest));
    }
    check_mysql_greeting(&head)
}

/// Validate the start of a MySQL server greeting packet.
pub fn check_mysql_greeting(packet: &[u8]) -> Result<(), String> {
    match packet.get(4) {
        Some(&MYSQL_PROTOCOL_VERSION) => Ok(()),
        Some(&MYSQL_ERR_PACKET) => Err(parse_mysql_error(packet.get(5..).unwrap_or_default())),
        Some(other) => Err(format!("unexpected protocol version {}", other)),
        None => Err("truncated greeting".to_string()),
    }
}

/// Error packet body: 2-byte code, then the message.
fn parse_mysql_error(body: &[u8]) -> String {
    if body.len() < 2 {
        return "server refused connection".to_string();
    }
    let code = u16::from_le_bytes([body[0], body[1]]);
    let message = String::from_utf8_lossy(&body[2..]);
    let message = message.trim_start_matches('#');
    // Skip the 5-byte SQL state if present.
    let message = message.get(5..).filter(|_| body.get(2) == Some(&b'#')).unwrap_or(message);
    format!("server error {}: {}", code, message.trim())
}

fn redis_ping(stream: &mut TcpStream) -> Result<(), String> {
    stream.write_all(b"PING\r\n").map_err(|e| e.to_string())?;

    let mut reply = String::new();
    BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| e.to_string())?;

    check_redis_reply(&reply)
}

/// A reply proves readiness unless the server is still loading its dataset.
pub fn check_redis_reply(reply: &str) -> Result<(), String> {
    let reply = reply.trim();
    if reply.starts_with("+PONG") || reply.starts_with("-NOAUTH") {
        Ok(())
    } else if reply.is_empty() {
        Err("connection closed without reply".to_string())
    } else {
        Err(format!("unexpected reply: {}", reply))
    }
}
