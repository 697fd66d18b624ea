//! # Upstream Request Assembly and Response Relay
//!
//! Rewrites a parsed client request into the fixed HTTP/1.0 form this proxy
//! always sends upstream, then relays the upstream response back to the
//! client chunk-by-chunk while accumulating it into a caller-provided buffer
//! for caching, matching `proxy.c`'s `assemble_request_str` and its
//! response-relay loop in `thread_handle_relay`.

use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use thiserror::Error;

use crate::request::Request;

/// The literal User-Agent the original proxy always sends, regardless of
/// what the client sent.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:3.10.0) Gecko/20191101 Firefox/63.0.1";

const RESERVED_HEADERS: [&str; 3] = ["connection", "proxy-connection", "user-agent"];

/// Errors encountered talking to the upstream server.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to connect to upstream {host}:{port}")]
    Connect {
        host: String,
        port: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Builds the exact bytes of the HTTP/1.0 request sent upstream: the
/// rewritten request line, the three reserved headers, every other
/// client header verbatim, then the blank line terminator.
pub fn assemble_request(request: &Request) -> Vec<u8> {
    let mut out = Vec::new();
    let _ = write!(
        out,
        "{} {} HTTP/1.0\r\n\
Connection: close\r\n\
Proxy-Connection: close\r\n\
User-Agent: {}\r\n",
        request.method, request.uri, USER_AGENT
    );

    for header in &request.headers {
        if RESERVED_HEADERS.contains(&header.name.to_ascii_lowercase().as_str()) {
            continue;
        }
        let _ = write!(out, "{}: {}\r\n", header.name, header.value);
    }

    out.extend_from_slice(b"\r\n");
    out
}

/// Opens a connection to the upstream named by `host`/`port`.
pub fn connect(host: &str, port: &str) -> Result<TcpStream, UpstreamError> {
    let addr = format!("{host}:{port}");
    TcpStream::connect(&addr).map_err(|source| UpstreamError::Connect {
        host: host.to_string(),
        port: port.to_string(),
        source,
    })
}

/// Outcome of relaying an upstream response to the client.
pub struct RelayOutcome {
    /// Total bytes relayed to the client.
    pub bytes_relayed: usize,
    /// The accumulated response body, present only if it never exceeded
    /// `max_object_size` and is therefore eligible for caching.
    pub cacheable_body: Option<Vec<u8>>,
}

/// Reads the upstream response in chunks, writing each chunk to `client` as
/// soon as it arrives, while accumulating up to `max_object_size` bytes for
/// a later cache insert. Accumulation is abandoned (but relaying continues)
/// the moment the body would exceed `max_object_size`, matching the
/// original's `cache_buf` flag.
pub fn relay<S: Read, C: Write>(
    server: S,
    client: &mut C,
    max_object_size: usize,
) -> Result<RelayOutcome, UpstreamError> {
    let mut server = BufReader::with_capacity(8 * 1024, server);
    let mut chunk = [0u8; 8 * 1024];
    let mut accumulated = Vec::with_capacity(max_object_size.min(8 * 1024));
    let mut cacheable = true;
    let mut bytes_relayed = 0usize;

    loop {
        let read = server.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        client.write_all(&chunk[..read])?;
        bytes_relayed += read;

        if cacheable {
            if accumulated.len() + read > max_object_size {
                cacheable = false;
                accumulated.clear();
            } else {
                accumulated.extend_from_slice(&chunk[..read]);
            }
        }
    }

    Ok(RelayOutcome {
        bytes_relayed,
        cacheable_body: if cacheable { Some(accumulated) } else { None },
    })
}

/// Sets conservative read/write timeouts on an upstream connection so a
/// stalled server cannot pin a worker thread forever.
pub fn apply_timeouts(stream: &TcpStream, timeout: Duration) -> std::io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Header;

    fn sample_request() -> Request {
        Request {
            method: "GET".to_string(),
            uri: "http://example.com/a".to_string(),
            host: "example.com".to_string(),
            port: "80".to_string(),
            path: "/a".to_string(),
            headers: vec![
                Header {
                    name: "Host".to_string(),
                    value: "example.com".to_string(),
                },
                Header {
                    name: "Connection".to_string(),
                    value: "keep-alive".to_string(),
                },
                Header {
                    name: "User-Agent".to_string(),
                    value: "curl/8.0".to_string(),
                },
            ],
        }
    }

    #[test]
    fn assembles_request_with_reserved_headers_and_drops_client_overrides() {
        let request = sample_request();
        let assembled = String::from_utf8(assemble_request(&request)).unwrap();

        assert!(assembled.starts_with("GET http://example.com/a HTTP/1.0\r\n"));
        assert!(assembled.contains("Connection: close\r\n"));
        assert!(assembled.contains("Proxy-Connection: close\r\n"));
        assert!(assembled.contains(&format!("User-Agent: {USER_AGENT}\r\n")));
        assert!(assembled.contains("Host: example.com\r\n"));
        assert!(!assembled.contains("keep-alive"));
        assert!(!assembled.contains("curl/8.0"));
        assert!(assembled.ends_with("\r\n\r\n"));
    }

    #[test]
    fn relay_accumulates_small_responses() {
        let body = b"HTTP/1.0 200 OK\r\n\r\nhello world".to_vec();
        let mut client = Vec::new();
        let outcome = relay(std::io::Cursor::new(body.clone()), &mut client, 1024).unwrap();

        assert_eq!(client, body);
        assert_eq!(outcome.bytes_relayed, body.len());
        assert_eq!(outcome.cacheable_body, Some(body));
    }

    #[test]
    fn relay_gives_up_caching_past_max_object_size_but_keeps_relaying() {
        let body = vec![b'x'; 64];
        let mut client = Vec::new();
        let outcome = relay(std::io::Cursor::new(body.clone()), &mut client, 16).unwrap();

        assert_eq!(client, body, "full body still relayed to the client");
        assert_eq!(outcome.bytes_relayed, body.len());
        assert_eq!(outcome.cacheable_body, None);
    }
}
