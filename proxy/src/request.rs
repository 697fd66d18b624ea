//! # Client Request Parsing
//!
//! Reads an HTTP request line and headers off a buffered client stream,
//! extracting the fields the worker needs (method, absolute-URI host,
//! scheme, port, path) and preserving the remaining headers verbatim for
//! forwarding. Written without an external parsing crate, line-based the
//! way `hkv-client`'s RESP2 reader (`resp.rs`) is: state-free, top-down,
//! one `read_until` per line.
//!
//! Only absolute-form request lines (`GET http://host[:port]/path HTTP/1.x`)
//! are understood, since a forwarding proxy never receives origin-form
//! requests from a well-behaved client.

use std::io::BufRead;

use thiserror::Error;

/// Errors encountered while reading or parsing a client request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("connection closed before a request was received")]
    ConnectionClosed,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("malformed header line")]
    MalformedHeader,
    #[error("request method {0:?} is not implemented")]
    UnsupportedMethod(String),
    #[error("request scheme {0:?} is not implemented")]
    UnsupportedScheme(String),
    #[error("absolute-URI is missing a host")]
    MissingHost,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single forwarded header, preserved in client order.
#[derive(Debug, Clone)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A parsed client request, ready to be re-assembled for upstream.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub headers: Vec<Header>,
}

impl Request {
    /// The byte string used as the cache key: the request URI followed by a
    /// NUL terminator, matching the original's `strlen(uri) + 1` key length.
    pub fn cache_key(&self) -> Vec<u8> {
        let mut key = self.uri.clone().into_bytes();
        key.push(0);
        key
    }
}

const DEFAULT_HTTP_PORT: &str = "80";

/// Reads a full request (request line + headers) from `reader`, stopping at
/// the blank line that terminates the header block.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request, RequestError> {
    let mut line = String::new();
    read_line(reader, &mut line)?;
    let (method, uri) = parse_request_line(&line)?;

    if method != "GET" {
        return Err(RequestError::UnsupportedMethod(method));
    }

    let (scheme, host, port, path) = parse_absolute_uri(&uri)?;
    if scheme != "http" {
        return Err(RequestError::UnsupportedScheme(scheme));
    }

    let mut headers = Vec::new();
    loop {
        line.clear();
        read_line(reader, &mut line)?;
        if line.is_empty() {
            break;
        }
        headers.push(parse_header_line(&line)?);
    }

    Ok(Request {
        method,
        uri,
        host,
        port,
        path,
        headers,
    })
}

fn read_line<R: BufRead>(reader: &mut R, out: &mut String) -> Result<(), RequestError> {
    out.clear();
    let mut raw = Vec::new();
    let bytes = reader.read_until(b'\n', &mut raw)?;
    if bytes == 0 {
        return Err(RequestError::ConnectionClosed);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    *out = String::from_utf8(raw).map_err(|_| RequestError::MalformedRequestLine)?;
    Ok(())
}

fn parse_request_line(line: &str) -> Result<(String, String), RequestError> {
    let mut parts = line.split(' ');
    let method = parts.next().ok_or(RequestError::MalformedRequestLine)?;
    let uri = parts.next().ok_or(RequestError::MalformedRequestLine)?;
    let version = parts.next().ok_or(RequestError::MalformedRequestLine)?;
    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(RequestError::MalformedRequestLine);
    }
    Ok((method.to_string(), uri.to_string()))
}

/// Splits `scheme://host[:port][/path]` into its parts. `path` always
/// starts with `/`, defaulting to `/` when the URI names no path.
fn parse_absolute_uri(uri: &str) -> Result<(String, String, String, String), RequestError> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or(RequestError::MalformedRequestLine)?;

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return Err(RequestError::MissingHost);
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (host.to_string(), port.to_string())
        }
        _ => (authority.to_string(), DEFAULT_HTTP_PORT.to_string()),
    };

    Ok((scheme.to_string(), host, port, path.to_string()))
}

fn parse_header_line(line: &str) -> Result<Header, RequestError> {
    let (name, value) = line.split_once(':').ok_or(RequestError::MalformedHeader)?;
    Ok(Header {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
    })
}
