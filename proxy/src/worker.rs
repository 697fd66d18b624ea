//! # Per-Connection Worker
//!
//! The full request lifecycle for one accepted client connection: parse,
//! cache lookup, upstream fetch, relay, cache insert. Mirrors
//! `thread_handle_relay` in the original, replacing its global `g_cache`/
//! `g_rw_queue` with an explicit [`Proxy`] handle passed to every worker, as
//! `SPEC_FULL.md`'s "Global mutable state" design note prescribes.

use std::io::{BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use proxy_core::{AdmissionQueue, Cache};
use tracing::{debug, info, info_span, warn};

use crate::config::MAX_OBJECT_SIZE;
use crate::request::{self, RequestError};
use crate::response;
use crate::upstream::{self, UpstreamError};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Monotonic counter handing out request ids for worker spans. Not a
/// protocol-visible identifier, just something to correlate a connection's
/// log lines with each other.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Shared state handed to every worker: the cache and the admission queue
/// that serializes access to it.
#[derive(Clone)]
pub struct Proxy {
    cache: Arc<RwLock<Cache>>,
    admission: AdmissionQueue,
}

impl Proxy {
    /// Creates a proxy with a cache bounded to `max_cache_size` bytes.
    pub fn new(max_cache_size: usize) -> Self {
        Proxy {
            cache: Arc::new(RwLock::new(Cache::new(max_cache_size))),
            admission: AdmissionQueue::new(),
        }
    }

    /// Handles one accepted client connection to completion. Every error
    /// path still closes the connection cleanly; nothing here panics on
    /// a misbehaving client or upstream.
    pub fn handle_connection(&self, client_stream: TcpStream, peer: String) {
        let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("connection", request_id, peer = %peer);
        let _entered = span.enter();

        if let Err(err) = self.serve(client_stream) {
            debug!(error = %err, "connection ended with an error");
        }
    }

    fn serve(&self, mut client_stream: TcpStream) -> std::io::Result<()> {
        let mut reader = BufReader::new(client_stream.try_clone()?);
        let request = match request::read_request(&mut reader) {
            Ok(request) => request,
            Err(RequestError::ConnectionClosed) => return Ok(()),
            Err(RequestError::UnsupportedMethod(method)) => {
                warn!(method, "rejecting unimplemented method");
                return response::client_error(
                    &mut client_stream,
                    "501",
                    "Not Implemented",
                    "Proxy does not implement this method",
                );
            }
            Err(RequestError::UnsupportedScheme(scheme)) => {
                warn!(scheme, "rejecting unimplemented scheme");
                return response::client_error(
                    &mut client_stream,
                    "501",
                    "Not Implemented",
                    "Proxy does not implement this scheme",
                );
            }
            Err(err) => {
                debug!(error = %err, "malformed request");
                return response::client_error(
                    &mut client_stream,
                    "400",
                    "Bad Request",
                    "Proxy could not parse the request",
                );
            }
        };

        let key = request.cache_key();
        info!(uri = %request.uri, "handling request");

        if let Some(body) = self.lookup(&key) {
            debug!(uri = %request.uri, "cache hit");
            self.touch(&key);
            return client_stream.write_all(&body);
        }
        debug!(uri = %request.uri, "cache miss");

        match self.fetch_and_relay(&request, &mut client_stream) {
            Ok(Some(body)) => {
                let size = body.len();
                let accepted = self.insert(&key, body);
                if accepted {
                    info!(uri = %request.uri, size, "cached upstream response");
                } else {
                    debug!(uri = %request.uri, size, "upstream response not cached");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(uri = %request.uri, error = %err, "upstream fetch failed");
            }
        }
        Ok(())
    }

    /// Copies the cached payload out under read admission, per the
    /// prescribed fix for the original's use-after-evict bug: no reference
    /// into the cache escapes the held admission window.
    fn lookup(&self, key: &[u8]) -> Option<Vec<u8>> {
        let _guard = self.admission.acquire_read();
        self.cache.read().peek(key)
    }

    /// Promotes a hit to most-recently-used. This mutates the recency list,
    /// so it runs under write admission even though no bytes change, per
    /// the "any cache call that may mutate the recency list runs under
    /// write admission" rule.
    fn touch(&self, key: &[u8]) {
        let _guard = self.admission.acquire_write();
        self.cache.write().touch(key);
    }

    /// Stores `value` under `key`. Returns whether the cache actually
    /// accepted it (it may reject an oversized body or a key inserted
    /// concurrently by another worker).
    fn insert(&self, key: &[u8], value: Vec<u8>) -> bool {
        let _guard = self.admission.acquire_write();
        self.cache.write().insert(key, value)
    }

    fn fetch_and_relay(
        &self,
        request: &crate::request::Request,
        client_stream: &mut TcpStream,
    ) -> Result<Option<Vec<u8>>, UpstreamError> {
        let server_stream = upstream::connect(&request.host, &request.port)?;
        upstream::apply_timeouts(&server_stream, UPSTREAM_TIMEOUT)?;

        let assembled = upstream::assemble_request(request);
        let mut write_stream = server_stream.try_clone()?;
        write_stream.write_all(&assembled)?;

        let outcome = upstream::relay(server_stream, client_stream, MAX_OBJECT_SIZE)?;
        Ok(outcome.cacheable_body)
    }
}
