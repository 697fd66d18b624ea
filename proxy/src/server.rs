//! # Accept Loop
//!
//! Binds the listening socket and spawns one detached OS thread per
//! accepted connection, matching `main`'s accept loop and
//! `thread_handle_relay`'s self-detaching semantics in the original: the
//! spawned thread is never joined, so it cleans up on exit the way a
//! `pthread_detach`'d thread does.

use std::net::TcpListener;

use tracing::{error, info, warn};

use crate::worker::Proxy;

/// Binds `port` and serves connections until the process is terminated.
/// Never returns on success; accept errors are logged and skipped rather
/// than treated as fatal, matching the original's accept-loop error policy.
pub fn run(port: u16, proxy: Proxy) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!(port, "listening for connections");

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let proxy = proxy.clone();
        std::thread::spawn(move || {
            proxy.handle_connection(stream, peer);
        });
    }

    error!("accept loop exited unexpectedly");
    Ok(())
}
