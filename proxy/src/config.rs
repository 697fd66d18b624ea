//! # Runtime Configuration
//!
//! Command-line surface for the proxy: `proxy <port> [-v]`. Parsed with
//! `clap`'s derive API the way `examples/abhijeetbhagat-atlas` and
//! `examples/other_examples/manifests/Borislavv-rs-adv-cache` front their own
//! cache/proxy servers, even though the teacher workspace itself never
//! parses a CLI.

use clap::Parser;

/// Maximum total bytes held by the object cache.
pub const MAX_CACHE_SIZE: usize = 1024 * 1024;
/// Maximum bytes of a single response that may be cached.
pub const MAX_OBJECT_SIZE: usize = 100 * 1024;

/// Multithreaded caching HTTP/1.0 forwarding proxy.
#[derive(Debug, Parser)]
#[command(name = "proxy", version, about)]
pub struct Config {
    /// TCP port to listen on.
    pub port: u16,

    /// Enable verbose diagnostic logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Config {
    /// Parses configuration from the process's command-line arguments.
    pub fn parse_args() -> Self {
        Config::parse()
    }
}
