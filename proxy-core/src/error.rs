//! Error types shared across the cache, hash map, and admission queue.
//!
//! The original C implementation signals failure by returning `NULL` from
//! `cache_init`/`hashmap_resize`; callers were expected to treat that as
//! fatal for the current request. We make that explicit with a typed error.

/// Errors that can arise from `proxy-core` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The hash map would need to grow past its implementation-defined
    /// maximum bin count (`hashmap.c`'s `HASHMAP_MAX`).
    #[error("hash map exceeded the maximum bin count")]
    HashMapTooLarge,
}

/// Result alias used throughout `proxy-core`.
pub type Result<T> = std::result::Result<T, Error>;
