//! Hard data structures backing the caching proxy: a Robin-Hood hash map, a
//! circular LRU recency list, a byte-bounded cache built from the two, and a
//! reader/writer admission queue for fair concurrent access to that cache.
//!
//! This crate has no networking or protocol code in it — see the `proxy`
//! binary crate for that. It mirrors the teacher's split between its
//! engine crate (hard data structures) and its server/client crates
//! (networking glue).

pub mod admission;
pub mod cache;
pub mod error;
pub mod hashmap;
pub mod list;

pub use admission::{AdmissionQueue, ReadGuard, WriteGuard};
pub use cache::Cache;
pub use error::{Error, Result};
pub use hashmap::RobinHoodMap;
pub use list::{CircularList, NodeId};
