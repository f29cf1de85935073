//! Persistent item cache.
//!
//! This module is agnostic of the remote API. It provides:
//! - a key/value store with per-key expiry and single-key atomic updates
//! - an identity-indexed merge of display items (newest wins, prune after refresh)
//! - a bounded blocking reader for consumers that must not touch the network

mod key;
mod merge;
mod reader;
mod storage;
mod traits;

pub use key::{CacheKey, QueryKey};
pub use merge::MergeEngine;
pub use reader::CacheReader;
pub use storage::{CacheRead, CacheStore, ReadOnlyStorage, SqliteStorage};
pub use traits::Cacheable;
