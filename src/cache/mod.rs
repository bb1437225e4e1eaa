//! Lectern cache layer
//!
//! Read-through caching of serialized article payloads:
//!
//! - **Keys**: `articles_all` for the listing, `article:<id>` per article,
//!   optionally namespaced by a prefix
//! - **Stores**: Redis for shared deployments, an in-process LRU, or a
//!   disabled backend that always misses
//! - **Coalescing**: optional single-flight for concurrent misses
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `lectern.toml`:
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! list_ttl_seconds = 60
//! item_ttl_seconds = 110
//! # ... see config.rs for all options
//! ```

mod config;
mod flight;
mod keys;
mod lock;
mod store;

pub use self::config::{CacheBackend, CacheConfig};
pub(crate) use self::config::{
    DEFAULT_CACHE_URL, DEFAULT_ITEM_TTL_SECS, DEFAULT_LIST_TTL_SECS, DEFAULT_MEMORY_CAPACITY,
    DEFAULT_OPERATION_TIMEOUT_MS,
};
pub(crate) use flight::METRIC_COALESCED_WAIT;
pub use flight::MissCoalescer;
pub use keys::{CacheKey, KeySpace};
pub use store::{CacheError, CacheStore, DisabledCache, MemoryCache};
