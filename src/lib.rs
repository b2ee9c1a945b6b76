//! # tickcache - A Concurrent, Sharded TTL Cache
//!
//! tickcache is a write-only, in-memory TTL cache written in Rust. Entries
//! are inserted with an implicit expiry governed by a shared wheel clock,
//! and expired entries are *pushed* to a user callback in whole-bucket
//! batches rather than pulled one at a time.
//!
//! ## Features
//!
//! - **Timing-Wheel Expiry**: each shard rotates a circular array of time
//!   buckets and harvests an aged bucket in O(bucket size), not O(cache size)
//! - **Shared-Nothing Shards**: one single-writer event loop per unit of
//!   host parallelism; no locks around hot state
//! - **Push Delivery**: a single dispatcher serializes the expiry callback,
//!   so batches arrive one at a time, in order
//! - **Pooled Buffers**: bucket maps are recycled through a shared pool to
//!   limit allocation churn
//! - **Async Writes**: built on Tokio; writes backpressure naturally against
//!   busy shards
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                             tickcache                              │
//! │                                                                    │
//! │  set(key, value, update_ttl)                                       │
//! │        │                                                           │
//! │     hash(key) % shards                                             │
//! │        │                                                           │
//! │        ▼                                                           │
//! │  ┌───────────┐   mailbox   ┌─────────────────────────────┐         │
//! │  │  Cache    │────────────>│ Shard event loop            │         │
//! │  │  (router) │             │  ┌────┬────┬────┬────┬────┐ │         │
//! │  └───────────┘             │  │ b0 │ b1 │ b2 │ .. │bM-1│ │  wheel  │
//! │                            │  └────┴────┴────┴────┴────┘ │         │
//! │                            │    tick: rotate + harvest   │         │
//! │                            └──────────────┬──────────────┘         │
//! │                                           │ bounded relay          │
//! │                                           ▼                        │
//! │                            ┌─────────────────────────────┐         │
//! │                            │ Dispatcher (one task)       │         │
//! │                            │  on_expire(&batch)          │         │
//! │                            │  recycle buffer to pool     │         │
//! │                            └─────────────────────────────┘         │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::collections::HashMap;
//! use std::time::Duration;
//! use tickcache::Cache;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Entries live ~10s, harvested in 100ms batches.
//!     let cache = Cache::new(
//!         Duration::from_secs(10),
//!         Duration::from_millis(100),
//!         |key: &String| xxhash_rust::xxh64::xxh64(key.as_bytes(), 0),
//!         |batch: &HashMap<String, u64>| {
//!             println!("{} entries expired together", batch.len());
//!         },
//!     )
//!     .unwrap();
//!
//!     // Insert; a repeat set with update_ttl=true restarts the window.
//!     cache.set("request:81".to_string(), 1, false).await;
//!     cache.set("request:81".to_string(), 2, true).await;
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`cache`]: the router, the per-shard timing-wheel loops, and the
//!   expiry dispatcher
//! - [`key`]: the sealed [`CacheKey`] trait bounding keys to `String` and
//!   `u64`
//!
//! ## Design Highlights
//!
//! ### Single-Writer Shards
//!
//! Every key hashes to exactly one shard, and each shard's wheel is owned
//! by one task that consumes a private mailbox and ticker. Exclusive
//! ownership replaces locking: there is no shard state two tasks can race
//! on. The one genuinely shared structure, the buffer pool, sits behind a
//! mutex.
//!
//! ### Bucketed Expiry
//!
//! There is no per-entry timestamp. An entry's remaining lifetime is
//! encoded entirely by which wheel bucket holds it, so expiring a tick's
//! worth of entries is a single map swap. The tradeoff is sub-tick
//! imprecision: an entry lives between `ttl - precision` and `ttl`.
//!
//! ### Backpressure over Buffering
//!
//! The relay between shards and dispatcher is bounded at the shard count,
//! and shard mailboxes hold a single write. A slow expiry callback
//! therefore slows harvesting, and busy shards slow their writers, instead
//! of queues growing without limit.

pub mod cache;
pub mod key;

// Re-export commonly used types for convenience
pub use cache::{Cache, ConfigError, MIN_TICK};
pub use key::CacheKey;

/// Version of tickcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
