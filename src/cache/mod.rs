//! Sharded TTL Cache Module
//!
//! This module provides the cache core: the router/dispatcher in
//! [`engine`], the per-shard timing-wheel event loops in `shard`, and the
//! shared buffer pool in `pool`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Cache                              │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐       │
//! │  │ Shard 0  │ │ Shard 1  │ │ Shard 2  │ │ Shard N  │       │
//! │  │ wheel +  │ │ wheel +  │ │ wheel +  │ │ wheel +  │       │
//! │  │ mailbox  │ │ mailbox  │ │ mailbox  │ │ mailbox  │       │
//! │  └────┬─────┘ └────┬─────┘ └────┬─────┘ └────┬─────┘       │
//! │       └────────────┴─────┬──────┴────────────┘             │
//! │                  bounded relay channel                     │
//! │                          │                                 │
//! │                  ┌───────▼────────┐                        │
//! │                  │   Dispatcher   │──> on_expire(batch)    │
//! │                  └────────────────┘                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only [`Cache`] and [`ConfigError`] are public; shards and the pool are
//! implementation detail behind the write path.

pub mod engine;

mod pool;
mod shard;

// Re-export commonly used types
pub use engine::{Cache, ConfigError, MIN_TICK};
