//! Cache Router and Expiry Dispatcher
//!
//! The [`Cache`] is the public face of the crate. It owns every shard,
//! routes each write to exactly one of them by hashing the key, and runs the
//! single background loop that delivers harvested batches to the user
//! callback.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Cache                              │
//! │                                                              │
//! │   set(key, value) ──hash──> ┌─────────┐                      │
//! │                             │ Shard 0 │──┐                   │
//! │                             ├─────────┤  │   bounded relay   │
//! │                             │ Shard 1 │──┼──> ┌──────────┐   │
//! │                             ├─────────┤  │    │Dispatcher│──>│──> on_expire(batch)
//! │                             │ Shard N │──┘    └──────────┘   │
//! │                             └─────────┘            │         │
//! │                                  ▲                 │         │
//! │                                  └── BufferPool <──┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **One dispatcher**: batches from every shard funnel through a single
//!    loop, so the callback never runs concurrently with itself and batches
//!    arrive in relay order. The cost is that a slow callback throttles
//!    expiry for the whole cache once the relay fills.
//! 2. **Bounded relay**: capacity equals the shard count, so each shard can
//!    have roughly one unconsumed batch in flight before its tick handler
//!    blocks.
//! 3. **Unsigned routing**: the shard index is `hash % shard_count` in `u64`
//!    arithmetic end to end. No sign folding, no negative remainders.
//! 4. **Isolated callback**: a panic inside the user callback is caught and
//!    logged; delivery of subsequent batches continues in order.

use crate::cache::pool::BufferPool;
use crate::cache::shard::Shard;
use crate::key::CacheKey;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Smallest ttl or precision the wheel clock resolves.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Errors that can occur while constructing a [`Cache`].
///
/// This is the only error the crate produces; every runtime operation is
/// infallible by construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// ttl is below the 1ms wheel resolution
    #[error("ttl must be at least 1ms, got {0:?}")]
    TtlTooShort(Duration),

    /// precision is below the 1ms wheel resolution
    #[error("precision must be at least 1ms, got {0:?}")]
    PrecisionTooShort(Duration),

    /// ttl / precision would leave a wheel of fewer than two buckets
    #[error("ttl {ttl:?} over precision {precision:?} leaves fewer than two wheel buckets")]
    DegenerateWheel { ttl: Duration, precision: Duration },

    /// ttl is not an exact multiple of precision
    #[error("ttl {ttl:?} is not evenly divisible by precision {precision:?}")]
    NotDivisible { ttl: Duration, precision: Duration },
}

/// The callback invoked with each harvested batch.
type ExpireFn<K, V> = Box<dyn Fn(&HashMap<K, V>) + Send>;

/// A write-only, sharded TTL cache.
///
/// Entries inserted with [`set`](Cache::set) live for the configured ttl
/// (rounded down to the wheel precision) and are then pushed, a bucket at a
/// time, to the `on_expire` callback supplied at construction. There is no
/// read path: the cache is a dedup window, not a lookup table.
///
/// The cache spawns one worker task per shard plus one dispatcher task, so
/// [`Cache::new`] must be called from within a Tokio runtime. Dropping the
/// cache closes every shard mailbox, which winds the workers and the
/// dispatcher down; entries still on the wheel at that point are discarded,
/// not delivered.
///
/// # Example
///
/// ```ignore
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use tickcache::Cache;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = Cache::new(
///         Duration::from_secs(10),
///         Duration::from_millis(100),
///         |key: &String| xxhash_rust::xxh64::xxh64(key.as_bytes(), 0),
///         |batch: &HashMap<String, String>| println!("{} entries expired", batch.len()),
///     )
///     .unwrap();
///
///     cache.set("session:1".to_string(), "token".to_string(), false).await;
/// }
/// ```
pub struct Cache<K: CacheKey, V> {
    hasher: Box<dyn Fn(&K) -> u64 + Send + Sync>,
    shards: Vec<Shard<K, V>>,
}

impl<K: CacheKey, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl<K: CacheKey, V: Send + 'static> Cache<K, V> {
    /// Creates a cache and starts its shard workers and dispatcher.
    ///
    /// The wheel geometry is fixed here: `ttl / precision` buckets per
    /// shard, one shard per unit of host parallelism. `hasher` is used only
    /// to pick a shard; it must be deterministic for the lifetime of the
    /// cache.
    ///
    /// # Errors
    ///
    /// Fails when ttl or precision is below [`MIN_TICK`], when ttl is not an
    /// exact multiple of precision, or when the pair yields a wheel of fewer
    /// than two buckets.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use std::time::Duration;
    /// use tickcache::Cache;
    ///
    /// // A one-bucket wheel cannot tell "fresh" from "a revolution old".
    /// let result = Cache::<String, u32>::new(
    ///     Duration::from_millis(100),
    ///     Duration::from_millis(100),
    ///     |_key| 0,
    ///     |_batch: &HashMap<String, u32>| {},
    /// );
    /// assert!(result.is_err());
    /// ```
    pub fn new<H, F>(
        ttl: Duration,
        precision: Duration,
        hasher: H,
        on_expire: F,
    ) -> Result<Self, ConfigError>
    where
        H: Fn(&K) -> u64 + Send + Sync + 'static,
        F: Fn(&HashMap<K, V>) + Send + 'static,
    {
        validate(ttl, precision)?;

        // Fixed for the cache's lifetime, honoring cgroup CPU limits.
        let shard_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let pool = Arc::new(BufferPool::new());
        let (relay_tx, relay_rx) = mpsc::channel(shard_count);

        let shards = (0..shard_count)
            .map(|id| Shard::spawn(id, ttl, precision, relay_tx.clone(), Arc::clone(&pool)))
            .collect();

        tokio::spawn(dispatch(relay_rx, Box::new(on_expire) as ExpireFn<K, V>, pool));

        info!(
            shards = shard_count,
            buckets = (ttl.as_nanos() / precision.as_nanos()) as usize,
            ?ttl,
            ?precision,
            "cache started"
        );

        Ok(Self {
            hasher: Box::new(hasher),
            shards,
        })
    }

    /// Inserts or refreshes an entry.
    ///
    /// The entry expires a full wheel revolution after the tick window it
    /// was inserted in. Semantics for a key this shard already tracks:
    ///
    /// - `update_ttl == false`: complete no-op. The stored value and the
    ///   original expiry both stand.
    /// - `update_ttl == true`: the entry is re-inserted with `value` and a
    ///   freshly restarted ttl window.
    ///
    /// The call resolves once the owning shard's event loop has accepted the
    /// write; a shard stalled behind a full relay (slow expiry callback)
    /// backpressures its callers here.
    pub async fn set(&self, key: K, value: V, update_ttl: bool) {
        let shard = ((self.hasher)(&key) % self.shards.len() as u64) as usize;
        self.shards[shard].set(key, value, update_ttl).await;
    }

    /// Number of shards the keyspace is partitioned into.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

fn validate(ttl: Duration, precision: Duration) -> Result<(), ConfigError> {
    if ttl < MIN_TICK {
        return Err(ConfigError::TtlTooShort(ttl));
    }
    if precision < MIN_TICK {
        return Err(ConfigError::PrecisionTooShort(precision));
    }
    if ttl.as_nanos() / precision.as_nanos() < 2 {
        return Err(ConfigError::DegenerateWheel { ttl, precision });
    }
    if ttl.as_nanos() % precision.as_nanos() != 0 {
        return Err(ConfigError::NotDivisible { ttl, precision });
    }
    Ok(())
}

/// Drains harvested batches from every shard, in arrival order, and feeds
/// them to the user callback one at a time.
///
/// This loop is the only place the callback runs, which is what serializes
/// delivery. It exits when the last shard worker drops its relay sender.
async fn dispatch<K, V>(
    mut relay: mpsc::Receiver<HashMap<K, V>>,
    on_expire: ExpireFn<K, V>,
    pool: Arc<BufferPool<K, V>>,
) {
    while let Some(mut batch) = relay.recv().await {
        // A panicking callback must not take the dispatcher down with it;
        // later batches still have to be delivered.
        if catch_unwind(AssertUnwindSafe(|| on_expire(&batch))).is_err() {
            error!(expired = batch.len(), "expiry callback panicked");
        }

        debug!(expired = batch.len(), "batch dispatched");

        batch.clear();
        pool.put(batch);
    }

    debug!("dispatcher stopped");
}
