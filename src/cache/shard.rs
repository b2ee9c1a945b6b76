//! Shard Event Loop and Timing Wheel
//!
//! Each shard owns one partition of the keyspace and expires it with a
//! timing wheel: a circular array of `M = ttl / precision` buckets, where
//! each bucket holds the entries scheduled to age out in the same tick
//! window.
//!
//! ```text
//!                  active (accepts inserts)
//!                    │
//!                    ▼
//!        ┌────┬────┬────┬────┬────┐
//!        │ b0 │ b1 │ b2 │ b3 │ b4 │   M = 5 buckets
//!        └────┴────┴────┴────┴────┘
//!                         ▲
//!                         │
//!          harvested on the next tick
//!          (one full revolution old)
//! ```
//!
//! Every `precision` interval the wheel turns one slot: the bucket the
//! active pointer is about to reoccupy has held its entries for a full
//! revolution, so its contents are harvested as a single batch and the
//! active pointer moves onto the freshly emptied slot. An entry inserted
//! into the active bucket therefore lives at least `(M - 1) * precision`
//! and at most `M * precision`, depending on the tick phase at insertion.
//!
//! ## Concurrency Model
//!
//! A shard's wheel, key index, and active pointer are touched by exactly one
//! task: the worker spawned in [`Shard::spawn`]. Writes arrive through a
//! capacity-1 mailbox and ticks from a wall-clock interval, multiplexed with
//! `select!`. No lock guards any of this state; exclusivity comes from the
//! single consumer.
//!
//! Harvested batches are sent into the shared relay channel. When the relay
//! is full the send blocks the worker, which in turn blocks callers trying
//! to write to this shard. That backpressure is deliberate: a slow expiry
//! callback throttles producers instead of letting batches pile up.

use crate::cache::pool::BufferPool;
use crate::key::CacheKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// A write bound for one shard's event loop.
pub(crate) struct Insert<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) update_ttl: bool,
}

/// Handle to a running shard. Owned by the cache router; the worker task it
/// spawned exits once every handle is dropped.
pub(crate) struct Shard<K, V> {
    mailbox: mpsc::Sender<Insert<K, V>>,
}

impl<K: CacheKey, V: Send + 'static> Shard<K, V> {
    /// Allocates the shard's wheel from the pool and spawns its worker task.
    ///
    /// `ttl / precision` must already be validated to be an integer of at
    /// least 2 (done once, at cache construction).
    pub(crate) fn spawn(
        id: usize,
        ttl: Duration,
        precision: Duration,
        relay: mpsc::Sender<HashMap<K, V>>,
        pool: Arc<BufferPool<K, V>>,
    ) -> Self {
        let buckets = (ttl.as_nanos() / precision.as_nanos()) as usize;
        let (mailbox_tx, mailbox_rx) = mpsc::channel(1);

        let worker = ShardWorker {
            id,
            precision,
            active: 0,
            wheel: (0..buckets).map(|_| pool.get()).collect(),
            index: HashMap::new(),
            mailbox: mailbox_rx,
            relay,
            pool,
        };

        tokio::spawn(worker.run());

        Self {
            mailbox: mailbox_tx,
        }
    }

    /// Hands a write to the worker, waiting until its loop accepts it.
    pub(crate) async fn set(&self, key: K, value: V, update_ttl: bool) {
        let request = Insert {
            key,
            value,
            update_ttl,
        };

        // Fails only while the worker is winding down (cache being dropped);
        // the write is silently discarded.
        let _ = self.mailbox.send(request).await;
    }
}

/// Worker-private state. Nothing outside [`ShardWorker::run`] touches it.
struct ShardWorker<K, V> {
    id: usize,
    precision: Duration,

    /// Index of the bucket currently accepting inserts.
    active: usize,
    /// The circular bucket array, rotated one slot per tick.
    wheel: Vec<HashMap<K, V>>,
    /// key -> index of the wheel bucket currently holding it.
    index: HashMap<K, usize>,

    mailbox: mpsc::Receiver<Insert<K, V>>,
    relay: mpsc::Sender<HashMap<K, V>>,
    pool: Arc<BufferPool<K, V>>,
}

impl<K: CacheKey, V: Send + 'static> ShardWorker<K, V> {
    async fn run(mut self) {
        // First tick one full precision after startup, not immediately.
        let mut ticker = time::interval_at(Instant::now() + self.precision, self.precision);
        // Mirror a wall-clock ticker: a late wheel turn coalesces missed
        // ticks instead of bursting to catch up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                request = self.mailbox.recv() => match request {
                    Some(request) => self.insert(request),
                    // All senders dropped: no further writes can arrive.
                    None => break,
                },
                _ = ticker.tick() => self.turn().await,
            }
        }

        debug!(shard = self.id, "shard worker stopped");
    }

    /// Applies one write to the wheel.
    fn insert(&mut self, request: Insert<K, V>) {
        if let Some(&bucket) = self.index.get(&request.key) {
            if !request.update_ttl {
                // Tracked key, no refresh requested: value and placement
                // both stay as they are.
                return;
            }
            self.index.remove(&request.key);
            self.wheel[bucket].remove(&request.key);
        }

        self.index.insert(request.key.clone(), self.active);
        self.wheel[self.active].insert(request.key, request.value);
    }

    /// Turns the wheel one slot.
    ///
    /// The slot the active pointer is about to reoccupy has aged a full
    /// revolution; if it holds entries they are harvested in one swap and
    /// relayed to the dispatcher. The pointer advances whether or not
    /// anything was harvested.
    async fn turn(&mut self) {
        let expire = (self.active + 1) % self.wheel.len();

        if !self.wheel[expire].is_empty() {
            let harvested = std::mem::replace(&mut self.wheel[expire], self.pool.get());

            for key in harvested.keys() {
                self.index.remove(key);
            }

            debug!(shard = self.id, expired = harvested.len(), "bucket harvested");

            // Blocks while the relay is full; inserts queue up behind this
            // send until the dispatcher drains a batch.
            if self.relay.send(harvested).await.is_err() {
                // Dispatcher gone, teardown in progress.
                return;
            }
        }

        self.active = expire;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(
        buckets: usize,
    ) -> (
        ShardWorker<String, u32>,
        mpsc::Receiver<HashMap<String, u32>>,
    ) {
        let pool = Arc::new(BufferPool::new());
        let (relay_tx, relay_rx) = mpsc::channel(8);
        let (_, mailbox_rx) = mpsc::channel(1);

        let worker = ShardWorker {
            id: 0,
            precision: Duration::from_millis(100),
            active: 0,
            wheel: (0..buckets).map(|_| pool.get()).collect(),
            index: HashMap::new(),
            mailbox: mailbox_rx,
            relay: relay_tx,
            pool,
        };

        (worker, relay_rx)
    }

    fn insert(worker: &mut ShardWorker<String, u32>, key: &str, value: u32, update_ttl: bool) {
        worker.insert(Insert {
            key: key.to_string(),
            value,
            update_ttl,
        });
    }

    /// Index and wheel must always describe the same set of keys.
    fn assert_consistent(worker: &ShardWorker<String, u32>) {
        for (key, &bucket) in &worker.index {
            assert!(
                worker.wheel[bucket].contains_key(key),
                "indexed key missing from its bucket"
            );
        }

        let in_wheel: usize = worker.wheel.iter().map(|b| b.len()).sum();
        assert_eq!(in_wheel, worker.index.len(), "orphaned or duplicated keys");
    }

    #[tokio::test]
    async fn insert_lands_in_active_bucket() {
        let (mut worker, _relay) = worker(5);

        insert(&mut worker, "a", 1, false);

        assert_eq!(worker.index["a"], 0);
        assert_eq!(worker.wheel[0]["a"], 1);
        assert_consistent(&worker);
    }

    #[tokio::test]
    async fn tracked_key_without_refresh_is_a_noop() {
        let (mut worker, _relay) = worker(5);

        insert(&mut worker, "a", 1, false);
        worker.turn().await;
        worker.turn().await;

        // Neither the value nor the placement may change.
        insert(&mut worker, "a", 99, false);

        assert_eq!(worker.index["a"], 0);
        assert_eq!(worker.wheel[0]["a"], 1);
        assert_consistent(&worker);
    }

    #[tokio::test]
    async fn refresh_moves_key_to_active_bucket() {
        let (mut worker, _relay) = worker(5);

        insert(&mut worker, "a", 1, false);
        worker.turn().await;
        worker.turn().await;
        assert_eq!(worker.active, 2);

        insert(&mut worker, "a", 2, true);

        assert_eq!(worker.index["a"], 2);
        assert!(worker.wheel[0].is_empty());
        assert_eq!(worker.wheel[2]["a"], 2);
        assert_consistent(&worker);
    }

    #[tokio::test]
    async fn harvest_happens_after_a_full_revolution() {
        let (mut worker, mut relay) = worker(3);

        insert(&mut worker, "a", 1, false);

        // Turns 1 and 2 pass over empty buckets.
        worker.turn().await;
        worker.turn().await;
        assert!(relay.try_recv().is_err());
        assert!(worker.index.contains_key("a"));

        // Turn 3 reoccupies bucket 0, harvesting it.
        worker.turn().await;
        let batch = relay.try_recv().expect("bucket should be harvested");
        assert_eq!(batch["a"], 1);

        assert!(worker.index.is_empty());
        assert!(worker.wheel.iter().all(|b| b.is_empty()));
        assert_consistent(&worker);
    }

    #[tokio::test]
    async fn empty_buckets_are_not_relayed() {
        let (mut worker, mut relay) = worker(3);

        for _ in 0..10 {
            worker.turn().await;
        }

        assert!(relay.try_recv().is_err());
        assert_eq!(worker.active, 10 % 3);
    }

    #[tokio::test]
    async fn keys_from_different_ticks_expire_separately() {
        let (mut worker, mut relay) = worker(3);

        insert(&mut worker, "a", 1, false);
        worker.turn().await;
        insert(&mut worker, "b", 2, false);

        worker.turn().await;
        worker.turn().await;
        let batch = relay.try_recv().expect("first bucket harvested");
        assert!(batch.contains_key("a"));
        assert!(!batch.contains_key("b"));

        worker.turn().await;
        let batch = relay.try_recv().expect("second bucket harvested");
        assert!(batch.contains_key("b"));
        assert_consistent(&worker);
    }

    #[tokio::test]
    async fn harvested_bucket_is_replaced_from_pool() {
        let (mut worker, mut relay) = worker(2);
        let pool = Arc::clone(&worker.pool);

        // Recycle a batch the way the dispatcher would.
        insert(&mut worker, "a", 1, false);
        worker.turn().await;
        worker.turn().await;
        let mut batch = relay.try_recv().unwrap();
        batch.clear();
        pool.put(batch);

        let before = pool.idle();
        insert(&mut worker, "b", 2, false);
        worker.turn().await;
        worker.turn().await;
        relay.try_recv().unwrap();

        // The swap-in buffer came out of the free list.
        assert_eq!(pool.idle(), before - 1);
    }
}
