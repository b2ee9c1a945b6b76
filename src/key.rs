//! Cache Key Types
//!
//! Keys are restricted to a closed set of primitive kinds: text (`String`)
//! and unsigned 64-bit integers (`u64`). The restriction is enforced at the
//! type level with a sealed trait, so an unsupported key type is rejected by
//! the compiler rather than by a runtime check.
//!
//! ## Why Sealed?
//!
//! Every key is cloned into two places inside a shard (the wheel bucket and
//! the key index) and crosses task boundaries inside harvested batches.
//! Sealing the trait keeps the supported set small and known, which is what
//! lets the rest of the crate treat keys as cheap, hashable, sendable values
//! without defending against exotic implementations.

use std::hash::Hash;

mod sealed {
    /// Prevents downstream crates from implementing [`CacheKey`](super::CacheKey).
    pub trait Sealed {}

    impl Sealed for String {}
    impl Sealed for u64 {}
}

/// Marker trait for types usable as cache keys.
///
/// Implemented only for `String` and `u64`; it cannot be implemented outside
/// this crate.
///
/// # Example
///
/// ```
/// use tickcache::CacheKey;
///
/// fn assert_key<K: CacheKey>() {}
///
/// assert_key::<String>();
/// assert_key::<u64>();
/// ```
///
/// Anything else fails to compile:
///
/// ```compile_fail
/// fn assert_key<K: tickcache::CacheKey>() {}
///
/// assert_key::<i32>();
/// ```
pub trait CacheKey: sealed::Sealed + Eq + Hash + Clone + Send + 'static {}

impl CacheKey for String {}
impl CacheKey for u64 {}
