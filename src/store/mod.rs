//! Key-value and sorted-set persistence used by the tracker.
//!
//! - `redis_client`: the production backend, one multiplexed `ConnectionManager`.
//! - `memory`: a process-local backend with Redis ordering semantics, used
//!   by tests and when running without Redis.

mod memory;
mod redis_client;

pub use self::memory::MemoryStore;
pub use self::redis_client::{connect, RedisStore};

use async_trait::async_trait;

use crate::error::Result;

/// The subset of Redis commands the tracker relies on.
///
/// Each call is a single round trip. Implementations serialize operations per
/// key but nothing is transactional across calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn incr(&self, key: &str) -> Result<i64>;

    async fn del(&self, keys: &[String]) -> Result<()>;

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()>;

    async fn zcard(&self, key: &str) -> Result<usize>;

    /// Members ranked `start..=stop` by descending score, with scores.
    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>>;

    /// All members with `score >= min`, ascending, with scores.
    async fn zrangebyscore_withscores(&self, key: &str, min: f64) -> Result<Vec<(String, f64)>>;

    /// Remove members ranked `start..=stop` by ascending score.
    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<()>;
}
