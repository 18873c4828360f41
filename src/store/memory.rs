//! In-memory store backend.
//!
//! Mirrors the Redis semantics the tracker depends on: sorted sets order by
//! score then by member bytes, ranks accept negative indexes, and `ZADD` on an
//! existing member updates its score.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Store;
use crate::error::{Error, Result};

/// Thread-safe store backed by hash maps. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    offline: Arc<AtomicBool>,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, String>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every command fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of string and sorted-set keys currently held.
    pub fn key_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.strings.len() + inner.zsets.len()
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Store("memory store is offline".into()));
        }
        Ok(())
    }
}

impl Inner {
    /// Members of `key` in ascending rank order.
    fn ranked(&self, key: &str) -> Vec<(String, f64)> {
        let Some(set) = self.zsets.get(key) else {
            return Vec::new();
        };
        let mut members: Vec<(String, f64)> =
            set.iter().map(|(m, s)| (m.clone(), *s)).collect();
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.0.as_bytes().cmp(b.0.as_bytes()))
        });
        members
    }
}

/// Resolve a Redis-style inclusive rank range against `len` members.
fn rank_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.inner.lock().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .strings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.check()?;
        let mut inner = self.inner.lock();
        let slot = inner
            .strings
            .entry(key.to_string())
            .or_insert_with(|| "0".to_string());
        let current: i64 = slot
            .parse()
            .map_err(|_| Error::Store(format!("value at '{key}' is not an integer")))?;
        let next = current + 1;
        *slot = next.to_string();
        Ok(next)
    }

    async fn del(&self, keys: &[String]) -> Result<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        for key in keys {
            inner.strings.remove(key);
            inner.zsets.remove(key);
        }
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<usize> {
        self.check()?;
        Ok(self.inner.lock().zsets.get(key).map_or(0, HashMap::len))
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        self.check()?;
        let mut members = self.inner.lock().ranked(key);
        members.reverse();
        Ok(match rank_bounds(members.len(), start, stop) {
            Some((lo, hi)) => members[lo..=hi].to_vec(),
            None => Vec::new(),
        })
    }

    async fn zrangebyscore_withscores(&self, key: &str, min: f64) -> Result<Vec<(String, f64)>> {
        self.check()?;
        let members = self.inner.lock().ranked(key);
        Ok(members.into_iter().filter(|(_, s)| *s >= min).collect())
    }

    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let members = inner.ranked(key);
        let Some((lo, hi)) = rank_bounds(members.len(), start, stop) else {
            return Ok(());
        };
        let emptied = match inner.zsets.get_mut(key) {
            Some(set) => {
                for (member, _) in &members[lo..=hi] {
                    set.remove(member);
                }
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            inner.zsets.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_bounds_follow_redis_rules() {
        assert_eq!(rank_bounds(5, 0, -1), Some((0, 4)));
        assert_eq!(rank_bounds(5, 0, 10), Some((0, 4)));
        assert_eq!(rank_bounds(5, -2, -1), Some((3, 4)));
        assert_eq!(rank_bounds(5, 3, 1), None);
        assert_eq!(rank_bounds(0, 0, -1), None);
        assert_eq!(rank_bounds(3, 5, 8), None);
    }

    #[tokio::test]
    async fn ties_order_by_member() {
        let store = MemoryStore::new();
        store.zadd("z", 5.0, "b").await.unwrap();
        store.zadd("z", 5.0, "a").await.unwrap();
        store.zadd("z", 9.0, "c").await.unwrap();

        let desc = store.zrevrange_withscores("z", 0, -1).await.unwrap();
        let names: Vec<_> = desc.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);

        store.zremrangebyrank("z", 0, 0).await.unwrap();
        let left = store.zrangebyscore_withscores("z", f64::NEG_INFINITY).await.unwrap();
        assert_eq!(left, vec![("b".to_string(), 5.0), ("c".to_string(), 9.0)]);
    }

    #[tokio::test]
    async fn zadd_updates_existing_member() {
        let store = MemoryStore::new();
        store.zadd("z", 1.0, "m").await.unwrap();
        store.zadd("z", 4.0, "m").await.unwrap();
        assert_eq!(store.zcard("z").await.unwrap(), 1);
        assert_eq!(
            store.zrangebyscore_withscores("z", 2.0).await.unwrap(),
            vec![("m".to_string(), 4.0)]
        );
    }

    #[tokio::test]
    async fn offline_store_fails_every_command() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(store.get("k").await, Err(Error::Store(_))));
        assert!(store.incr("k").await.is_err());
        store.set_offline(false);
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.incr("k").await.unwrap(), 2);
    }
}
