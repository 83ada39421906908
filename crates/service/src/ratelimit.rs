//! Fixed-window request counters keyed by caller (`mobile:<apiKeyId>`,
//! `login:<normalized email>`, `redeem:<slug>` ...).
//!
//! The default store is process-local and best-effort: counts are lost on
//! restart and are per instance. A shared store can be dropped in behind
//! [`RateLimitStore`] without touching call sites.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets.
    pub retry_after_secs: u64,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one hit against `key` and decide.
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> RateDecision;
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// In-memory store. Lock striping in `DashMap` keeps unrelated keys from
/// contending; hits on the same key serialize on its shard.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self { Self::default() }

    pub fn hit_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateDecision {
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket { count: 0, reset_at: now + window });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }
        let retry_after_secs = entry.reset_at.saturating_duration_since(now).as_secs().max(1);
        if entry.count >= limit {
            return RateDecision { allowed: false, limit, remaining: 0, retry_after_secs };
        }
        entry.count += 1;
        RateDecision { allowed: true, limit, remaining: limit - entry.count, retry_after_secs }
    }

    /// Drop buckets whose window has passed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, b| b.reset_at > now);
        before - self.buckets.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        self.hit_at(key, limit, window, Instant::now())
    }
}
