//! Core rate limiter implementation.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use super::bucket::{Bucket, BucketKey};
use super::clock::{Clock, SystemClock};
use super::lru::LruCache;
use crate::config::PolicyConfig;

/// Outcome of a rate limit check.
///
/// Rejection is an ordinary outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Whether the request was admitted
    pub success: bool,
    /// The quota the caller asked for
    pub limit: u32,
    /// Requests still available in this window
    pub remaining: u32,
    /// Epoch milliseconds at which quota frees up
    pub reset: u64,
}

impl RateLimitResult {
    /// `reset` in epoch seconds, rounded up.
    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset.div_ceil(1000)
    }

    /// Seconds the caller should wait before retrying, rounded up.
    /// Always zero for an admitted request.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        if self.success {
            0
        } else {
            self.reset.saturating_sub(now_ms).div_ceil(1000)
        }
    }
}

/// Fixed-window rate limiter with a bounded number of tracked buckets.
///
/// Each `(identifier, window)` pair owns a bucket of admitted request
/// timestamps. Buckets live in an LRU map capped at
/// `max_tracked_identifiers` and expire one window after their last write.
///
/// This struct is thread-safe and meant to be shared behind an `Arc`. Every
/// operation holds the bucket lock for a bounded scan of at most `limit`
/// timestamps plus constant-time list maintenance, and never across I/O.
pub struct RateLimiter {
    window_ms: u64,
    buckets: Mutex<LruCache<BucketKey, Bucket>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock.
    pub fn new(window_ms: u64, max_tracked_identifiers: usize) -> Self {
        Self::with_clock(window_ms, max_tracked_identifiers, Arc::new(SystemClock))
    }

    /// Create a rate limiter on an explicit clock.
    ///
    /// A zero window is raised to one millisecond and a zero capacity to one
    /// bucket.
    pub fn with_clock(
        window_ms: u64,
        max_tracked_identifiers: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window_ms = window_ms.max(1);
        Self {
            window_ms,
            buckets: Mutex::new(LruCache::new(max_tracked_identifiers, window_ms)),
            clock,
        }
    }

    /// Create a rate limiter from a policy section.
    pub fn from_config(policy: &PolicyConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(policy.window_ms, policy.max_tracked_identifiers, clock)
    }

    /// Check the quota for `identifier` and, if admitted, record the request.
    ///
    /// On admission `reset` is the start of the next window. On rejection it
    /// is the moment the oldest counted request ages out, i.e. its timestamp
    /// plus one window.
    pub fn check_and_increment(&self, identifier: &str, limit: u32) -> RateLimitResult {
        let now = self.clock.now_ms();
        let (key, window_start) = self.current_key(identifier, now);

        let mut buckets = self.buckets.lock();

        let mut bucket = buckets.get(&key, now).cloned().unwrap_or_default();
        bucket.retain_from(window_start);
        let count = bucket.count();

        if count >= u64::from(limit) {
            let reset = self.rejection_reset(&bucket, window_start);
            drop(buckets);

            debug!(
                key = %key,
                count = count,
                limit = limit,
                reset = reset,
                "Rate limit exceeded"
            );
            return RateLimitResult {
                success: false,
                limit,
                remaining: 0,
                reset,
            };
        }

        bucket.record(now);
        let evicted = buckets.insert(key.clone(), bucket, now);
        drop(buckets);

        if let Some((evicted_key, _)) = evicted {
            debug!(
                evicted = %evicted_key,
                inserted = %key,
                "Evicted least recently used bucket"
            );
        }

        // count < limit here, so the subtraction cannot underflow
        let remaining = limit - (count as u32 + 1);
        trace!(key = %key, remaining = remaining, "Request admitted");

        RateLimitResult {
            success: true,
            limit,
            remaining,
            reset: window_start + self.window_ms,
        }
    }

    /// Report what `check_and_increment` would decide, without recording
    /// anything or touching recency.
    pub fn peek(&self, identifier: &str, limit: u32) -> RateLimitResult {
        let now = self.clock.now_ms();
        let (key, window_start) = self.current_key(identifier, now);

        let mut bucket = {
            let buckets = self.buckets.lock();
            buckets.peek(&key, now).cloned().unwrap_or_default()
        };
        bucket.retain_from(window_start);
        let count = bucket.count();

        trace!(key = %key, count = count, limit = limit, "Peeking rate limit");

        if count >= u64::from(limit) {
            RateLimitResult {
                success: false,
                limit,
                remaining: 0,
                reset: self.rejection_reset(&bucket, window_start),
            }
        } else {
            RateLimitResult {
                success: true,
                limit,
                remaining: limit - count as u32,
                reset: window_start + self.window_ms,
            }
        }
    }

    /// Forget the current window's bucket for `identifier`, restoring its
    /// full quota. Resetting an identifier with no bucket is a no-op.
    pub fn reset(&self, identifier: &str) {
        let now = self.clock.now_ms();
        let (key, _) = self.current_key(identifier, now);

        let removed = self.buckets.lock().remove(&key).is_some();
        debug!(key = %key, removed = removed, "Reset rate limit bucket");
    }

    /// Drop every bucket whose time-to-live has elapsed. Returns how many
    /// were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        self.buckets.lock().purge_expired(now)
    }

    /// Number of buckets currently held in memory.
    pub fn tracked_identifiers(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Drop all buckets.
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn max_tracked_identifiers(&self) -> usize {
        self.buckets.lock().capacity()
    }

    fn current_key(&self, identifier: &str, now: u64) -> (BucketKey, u64) {
        let window = now / self.window_ms;
        (BucketKey::new(identifier, window), window * self.window_ms)
    }

    fn rejection_reset(&self, bucket: &Bucket, window_start: u64) -> u64 {
        match bucket.oldest() {
            Some(oldest) => oldest + self.window_ms,
            // Only reachable with a zero limit
            None => window_start + self.window_ms,
        }
    }
}
