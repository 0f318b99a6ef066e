use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cap on tracked (subject, kind) pairs before stale buckets get swept.
const MAX_TRACKED_BUCKETS: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimitKind {
    Message,
    SessionCreate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub message: LimitPolicy,
    pub session_create: LimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            message: LimitPolicy { max_requests: 30, window: Duration::from_secs(60) },
            session_create: LimitPolicy { max_requests: 10, window: Duration::from_secs(300) },
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct BucketKey {
    subject: String,
    kind: LimitKind,
}

#[derive(Debug)]
struct WindowBucket {
    window_started: Instant,
    count: u32,
}

/// Fixed-window limiter keyed by (subject, limit kind). `Instant` keeps the
/// window reset monotonic; an expired window is reset in place rather than
/// accumulated, and the map is swept once it grows past a fixed cap.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<BucketKey, WindowBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: Mutex::new(HashMap::new()) }
    }

    fn policy(&self, kind: LimitKind) -> LimitPolicy {
        match kind {
            LimitKind::Message => self.config.message,
            LimitKind::SessionCreate => self.config.session_create,
        }
    }

    pub fn is_allowed(&self, subject: &str, kind: LimitKind) -> bool {
        self.is_allowed_at(subject, kind, Instant::now())
    }

    /// Same as [`is_allowed`](Self::is_allowed) with an injected clock so the
    /// window behavior is unit-testable.
    pub fn is_allowed_at(&self, subject: &str, kind: LimitKind, now: Instant) -> bool {
        let policy = self.policy(kind);
        // A poisoned lock fails closed: a broken limiter must not admit.
        let Ok(mut buckets) = self.buckets.lock() else {
            return false;
        };

        if buckets.len() > MAX_TRACKED_BUCKETS {
            buckets.retain(|key, bucket| {
                let window = match key.kind {
                    LimitKind::Message => self.config.message.window,
                    LimitKind::SessionCreate => self.config.session_create.window,
                };
                now.duration_since(bucket.window_started) < window
            });
        }

        let key = BucketKey { subject: subject.to_string(), kind };
        let bucket = buckets
            .entry(key)
            .or_insert(WindowBucket { window_started: now, count: 0 });

        if now.duration_since(bucket.window_started) >= policy.window {
            bucket.window_started = now;
            bucket.count = 0;
        }

        if bucket.count >= policy.max_requests {
            return false;
        }

        bucket.count += 1;
        true
    }

    pub fn tracked_buckets(&self) -> usize {
        self.buckets.lock().map(|buckets| buckets.len()).unwrap_or(0)
    }
}
