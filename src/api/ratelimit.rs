use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

/// Upper bound on distinct clients tracked at once; least recently seen
/// entries fall out first.
const MAX_TRACKED_CLIENTS: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request limiter keyed by client address.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<LruCache<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        let capacity = NonZeroUsize::new(MAX_TRACKED_CLIENTS).unwrap_or(NonZeroUsize::MIN);
        Self {
            window,
            max_requests,
            clients: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Records one request for `key` and reports whether it is allowed.
    pub async fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now()).await
    }

    pub async fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().await;
        let window = clients.get_or_insert_mut(key.to_string(), || Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.max_requests {
            window.count += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);

        assert!(limiter.try_acquire("a").await);
        assert!(limiter.try_acquire("a").await);
        assert!(limiter.try_acquire("a").await);
        assert!(!limiter.try_acquire("a").await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.try_acquire("a").await);
        assert!(!limiter.try_acquire("a").await);
        assert!(limiter.try_acquire("b").await);
    }

    #[tokio::test]
    async fn test_window_rollover_resets_count() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(limiter.try_acquire_at("a", start).await);
        assert!(limiter.try_acquire_at("a", start).await);
        assert!(!limiter.try_acquire_at("a", start).await);

        let later = start + Duration::from_secs(61);
        assert!(limiter.try_acquire_at("a", later).await);
    }
}
