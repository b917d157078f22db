//! Login throttling
//!
//! Sliding windows of timestamps, one per key. Failed logins are tracked
//! per username (5 per 15 minutes) and login requests per client IP
//! (10 per minute).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Events per key within a trailing window
struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    events: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            events: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut events = self.events.write().await;
        match events.get_mut(&key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limit
            }
            None => false,
        }
    }

    async fn record(&self, key: K, now: DateTime<Utc>) {
        self.events.write().await.entry(key).or_default().push(now);
    }

    async fn clear(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    async fn prune(&self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        self.events.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

/// Login rate limiter shared by the auth handlers
pub struct LoginRateLimiter {
    usernames: SlidingWindow<String>,
    ips: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            usernames: SlidingWindow::new(5, Duration::minutes(15)),
            ips: SlidingWindow::new(10, Duration::minutes(1)),
        }
    }

    /// Whether the username has used up its failed attempts
    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames.is_limited(username.to_lowercase(), Utc::now()).await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase(), Utc::now()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(ip, Utc::now()).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip, Utc::now()).await;
    }

    /// Drop expired entries; run from the maintenance task
    pub async fn cleanup(&self) {
        let now = Utc::now();
        self.usernames.prune(now).await;
        self.ips.prune(now).await;
    }

    /// Number of tracked keys
    pub async fn tracked_keys(&self) -> usize {
        self.usernames.len().await + self.ips.len().await
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
