//! Per-username authentication throttle
//!
//! A username may have one authentication in flight at a time, and a new
//! one is refused until `interval` has passed since the previous one began.
//! Acquiring hands out a [`RateLimitPermit`]; dropping the permit (including
//! during a panic unwind) ends the in-flight phase.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Entry {
    acquired_at: Instant,
    in_flight: bool,
}

#[derive(Debug)]
pub struct AuthRateLimiter {
    interval: Duration,
    max_entries: usize,
    // one lock so the cap check and the wholesale clear are atomic
    entries: Mutex<HashMap<String, Entry>>,
}

impl AuthRateLimiter {
    pub fn new(interval: Duration, max_entries: usize) -> Self {
        AuthRateLimiter {
            interval,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the username, or `None` while it is busy or too recent
    pub fn try_acquire(self: &Arc<Self>, username: &str) -> Option<RateLimitPermit> {
        let now = Instant::now();
        let mut entries = self.lock();

        if let Some(entry) = entries.get(username) {
            if entry.in_flight || now.duration_since(entry.acquired_at) < self.interval {
                return None;
            }
        }

        if entries.len() >= self.max_entries && !entries.contains_key(username) {
            let interval = self.interval;
            entries.retain(|_, e| e.in_flight || now.duration_since(e.acquired_at) < interval);
            if entries.len() >= self.max_entries {
                warn!(
                    entries = entries.len(),
                    "auth rate limiter full, clearing all entries"
                );
                entries.clear();
            }
        }

        entries.insert(
            username.to_string(),
            Entry {
                acquired_at: now,
                in_flight: true,
            },
        );

        Some(RateLimitPermit {
            limiter: Arc::clone(self),
            username: username.to_string(),
        })
    }

    fn release(&self, username: &str) {
        let mut entries = self.lock();
        if self.interval.is_zero() {
            entries.remove(username);
        } else if let Some(entry) = entries.get_mut(username) {
            entry.in_flight = false;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the lifetime of one authentication
#[derive(Debug)]
pub struct RateLimitPermit {
    limiter: Arc<AuthRateLimiter>,
    username: String,
}

impl RateLimitPermit {
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Drop for RateLimitPermit {
    fn drop(&mut self) {
        self.limiter.release(&self.username);
    }
}
