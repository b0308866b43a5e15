//! Brute-force throttle on repeated rejects

use super::{AuthGuard, GuardDecision};
use crate::error::AuthError;
use crate::pipeline::AuthRequestContext;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct RejectCounter {
    count: u32,
    last_failure: Instant,
}

/// Counts failures per username. Once more than `max_rejects` happen inside
/// `window`, further failures report as rate limited until the window has
/// passed without a failure.
pub struct RejectDelayGuard {
    max_rejects: u32,
    window: Duration,
    max_entries: usize,
    // one lock so the cap check and the wholesale clear are atomic
    counters: Mutex<HashMap<String, RejectCounter>>,
}

impl RejectDelayGuard {
    pub const DEFAULT_MAX_REJECTS: u32 = 7;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_ENTRIES: usize = 65_536;

    pub fn new(max_rejects: u32, window: Duration, max_entries: usize) -> Self {
        RejectDelayGuard {
            max_rejects,
            window,
            max_entries: max_entries.max(1),
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RejectCounter>> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one failure and return the resulting count
    fn record_failure(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut counters = self.lock();

        if counters.len() >= self.max_entries && !counters.contains_key(key) {
            warn!(
                entries = counters.len(),
                "reject counter cache full, clearing"
            );
            counters.clear();
        }

        let counter = counters.entry(key.to_string()).or_insert(RejectCounter {
            count: 0,
            last_failure: now,
        });
        if now.duration_since(counter.last_failure) >= self.window {
            counter.count = 0;
        }
        counter.count = counter.count.saturating_add(1);
        counter.last_failure = now;
        counter.count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RejectDelayGuard {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_REJECTS,
            Self::DEFAULT_WINDOW,
            Self::DEFAULT_MAX_ENTRIES,
        )
    }
}

impl AuthGuard for RejectDelayGuard {
    fn name(&self) -> &'static str {
        "reject_delay"
    }

    fn on_error(&self, ctx: &AuthRequestContext, err: AuthError) -> GuardDecision {
        let key = if ctx.username.is_empty() {
            "anonymous"
        } else {
            ctx.username.as_str()
        };

        let count = self.record_failure(key);
        if count > self.max_rejects {
            debug!(username = %key, count, "reject delay engaged");
            return GuardDecision::Replace(AuthError::RateLimited(key.to_string()));
        }
        GuardDecision::Pass(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectKind;
    use crate::pipeline::context::test_context;
    use radius_wire::{Attribute, AttributeType, Code, Packet};

    fn ctx(username: &str) -> AuthRequestContext {
        let mut packet = Packet::new(Code::AccessRequest, 1, [0; 16]);
        if !username.is_empty() {
            packet.add_attribute(
                Attribute::string(AttributeType::UserName as u8, username).unwrap(),
            );
        }
        test_context(packet, b"s")
    }

    fn kind_of(decision: GuardDecision) -> Option<RejectKind> {
        match decision {
            GuardDecision::Pass(e) | GuardDecision::Replace(e) => Some(e.kind()),
            GuardDecision::Suppress => None,
        }
    }

    #[test]
    fn test_eighth_failure_is_rate_limited() {
        let guard = RejectDelayGuard::default();
        let c = ctx("alice");
        for _ in 0..7 {
            assert_eq!(
                kind_of(guard.on_error(&c, AuthError::PasswordMismatch)),
                Some(RejectKind::PasswordMismatch)
            );
        }
        assert_eq!(
            kind_of(guard.on_error(&c, AuthError::PasswordMismatch)),
            Some(RejectKind::RateLimited)
        );
        // other users are unaffected
        assert_eq!(
            kind_of(guard.on_error(&ctx("bob"), AuthError::PasswordMismatch)),
            Some(RejectKind::PasswordMismatch)
        );
    }

    #[test]
    fn test_window_resets_counter() {
        let guard = RejectDelayGuard::new(2, Duration::from_millis(40), 16);
        let c = ctx("alice");
        for _ in 0..3 {
            guard.on_error(&c, AuthError::PasswordMismatch);
        }
        assert_eq!(
            kind_of(guard.on_error(&c, AuthError::PasswordMismatch)),
            Some(RejectKind::RateLimited)
        );

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(
            kind_of(guard.on_error(&c, AuthError::PasswordMismatch)),
            Some(RejectKind::PasswordMismatch)
        );
    }

    #[test]
    fn test_anonymous_key_and_cap() {
        let guard = RejectDelayGuard::new(7, Duration::from_secs(10), 2);
        guard.on_error(&ctx(""), AuthError::PasswordMismatch);
        guard.on_error(&ctx("a"), AuthError::PasswordMismatch);
        assert_eq!(guard.len(), 2);
        guard.on_error(&ctx("b"), AuthError::PasswordMismatch);
        assert_eq!(guard.len(), 1);
    }
}
