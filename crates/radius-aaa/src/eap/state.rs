//! Per-conversation EAP state, keyed by the RADIUS State attribute

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapStage {
    Identity,
    MethodChallenge,
    MethodResponse,
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct EapChallengeState {
    pub state_id: String,
    pub username: String,
    /// Handler name, e.g. `eap-md5`
    pub method: String,
    pub stage: EapStage,
    pub challenge: Vec<u8>,
    /// Identifier of the last EAP-Request sent
    pub eap_identifier: u8,
    /// Opaque to the coordinator
    pub method_data: Vec<u8>,
    pub success: bool,
    pub created_at: Instant,
}

impl EapChallengeState {
    pub fn new(state_id: impl Into<String>, username: impl Into<String>) -> Self {
        EapChallengeState {
            state_id: state_id.into(),
            username: username.into(),
            method: String::new(),
            stage: EapStage::Identity,
            challenge: Vec::new(),
            eap_identifier: 0,
            method_data: Vec::new(),
            success: false,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.created_at) > ttl
    }
}

/// Time-bounded map of in-progress EAP conversations
#[derive(Debug)]
pub struct EapStateStore {
    ttl: Duration,
    max_entries: usize,
    // one lock so the cap check and the wholesale clear are atomic
    states: Mutex<HashMap<String, EapChallengeState>>,
}

impl EapStateStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        EapStateStore {
            ttl,
            max_entries: max_entries.max(1),
            states: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EapChallengeState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, state: EapChallengeState) {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut states = self.lock();

        // routine expiry belongs to the sweeper; only scan when at the cap
        if states.len() >= self.max_entries && !states.contains_key(&state.state_id) {
            states.retain(|_, s| !s.is_expired(now, ttl));
            if states.len() >= self.max_entries {
                warn!(entries = states.len(), "EAP state store full, clearing");
                states.clear();
            }
        }
        states.insert(state.state_id.clone(), state);
    }

    /// Live state for `state_id`; expired entries are dropped on sight
    pub fn get(&self, state_id: &str) -> Option<EapChallengeState> {
        let now = Instant::now();
        let mut states = self.lock();
        match states.get(state_id) {
            Some(s) if s.is_expired(now, self.ttl) => {
                states.remove(state_id);
                None
            }
            Some(s) => Some(s.clone()),
            None => None,
        }
    }

    /// Write back a state that is still present; returns false if it was evicted
    pub fn update(&self, state: EapChallengeState) -> bool {
        let mut states = self.lock();
        match states.get_mut(&state.state_id) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, state_id: &str) -> Option<EapChallengeState> {
        self.lock().remove(state_id)
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut states = self.lock();
        let before = states.len();
        states.retain(|_, s| !s.is_expired(now, ttl));
        before - states.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periodic sweep; the task ends once the store is dropped
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "EAP state sweep");
                }
            }
            debug!("EAP state sweeper stopped");
        })
    }
}

/// Removes a state when dropped unless disarmed
pub(crate) struct StateCleanup<'a> {
    store: &'a EapStateStore,
    state_id: String,
    armed: bool,
}

impl<'a> StateCleanup<'a> {
    pub(crate) fn new(store: &'a EapStateStore, state_id: impl Into<String>) -> Self {
        StateCleanup {
            store,
            state_id: state_id.into(),
            armed: true,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StateCleanup<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.remove(&self.state_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let store = EapStateStore::new(Duration::from_secs(60), 16);
        store.insert(EapChallengeState::new("s1", "alice"));

        let state = store.get("s1").unwrap();
        assert_eq!(state.username, "alice");
        assert_eq!(state.stage, EapStage::Identity);

        assert!(store.remove("s1").is_some());
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn test_update_requires_presence() {
        let store = EapStateStore::new(Duration::from_secs(60), 16);
        let mut state = EapChallengeState::new("s1", "alice");
        assert!(!store.update(state.clone()));

        store.insert(state.clone());
        state.stage = EapStage::MethodChallenge;
        assert!(store.update(state));
        assert_eq!(store.get("s1").unwrap().stage, EapStage::MethodChallenge);
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let store = EapStateStore::new(Duration::from_millis(20), 16);
        store.insert(EapChallengeState::new("s1", "alice"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.get("s1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_sweeps_and_caps() {
        let store = EapStateStore::new(Duration::from_secs(60), 2);
        store.insert(EapChallengeState::new("a", "u"));
        store.insert(EapChallengeState::new("b", "u"));
        store.insert(EapChallengeState::new("c", "u"));
        assert_eq!(store.len(), 1);
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_insert_at_cap_evicts_expired_before_clearing() {
        let store = EapStateStore::new(Duration::from_millis(20), 2);
        store.insert(EapChallengeState::new("a", "u"));
        std::thread::sleep(Duration::from_millis(30));
        store.insert(EapChallengeState::new("b", "u"));
        // below the cap nothing is scanned, the expired entry stays until swept
        assert_eq!(store.len(), 2);

        store.insert(EapChallengeState::new("c", "u"));
        assert_eq!(store.len(), 2);
        assert!(store.get("b").is_some());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_cleanup_guard() {
        let store = EapStateStore::new(Duration::from_secs(60), 16);
        store.insert(EapChallengeState::new("a", "u"));
        store.insert(EapChallengeState::new("b", "u"));
        {
            let _guard = StateCleanup::new(&store, "a");
        }
        {
            let mut guard = StateCleanup::new(&store, "b");
            guard.disarm();
        }
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired() {
        let store = Arc::new(EapStateStore::new(Duration::from_millis(10), 16));
        store.insert(EapChallengeState::new("a", "u"));
        let handle = store.start_sweeper(Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
