//! In-memory repositories on `DashMap`
//!
//! Every repository is a cheap `Clone` handle over shared maps, so a test can
//! keep one handle for assertions while the engine owns another.

use super::{
    AccountingRepository, AccountingStop, NasRepository, RepositoryError, SessionRepository,
    UserRepository,
};
use crate::model::{AccountingRecord, Nas, OnlineSession, User};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<DashMap<String, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let repo = Self::new();
        for user in users {
            repo.insert(user);
        }
        repo
    }

    /// Insert or replace by username
    pub fn insert(&self, user: User) {
        self.users.insert(user.username.clone(), user);
    }

    fn modify(&self, username: &str, f: impl FnOnce(&mut User)) -> Result<(), RepositoryError> {
        let mut user = self
            .users
            .get_mut(username)
            .ok_or_else(|| RepositoryError::NotFound(username.to_string()))?;
        f(&mut user);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.get(username).map(|u| u.clone()))
    }

    async fn get_by_mac(&self, mac: &str) -> Result<Option<User>, RepositoryError> {
        if mac.is_empty() {
            return Ok(None);
        }
        Ok(self
            .users
            .iter()
            .find(|entry| entry.mac_addr.eq_ignore_ascii_case(mac))
            .map(|entry| entry.value().clone()))
    }

    async fn update_mac_addr(&self, username: &str, mac: &str) -> Result<(), RepositoryError> {
        self.modify(username, |u| u.mac_addr = mac.to_string())
    }

    async fn update_vlan_id(
        &self,
        username: &str,
        vlan_id1: u32,
        vlan_id2: u32,
    ) -> Result<(), RepositoryError> {
        self.modify(username, |u| {
            u.vlan_id1 = vlan_id1;
            u.vlan_id2 = vlan_id2;
        })
    }

    async fn update_last_online(&self, username: &str) -> Result<(), RepositoryError> {
        self.modify(username, |u| u.last_online = Some(Utc::now()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNasRepository {
    by_ip: Arc<DashMap<IpAddr, Nas>>,
}

impl MemoryNasRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nas(nas: impl IntoIterator<Item = Nas>) -> Self {
        let repo = Self::new();
        for n in nas {
            repo.insert(n);
        }
        repo
    }

    pub fn insert(&self, nas: Nas) {
        self.by_ip.insert(nas.ipaddr, nas);
    }
}

#[async_trait]
impl NasRepository for MemoryNasRepository {
    async fn get_by_ip_or_identifier(
        &self,
        ip: IpAddr,
        identifier: &str,
    ) -> Result<Option<Nas>, RepositoryError> {
        if let Some(nas) = self.by_ip.get(&ip) {
            return Ok(Some(nas.clone()));
        }
        if identifier.is_empty() {
            return Ok(None);
        }
        Ok(self
            .by_ip
            .iter()
            .find(|entry| entry.identifier == identifier)
            .map(|entry| entry.value().clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionRepository {
    sessions: Arc<DashMap<String, OnlineSession>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: OnlineSession) -> Result<(), RepositoryError> {
        match self.sessions.entry(session.acct_session_id.clone()) {
            Entry::Occupied(_) => {
                Err(RepositoryError::Duplicate(session.acct_session_id))
            }
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    async fn update(&self, session: OnlineSession) -> Result<(), RepositoryError> {
        let mut existing = self
            .sessions
            .get_mut(&session.acct_session_id)
            .ok_or_else(|| RepositoryError::NotFound(session.acct_session_id.clone()))?;
        *existing = session;
        Ok(())
    }

    async fn upsert(&self, session: OnlineSession) -> Result<bool, RepositoryError> {
        match self.sessions.entry(session.acct_session_id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(session);
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(true)
            }
        }
    }

    async fn delete(&self, acct_session_id: &str) -> Result<(), RepositoryError> {
        self.sessions.remove(acct_session_id);
        Ok(())
    }

    async fn get(&self, acct_session_id: &str) -> Result<Option<OnlineSession>, RepositoryError> {
        Ok(self.sessions.get(acct_session_id).map(|s| s.clone()))
    }

    async fn count_by_username(&self, username: &str) -> Result<usize, RepositoryError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.username == username)
            .count())
    }

    async fn exists(&self, acct_session_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.sessions.contains_key(acct_session_id))
    }

    async fn batch_delete_by_nas(
        &self,
        nas_addr: &str,
        nas_identifier: &str,
    ) -> Result<usize, RepositoryError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| {
            let same_addr = !nas_addr.is_empty() && s.nas_addr == nas_addr;
            let same_id = !nas_identifier.is_empty() && s.nas_id == nas_identifier;
            !(same_addr || same_id)
        });
        Ok(before.saturating_sub(self.sessions.len()))
    }

    async fn list(&self) -> Result<Vec<OnlineSession>, RepositoryError> {
        Ok(self.sessions.iter().map(|s| s.value().clone()).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAccountingRepository {
    records: Arc<DashMap<String, Vec<AccountingRecord>>>,
}

impl MemoryAccountingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountingRepository for MemoryAccountingRepository {
    async fn create(&self, record: AccountingRecord) -> Result<(), RepositoryError> {
        self.records
            .entry(record.acct_session_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn update_stop(
        &self,
        acct_session_id: &str,
        stop: AccountingStop,
    ) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .get_mut(acct_session_id)
            .ok_or_else(|| RepositoryError::NotFound(acct_session_id.to_string()))?;
        let record = records
            .iter_mut()
            .rev()
            .find(|r| r.acct_stop_time.is_none())
            .ok_or_else(|| RepositoryError::NotFound(acct_session_id.to_string()))?;

        record.acct_stop_time = Some(stop.acct_stop_time);
        record.acct_session_time = stop.acct_session_time;
        record.acct_input_total = stop.acct_input_total;
        record.acct_output_total = stop.acct_output_total;
        record.acct_input_packets = stop.acct_input_packets;
        record.acct_output_packets = stop.acct_output_packets;
        record.acct_terminate_cause = stop.acct_terminate_cause;
        Ok(())
    }

    async fn get(&self, acct_session_id: &str) -> Result<Option<AccountingRecord>, RepositoryError> {
        Ok(self
            .records
            .get(acct_session_id)
            .and_then(|records| records.last().cloned()))
    }

    async fn list_by_session(
        &self,
        acct_session_id: &str,
    ) -> Result<Vec<AccountingRecord>, RepositoryError> {
        Ok(self
            .records
            .get(acct_session_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }
}
