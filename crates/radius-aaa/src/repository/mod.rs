//! Storage abstraction for users, NAS devices, online sessions and the
//! accounting log
//!
//! The engine only sees these traits. [`memory`] holds the `DashMap`
//! implementations used by the binary and the tests; a SQL backend slots in
//! by implementing the same four traits.

pub mod memory;

pub use memory::{
    MemoryAccountingRepository, MemoryNasRepository, MemorySessionRepository,
    MemoryUserRepository,
};

use crate::model::{AccountingRecord, Nas, OnlineSession, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Lookup by bound MAC in `aa:bb:cc:dd:ee:ff` form
    async fn get_by_mac(&self, mac: &str) -> Result<Option<User>, RepositoryError>;

    async fn update_mac_addr(&self, username: &str, mac: &str) -> Result<(), RepositoryError>;

    async fn update_vlan_id(
        &self,
        username: &str,
        vlan_id1: u32,
        vlan_id2: u32,
    ) -> Result<(), RepositoryError>;

    async fn update_last_online(&self, username: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NasRepository: Send + Sync {
    /// Match on source address first, then on NAS-Identifier
    async fn get_by_ip_or_identifier(
        &self,
        ip: IpAddr,
        identifier: &str,
    ) -> Result<Option<Nas>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: OnlineSession) -> Result<(), RepositoryError>;

    async fn update(&self, session: OnlineSession) -> Result<(), RepositoryError>;

    /// Insert or replace in one step; `true` when the row did not exist
    async fn upsert(&self, session: OnlineSession) -> Result<bool, RepositoryError>;

    async fn delete(&self, acct_session_id: &str) -> Result<(), RepositoryError>;

    async fn get(&self, acct_session_id: &str) -> Result<Option<OnlineSession>, RepositoryError>;

    async fn count_by_username(&self, username: &str) -> Result<usize, RepositoryError>;

    async fn exists(&self, acct_session_id: &str) -> Result<bool, RepositoryError>;

    /// Remove every session reported by one NAS; returns how many went
    async fn batch_delete_by_nas(
        &self,
        nas_addr: &str,
        nas_identifier: &str,
    ) -> Result<usize, RepositoryError>;

    async fn list(&self) -> Result<Vec<OnlineSession>, RepositoryError>;
}

/// Final values written when a session closes
#[derive(Debug, Clone, PartialEq)]
pub struct AccountingStop {
    pub acct_stop_time: DateTime<Utc>,
    pub acct_session_time: u32,
    pub acct_input_total: u64,
    pub acct_output_total: u64,
    pub acct_input_packets: u32,
    pub acct_output_packets: u32,
    pub acct_terminate_cause: Option<u32>,
}

#[async_trait]
pub trait AccountingRepository: Send + Sync {
    async fn create(&self, record: AccountingRecord) -> Result<(), RepositoryError>;

    /// Close the open record of a session
    async fn update_stop(
        &self,
        acct_session_id: &str,
        stop: AccountingStop,
    ) -> Result<(), RepositoryError>;

    /// Most recent record of a session
    async fn get(&self, acct_session_id: &str) -> Result<Option<AccountingRecord>, RepositoryError>;

    async fn list_by_session(
        &self,
        acct_session_id: &str,
    ) -> Result<Vec<AccountingRecord>, RepositoryError>;
}

/// The four repositories the engine works against
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub nas: Arc<dyn NasRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub accounting: Arc<dyn AccountingRepository>,
}

impl Repositories {
    pub fn in_memory(users: Vec<User>, nas: Vec<Nas>) -> Self {
        Repositories {
            users: Arc::new(MemoryUserRepository::with_users(users)),
            nas: Arc::new(MemoryNasRepository::with_nas(nas)),
            sessions: Arc::new(MemorySessionRepository::new()),
            accounting: Arc::new(MemoryAccountingRepository::new()),
        }
    }
}
