//! Account policy: status, expiry, MAC/VLAN binding, concurrent sessions

use super::vendors::{is_placeholder_mac, normalize_mac};
use super::PolicyChecker;
use crate::error::AuthError;
use crate::model::User;
use crate::pipeline::AuthRequestContext;
use crate::repository::SessionRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

pub struct StatusChecker;

#[async_trait]
impl PolicyChecker for StatusChecker {
    fn name(&self) -> &'static str {
        "status"
    }

    fn order(&self) -> i32 {
        5
    }

    async fn check(&self, _ctx: &AuthRequestContext, user: &User) -> Result<(), AuthError> {
        if !user.is_enabled() {
            return Err(AuthError::UserDisabled(user.username.clone()));
        }
        Ok(())
    }
}

pub struct ExpireChecker;

#[async_trait]
impl PolicyChecker for ExpireChecker {
    fn name(&self) -> &'static str {
        "expire"
    }

    fn order(&self) -> i32 {
        10
    }

    async fn check(&self, _ctx: &AuthRequestContext, user: &User) -> Result<(), AuthError> {
        if user.is_expired(Utc::now()) {
            return Err(AuthError::UserExpired(user.username.clone()));
        }
        Ok(())
    }
}

/// Only enforced once both the account and the request carry a real MAC;
/// an unbound account learns its MAC after the accept
pub struct MacBindChecker;

#[async_trait]
impl PolicyChecker for MacBindChecker {
    fn name(&self) -> &'static str {
        "mac_bind"
    }

    fn order(&self) -> i32 {
        20
    }

    async fn check(&self, ctx: &AuthRequestContext, user: &User) -> Result<(), AuthError> {
        let request_mac = &ctx.vendor_request.mac_addr;
        if !user.bind_mac || is_placeholder_mac(&user.mac_addr) || is_placeholder_mac(request_mac)
        {
            return Ok(());
        }
        if normalize_mac(&user.mac_addr) != normalize_mac(request_mac) {
            return Err(AuthError::MacBindFailure);
        }
        Ok(())
    }
}

/// A zero on either side skips that tag
pub struct VlanBindChecker;

#[async_trait]
impl PolicyChecker for VlanBindChecker {
    fn name(&self) -> &'static str {
        "vlan_bind"
    }

    fn order(&self) -> i32 {
        21
    }

    async fn check(&self, ctx: &AuthRequestContext, user: &User) -> Result<(), AuthError> {
        if !user.bind_vlan {
            return Ok(());
        }
        let pairs = [
            (user.vlan_id1, ctx.vendor_request.vlan_id1),
            (user.vlan_id2, ctx.vendor_request.vlan_id2),
        ];
        if pairs
            .iter()
            .any(|&(bound, seen)| bound != 0 && seen != 0 && bound != seen)
        {
            return Err(AuthError::VlanBindFailure);
        }
        Ok(())
    }
}

pub struct OnlineCountChecker {
    sessions: Arc<dyn SessionRepository>,
}

impl OnlineCountChecker {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        OnlineCountChecker { sessions }
    }
}

#[async_trait]
impl PolicyChecker for OnlineCountChecker {
    fn name(&self) -> &'static str {
        "online_count"
    }

    fn order(&self) -> i32 {
        30
    }

    async fn check(&self, _ctx: &AuthRequestContext, user: &User) -> Result<(), AuthError> {
        if user.active_num == 0 {
            return Ok(());
        }
        let online = self.sessions.count_by_username(&user.username).await?;
        if online >= user.active_num as usize {
            return Err(AuthError::OnlineLimitExceeded(user.active_num));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OnlineSession, Status};
    use crate::pipeline::context::test_context;
    use crate::repository::MemorySessionRepository;
    use chrono::Duration;
    use radius_wire::{Code, Packet};

    fn ctx() -> AuthRequestContext {
        test_context(Packet::new(Code::AccessRequest, 1, [0; 16]), b"s")
    }

    #[tokio::test]
    async fn test_status_and_expiry() {
        let mut user = User::new("alice", "pw");
        assert!(StatusChecker.check(&ctx(), &user).await.is_ok());
        user.status = Status::Disabled;
        assert!(matches!(
            StatusChecker.check(&ctx(), &user).await,
            Err(AuthError::UserDisabled(_))
        ));

        user.expire_time = Utc::now() - Duration::hours(1);
        assert!(matches!(
            ExpireChecker.check(&ctx(), &user).await,
            Err(AuthError::UserExpired(_))
        ));
    }

    #[tokio::test]
    async fn test_mac_binding() {
        let mut user = User::new("alice", "pw");
        user.bind_mac = true;
        user.mac_addr = "AA:BB:CC:DD:EE:FF".to_string();

        let mut c = ctx();
        c.vendor_request.mac_addr = "aa:bb:cc:dd:ee:ff".to_string();
        assert!(MacBindChecker.check(&c, &user).await.is_ok());

        c.vendor_request.mac_addr = "11:22:33:44:55:66".to_string();
        assert!(matches!(
            MacBindChecker.check(&c, &user).await,
            Err(AuthError::MacBindFailure)
        ));

        // placeholders on either side skip the check
        c.vendor_request.mac_addr = String::new();
        assert!(MacBindChecker.check(&c, &user).await.is_ok());
        user.mac_addr = "N/A".to_string();
        c.vendor_request.mac_addr = "11:22:33:44:55:66".to_string();
        assert!(MacBindChecker.check(&c, &user).await.is_ok());
    }

    #[tokio::test]
    async fn test_vlan_binding() {
        let mut user = User::new("alice", "pw");
        user.bind_vlan = true;
        user.vlan_id1 = 100;

        let mut c = ctx();
        c.vendor_request.vlan_id1 = 100;
        c.vendor_request.vlan_id2 = 999;
        assert!(VlanBindChecker.check(&c, &user).await.is_ok());

        c.vendor_request.vlan_id1 = 101;
        assert!(matches!(
            VlanBindChecker.check(&c, &user).await,
            Err(AuthError::VlanBindFailure)
        ));

        c.vendor_request.vlan_id1 = 0;
        assert!(VlanBindChecker.check(&c, &user).await.is_ok());
    }

    #[tokio::test]
    async fn test_online_limit() {
        let sessions = MemorySessionRepository::new();
        let checker = OnlineCountChecker::new(Arc::new(sessions.clone()));
        let mut user = User::new("alice", "pw");
        user.active_num = 1;
        assert!(checker.check(&ctx(), &user).await.is_ok());

        sessions
            .create(OnlineSession::new("s1", "alice"))
            .await
            .unwrap();
        assert!(matches!(
            checker.check(&ctx(), &user).await,
            Err(AuthError::OnlineLimitExceeded(1))
        ));

        user.active_num = 0;
        assert!(checker.check(&ctx(), &user).await.is_ok());
    }
}
