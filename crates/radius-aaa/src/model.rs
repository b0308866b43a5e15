//! Domain records shared by the repositories, the pipeline and accounting

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
}

/// Subscriber account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default = "far_future")]
    pub expire_time: DateTime<Utc>,
    /// Upstream limit in KB/s, 0 for none
    #[serde(default)]
    pub up_rate: u64,
    /// Downstream limit in KB/s, 0 for none
    #[serde(default)]
    pub down_rate: u64,
    #[serde(default)]
    pub bind_mac: bool,
    #[serde(default)]
    pub bind_vlan: bool,
    #[serde(default)]
    pub mac_addr: String,
    #[serde(default)]
    pub vlan_id1: u32,
    #[serde(default)]
    pub vlan_id2: u32,
    /// Concurrent session limit, 0 for unlimited
    #[serde(default)]
    pub active_num: u32,
    #[serde(default)]
    pub framed_ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub addr_pool: Option<String>,
    /// Delegated prefix as `addr/len`
    #[serde(default)]
    pub ipv6_prefix: Option<String>,
    #[serde(default)]
    pub last_online: Option<DateTime<Utc>>,
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        User {
            id: 0,
            username: username.into(),
            password: password.into(),
            status: Status::Enabled,
            expire_time: far_future(),
            up_rate: 0,
            down_rate: 0,
            bind_mac: false,
            bind_vlan: false,
            mac_addr: String::new(),
            vlan_id1: 0,
            vlan_id2: 0,
            active_num: 0,
            framed_ip: None,
            addr_pool: None,
            ipv6_prefix: None,
            last_online: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == Status::Enabled
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_time < now
    }
}

/// Network access server allowed to talk to us
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nas {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// NAS-Identifier the device sends
    #[serde(default)]
    pub identifier: String,
    pub ipaddr: IpAddr,
    pub secret: String,
    /// Vendor code such as "2011" (Huawei); anything unknown uses defaults
    #[serde(default = "default_vendor_code")]
    pub vendor_code: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub coa_port: Option<u16>,
}

pub(crate) fn default_vendor_code() -> String {
    crate::plugins::vendors::DEFAULT_VENDOR.to_string()
}

impl Nas {
    pub fn new(ipaddr: IpAddr, secret: impl Into<String>) -> Self {
        Nas {
            id: 0,
            name: String::new(),
            identifier: String::new(),
            ipaddr,
            secret: secret.into(),
            vendor_code: default_vendor_code(),
            status: Status::Enabled,
            coa_port: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == Status::Enabled
    }
}

/// Live session row, keyed by Acct-Session-Id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineSession {
    pub acct_session_id: String,
    pub username: String,
    pub nas_id: String,
    pub nas_addr: String,
    pub nas_port_id: String,
    pub mac_addr: String,
    pub framed_ipaddr: String,
    pub framed_ipv6_prefix: String,
    pub session_timeout: u32,
    pub acct_session_time: u32,
    pub acct_input_total: u64,
    pub acct_output_total: u64,
    pub acct_input_packets: u32,
    pub acct_output_packets: u32,
    pub acct_start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl OnlineSession {
    /// Empty session started now
    pub fn new(acct_session_id: impl Into<String>, username: impl Into<String>) -> Self {
        let now = Utc::now();
        OnlineSession {
            acct_session_id: acct_session_id.into(),
            username: username.into(),
            nas_id: String::new(),
            nas_addr: String::new(),
            nas_port_id: String::new(),
            mac_addr: String::new(),
            framed_ipaddr: String::new(),
            framed_ipv6_prefix: String::new(),
            session_timeout: 0,
            acct_session_time: 0,
            acct_input_total: 0,
            acct_output_total: 0,
            acct_input_packets: 0,
            acct_output_packets: 0,
            acct_start_time: now,
            last_update: now,
        }
    }
}

/// Durable accounting log entry; one per session, closed on Stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingRecord {
    pub acct_session_id: String,
    pub username: String,
    pub nas_id: String,
    pub nas_addr: String,
    pub nas_port_id: String,
    pub mac_addr: String,
    pub framed_ipaddr: String,
    pub framed_ipv6_prefix: String,
    pub acct_session_time: u32,
    pub acct_input_total: u64,
    pub acct_output_total: u64,
    pub acct_input_packets: u32,
    pub acct_output_packets: u32,
    pub acct_start_time: DateTime<Utc>,
    pub acct_stop_time: Option<DateTime<Utc>>,
    pub acct_terminate_cause: Option<u32>,
}

impl From<&OnlineSession> for AccountingRecord {
    fn from(session: &OnlineSession) -> Self {
        AccountingRecord {
            acct_session_id: session.acct_session_id.clone(),
            username: session.username.clone(),
            nas_id: session.nas_id.clone(),
            nas_addr: session.nas_addr.clone(),
            nas_port_id: session.nas_port_id.clone(),
            mac_addr: session.mac_addr.clone(),
            framed_ipaddr: session.framed_ipaddr.clone(),
            framed_ipv6_prefix: session.framed_ipv6_prefix.clone(),
            acct_session_time: session.acct_session_time,
            acct_input_total: session.acct_input_total,
            acct_output_total: session.acct_output_total,
            acct_input_packets: session.acct_input_packets,
            acct_output_packets: session.acct_output_packets,
            acct_start_time: session.acct_start_time,
            acct_stop_time: None,
            acct_terminate_cause: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_user_defaults_from_json() {
        let user: User = serde_json::from_str(r#"{"username": "alice", "password": "pw"}"#).unwrap();
        assert!(user.is_enabled());
        assert!(!user.is_expired(Utc::now()));
        assert_eq!(user.active_num, 0);
        assert_eq!(user, User::new("alice", "pw"));
    }

    #[test]
    fn test_user_expiry() {
        let mut user = User::new("bob", "pw");
        user.expire_time = Utc::now() - Duration::seconds(1);
        assert!(user.is_expired(Utc::now()));
    }

    #[test]
    fn test_nas_status_serde() {
        let nas: Nas = serde_json::from_str(
            r#"{"ipaddr": "10.0.0.1", "secret": "s", "status": "disabled", "vendor_code": "2011"}"#,
        )
        .unwrap();
        assert!(!nas.is_enabled());
        assert_eq!(nas.vendor_code, "2011");
    }
}
