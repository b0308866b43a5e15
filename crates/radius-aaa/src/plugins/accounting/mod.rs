//! Accounting state machine
//!
//! One handler per Acct-Status-Type family. Handlers only touch the session
//! and accounting repositories; the Accounting-Response has already been
//! sent by the time they run.

mod nas_state;
mod start;
mod stop;
mod update;

pub use nas_state::NasStateHandler;
pub use start::StartHandler;
pub use stop::StopHandler;
pub use update::InterimUpdateHandler;

use super::VendorRequest;
use crate::model::{Nas, OnlineSession};
use crate::repository::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use radius_wire::{AcctStatusType, AttributeType, Packet};
use std::net::{IpAddr, Ipv6Addr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountingError {
    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("unknown Acct-Status-Type {0}")]
    UnknownStatus(u32),

    #[error("no accounting handler for {0}")]
    NoHandler(AcctStatusType),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait AccountingHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, status: AcctStatusType) -> bool;

    async fn handle(&self, ctx: &AccountingContext) -> Result<(), AccountingError>;
}

/// One decoded Accounting-Request
#[derive(Debug, Clone)]
pub struct AccountingContext {
    pub packet: Packet,
    pub status: AcctStatusType,
    pub username: String,
    /// Source address of the datagram
    pub remote_ip: IpAddr,
    pub nas: Option<Nas>,
    pub vendor_request: VendorRequest,
}

/// 64-bit counter from the octets attribute and its gigawords companion
fn octets(packet: &Packet, low: AttributeType, high: AttributeType) -> u64 {
    let low = u64::from(packet.integer_value(low).unwrap_or(0));
    let high = u64::from(packet.integer_value(high).unwrap_or(0));
    (high << 32) | low
}

/// Framed-IPv6-Prefix value as `addr/len`
pub(crate) fn decode_ipv6_prefix(value: &[u8]) -> Option<String> {
    let (&len, rest) = value.get(1..)?.split_first()?;
    if len > 128 || rest.len() > 16 {
        return None;
    }
    let mut octets = [0u8; 16];
    octets[..rest.len()].copy_from_slice(rest);
    Some(format!("{}/{}", Ipv6Addr::from(octets), len))
}

impl AccountingContext {
    pub fn session_id(&self) -> Result<String, AccountingError> {
        let id = self.packet.string_value(AttributeType::AcctSessionId);
        if id.is_empty() {
            return Err(AccountingError::MissingAttribute("Acct-Session-Id"));
        }
        Ok(id)
    }

    /// NAS-IP-Address when sent, otherwise the datagram source
    pub fn nas_addr(&self) -> String {
        self.packet
            .ipv4_value(AttributeType::NasIpAddress)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| self.remote_ip.to_string())
    }

    pub fn nas_identifier(&self) -> String {
        let sent = self.packet.string_value(AttributeType::NasIdentifier);
        if !sent.is_empty() {
            return sent;
        }
        self.nas
            .as_ref()
            .map(|n| n.identifier.clone())
            .unwrap_or_default()
    }

    pub fn input_octets(&self) -> u64 {
        octets(
            &self.packet,
            AttributeType::AcctInputOctets,
            AttributeType::AcctInputGigawords,
        )
    }

    pub fn output_octets(&self) -> u64 {
        octets(
            &self.packet,
            AttributeType::AcctOutputOctets,
            AttributeType::AcctOutputGigawords,
        )
    }

    fn integer(&self, attr: AttributeType) -> u32 {
        self.packet.integer_value(attr).unwrap_or(0)
    }

    /// Fresh session row built from this request
    pub fn new_session(&self, now: DateTime<Utc>) -> Result<OnlineSession, AccountingError> {
        let session_time = self.integer(AttributeType::AcctSessionTime);
        let mut session = OnlineSession {
            acct_session_id: self.session_id()?,
            username: self.username.clone(),
            nas_id: self.nas_identifier(),
            nas_addr: self.nas_addr(),
            nas_port_id: self.packet.string_value(AttributeType::NasPortId),
            mac_addr: self.vendor_request.mac_addr.clone(),
            framed_ipaddr: self
                .packet
                .ipv4_value(AttributeType::FramedIpAddress)
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
            framed_ipv6_prefix: self
                .packet
                .bytes_value(AttributeType::FramedIpv6Prefix)
                .and_then(decode_ipv6_prefix)
                .unwrap_or_default(),
            session_timeout: self.integer(AttributeType::SessionTimeout),
            acct_session_time: 0,
            acct_input_total: 0,
            acct_output_total: 0,
            acct_input_packets: 0,
            acct_output_packets: 0,
            acct_start_time: now - Duration::seconds(i64::from(session_time)),
            last_update: now,
        };
        self.apply_counters(&mut session, now);
        Ok(session)
    }

    /// Copy the usage counters of this request onto a session row
    pub fn apply_counters(&self, session: &mut OnlineSession, now: DateTime<Utc>) {
        session.acct_session_time = self.integer(AttributeType::AcctSessionTime);
        session.acct_input_total = self.input_octets();
        session.acct_output_total = self.output_octets();
        session.acct_input_packets = self.integer(AttributeType::AcctInputPackets);
        session.acct_output_packets = self.integer(AttributeType::AcctOutputPackets);
        session.last_update = now;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use radius_wire::{Attribute, Code};

    pub fn acct_context(status: AcctStatusType, session_id: &str, username: &str) -> AccountingContext {
        let mut packet = Packet::new(Code::AccountingRequest, 1, [0; 16]);
        packet.add_attribute(Attribute::integer(AttributeType::AcctStatusType as u8, status.as_u32()).unwrap());
        if !session_id.is_empty() {
            packet.add_attribute(
                Attribute::string(AttributeType::AcctSessionId as u8, session_id).unwrap(),
            );
        }
        packet.add_attribute(Attribute::string(AttributeType::UserName as u8, username).unwrap());
        packet.add_attribute(Attribute::string(AttributeType::NasIdentifier as u8, "bras-1").unwrap());
        AccountingContext {
            packet,
            status,
            username: username.to_string(),
            remote_ip: "192.0.2.10".parse().unwrap(),
            nas: None,
            vendor_request: VendorRequest::default(),
        }
    }

    pub fn with_counters(mut ctx: AccountingContext, session_time: u32, input: u32, input_giga: u32) -> AccountingContext {
        for (t, v) in [
            (AttributeType::AcctSessionTime, session_time),
            (AttributeType::AcctInputOctets, input),
            (AttributeType::AcctInputGigawords, input_giga),
            (AttributeType::AcctOutputOctets, 500),
            (AttributeType::AcctInputPackets, 10),
            (AttributeType::AcctOutputPackets, 20),
        ] {
            ctx.packet.set_attribute(Attribute::integer(t as u8, v).unwrap());
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_gigawords_extend_counters() {
        let ctx = with_counters(acct_context(AcctStatusType::InterimUpdate, "s1", "alice"), 60, 7, 2);
        assert_eq!(ctx.input_octets(), (2u64 << 32) | 7);
        assert_eq!(ctx.output_octets(), 500);
    }

    #[test]
    fn test_nas_addr_and_identifier() {
        let ctx = acct_context(AcctStatusType::Start, "s1", "alice");
        assert_eq!(ctx.nas_addr(), "192.0.2.10");
        assert_eq!(ctx.nas_identifier(), "bras-1");
    }

    #[test]
    fn test_missing_session_id() {
        let ctx = acct_context(AcctStatusType::Start, "", "alice");
        assert!(matches!(
            ctx.session_id(),
            Err(AccountingError::MissingAttribute("Acct-Session-Id"))
        ));
    }

    #[test]
    fn test_decode_ipv6_prefix() {
        assert_eq!(
            decode_ipv6_prefix(&[0, 64, 0x20, 0x01, 0x0d, 0xb8]).as_deref(),
            Some("2001:db8::/64")
        );
        assert_eq!(decode_ipv6_prefix(&[0]), None);
        assert_eq!(decode_ipv6_prefix(&[0, 200]), None);
    }

    #[test]
    fn test_new_session_backdates_start() {
        let now = Utc::now();
        let ctx = with_counters(acct_context(AcctStatusType::InterimUpdate, "s1", "alice"), 120, 1, 0);
        let session = ctx.new_session(now).unwrap();
        assert_eq!(session.acct_start_time, now - Duration::seconds(120));
        assert_eq!(session.acct_session_time, 120);
        assert_eq!(session.nas_id, "bras-1");
    }
}
