//! Access-Accept enrichment

use super::{RateProfile, ResponseEnhancer, VendorResponseBuilder};
use crate::config::{keys, ConfigProvider};
use crate::error::AuthError;
use crate::pipeline::AuthRequestContext;
use async_trait::async_trait;
use chrono::Utc;
use radius_wire::{Attribute, AttributeType, PacketError};
use std::net::Ipv6Addr;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_INTERIM_INTERVAL: i64 = 120;

fn to_auth_error(e: PacketError) -> AuthError {
    AuthError::Other(format!("building reply attribute: {}", e))
}

fn parse_ipv6_prefix(text: &str) -> Option<(Ipv6Addr, u8)> {
    let (addr, len) = text.trim().split_once('/')?;
    let len: u8 = len.parse().ok()?;
    (len <= 128).then_some(())?;
    Some((addr.parse().ok()?, len))
}

/// Session-Timeout, Acct-Interim-Interval and the framed address settings
/// of the user
pub struct DefaultEnhancer {
    config: Arc<dyn ConfigProvider>,
}

impl DefaultEnhancer {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        DefaultEnhancer { config }
    }
}

#[async_trait]
impl ResponseEnhancer for DefaultEnhancer {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn enhance(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        let Some(user) = ctx.user.as_ref() else {
            return Ok(());
        };

        let remaining = (user.expire_time - Utc::now()).num_seconds().max(0);
        let session_timeout = u32::try_from(remaining).unwrap_or(u32::MAX);

        let interim = self
            .config
            .get_int64(keys::ACCT_INTERIM_INTERVAL)
            .unwrap_or(DEFAULT_INTERIM_INTERVAL)
            .clamp(0, u32::MAX as i64) as u32;

        let mut attrs = vec![
            Attribute::integer(AttributeType::SessionTimeout as u8, session_timeout),
            Attribute::integer(AttributeType::AcctInterimInterval as u8, interim),
        ];
        if let Some(ip) = user.framed_ip {
            attrs.push(Attribute::ipv4(AttributeType::FramedIpAddress as u8, ip));
        }
        if let Some(pool) = user.addr_pool.as_deref().filter(|p| !p.is_empty()) {
            attrs.push(Attribute::string(AttributeType::FramedPool as u8, pool));
        }
        if let Some(prefix) = user.ipv6_prefix.as_deref().filter(|p| !p.is_empty()) {
            match parse_ipv6_prefix(prefix) {
                Some((addr, len)) => attrs.push(Attribute::ipv6_prefix(
                    AttributeType::FramedIpv6Prefix as u8,
                    addr,
                    len,
                )),
                None => warn!(
                    username = %user.username,
                    prefix = %prefix,
                    "ignoring malformed IPv6 prefix"
                ),
            }
        }

        let attrs = attrs
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_auth_error)?;
        ctx.accept_attributes.extend(attrs);
        Ok(())
    }
}

/// Bandwidth attributes for NAS devices of one vendor
pub struct VendorRateEnhancer {
    name: &'static str,
    vendor_code: String,
    builder: Arc<dyn VendorResponseBuilder>,
}

impl VendorRateEnhancer {
    pub fn new(name: &'static str, builder: Arc<dyn VendorResponseBuilder>) -> Self {
        VendorRateEnhancer {
            name,
            vendor_code: builder.vendor_code().to_string(),
            builder,
        }
    }
}

#[async_trait]
impl ResponseEnhancer for VendorRateEnhancer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn enhance(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        if ctx.vendor_code() != self.vendor_code {
            return Ok(());
        }
        let Some(user) = ctx.user.as_ref() else {
            return Ok(());
        };
        let profile = RateProfile {
            up_rate: user.up_rate,
            down_rate: user.down_rate,
        };
        let attrs = self.builder.build(&profile).map_err(to_auth_error)?;
        ctx.accept_attributes.extend(attrs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Nas, User};
    use crate::pipeline::context::test_context;
    use crate::plugins::vendors::{HuaweiResponseBuilder, MikrotikResponseBuilder};
    use radius_wire::{Code, Packet};
    use std::collections::HashMap;

    fn ctx_with(user: User, vendor_code: &str) -> AuthRequestContext {
        let mut ctx = test_context(Packet::new(Code::AccessRequest, 1, [0; 16]), b"s");
        let mut nas = Nas::new("192.0.2.10".parse().unwrap(), "s");
        nas.vendor_code = vendor_code.to_string();
        ctx.nas = Some(nas);
        ctx.user = Some(user);
        ctx
    }

    fn find(ctx: &AuthRequestContext, t: AttributeType) -> Option<&Attribute> {
        ctx.accept_attributes.iter().find(|a| a.attr_type == t as u8)
    }

    #[tokio::test]
    async fn test_default_enhancer() {
        let mut user = User::new("alice", "pw");
        user.expire_time = Utc::now() + chrono::Duration::seconds(3600);
        user.framed_ip = Some("10.1.1.1".parse().unwrap());
        user.addr_pool = Some("pool-a".into());
        user.ipv6_prefix = Some("2001:db8::/64".into());

        let mut config = HashMap::new();
        config.insert(keys::ACCT_INTERIM_INTERVAL.to_string(), "300".to_string());
        let enhancer = DefaultEnhancer::new(Arc::new(config));

        let mut ctx = ctx_with(user, "default");
        enhancer.enhance(&mut ctx).await.unwrap();

        let timeout = find(&ctx, AttributeType::SessionTimeout).unwrap().as_integer().unwrap();
        assert!((3590..=3600).contains(&timeout));
        assert_eq!(
            find(&ctx, AttributeType::AcctInterimInterval).unwrap().as_integer().unwrap(),
            300
        );
        assert_eq!(
            find(&ctx, AttributeType::FramedIpAddress).unwrap().as_ipv4().unwrap(),
            [10, 1, 1, 1]
        );
        assert_eq!(find(&ctx, AttributeType::FramedPool).unwrap().value, b"pool-a");
        assert!(find(&ctx, AttributeType::FramedIpv6Prefix).is_some());
    }

    #[tokio::test]
    async fn test_session_timeout_saturates() {
        let user = User::new("alice", "pw");
        let enhancer = DefaultEnhancer::new(Arc::new(HashMap::<String, String>::new()));
        let mut ctx = ctx_with(user, "default");
        enhancer.enhance(&mut ctx).await.unwrap();

        assert_eq!(
            find(&ctx, AttributeType::SessionTimeout).unwrap().as_integer().unwrap(),
            u32::MAX
        );
        assert_eq!(
            find(&ctx, AttributeType::AcctInterimInterval).unwrap().as_integer().unwrap(),
            120
        );
    }

    #[tokio::test]
    async fn test_vendor_enhancer_only_for_its_vendor() {
        let mut user = User::new("alice", "pw");
        user.up_rate = 10;
        user.down_rate = 20;

        let huawei = VendorRateEnhancer::new("huawei", Arc::new(HuaweiResponseBuilder));
        let mut ctx = ctx_with(user.clone(), "2011");
        huawei.enhance(&mut ctx).await.unwrap();
        assert_eq!(ctx.accept_attributes.len(), 4);

        let mikrotik = VendorRateEnhancer::new("mikrotik", Arc::new(MikrotikResponseBuilder));
        let mut ctx = ctx_with(user, "2011");
        mikrotik.enhance(&mut ctx).await.unwrap();
        assert!(ctx.accept_attributes.is_empty());
    }

    #[test]
    fn test_parse_ipv6_prefix() {
        assert!(parse_ipv6_prefix("2001:db8::/64").is_some());
        assert!(parse_ipv6_prefix("2001:db8::/129").is_none());
        assert!(parse_ipv6_prefix("2001:db8::").is_none());
        assert!(parse_ipv6_prefix("nope/64").is_none());
    }
}
