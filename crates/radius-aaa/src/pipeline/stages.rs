//! Built-in stages of the authentication pipeline

use super::context::META_AUTH_METHOD;
use super::{AuthRequestContext, PipelineStage};
use crate::config::{enabled_eap_handlers, keys, ConfigProvider};
use crate::eap::EapCoordinator;
use crate::error::AuthError;
use crate::ratelimit::AuthRateLimiter;
use crate::registry::PluginRegistry;
use crate::repository::{NasRepository, Repositories, UserRepository};
use crate::plugins::vendors::{is_placeholder_mac, normalize_mac};
use async_trait::async_trait;
use chrono::Utc;
use radius_wire::{AttributeType, Code};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything the default stages are built from
#[derive(Clone)]
pub struct PipelineDeps {
    pub registry: Arc<PluginRegistry>,
    pub repositories: Repositories,
    pub rate_limiter: Arc<AuthRateLimiter>,
    pub eap: Arc<EapCoordinator>,
    pub config: Arc<dyn ConfigProvider>,
}

pub(crate) fn default_stages(deps: &PipelineDeps) -> Vec<Arc<dyn PipelineStage>> {
    vec![
        Arc::new(RequestMetadataStage {
            config: Arc::clone(&deps.config),
        }),
        Arc::new(NasLookupStage {
            nas: Arc::clone(&deps.repositories.nas),
        }),
        Arc::new(RateLimitStage {
            limiter: Arc::clone(&deps.rate_limiter),
        }),
        Arc::new(VendorParseStage {
            registry: Arc::clone(&deps.registry),
        }),
        Arc::new(LoadUserStage {
            users: Arc::clone(&deps.repositories.users),
        }),
        Arc::new(EapDispatchStage {
            eap: Arc::clone(&deps.eap),
        }),
        Arc::new(PluginAuthStage {
            registry: Arc::clone(&deps.registry),
            users: Arc::clone(&deps.repositories.users),
        }),
    ]
}

pub struct RequestMetadataStage {
    config: Arc<dyn ConfigProvider>,
}

impl RequestMetadataStage {
    fn preferred_eap_method(&self) -> String {
        if let Some(method) = self.config.get_string(keys::EAP_METHOD) {
            let method = method.trim().to_ascii_lowercase();
            if !method.is_empty() {
                return method;
            }
        }
        enabled_eap_handlers(self.config.as_ref())
            .into_iter()
            .next()
            .filter(|m| m != "*")
            .unwrap_or_default()
    }
}

#[async_trait]
impl PipelineStage for RequestMetadataStage {
    fn name(&self) -> &'static str {
        "request_metadata"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        ctx.eap_method = self.preferred_eap_method();

        let packet = ctx.packet();
        let is_eap = packet.has_attribute(AttributeType::EapMessage);
        let username = packet.string_value(AttributeType::UserName);
        let nas_identifier = packet.string_value(AttributeType::NasIdentifier);
        let calling_station_id = packet.string_value(AttributeType::CallingStationId);

        ctx.is_eap = is_eap;
        ctx.remote_ip = ctx.request.remote_addr.ip();
        ctx.username = username;
        ctx.nas_identifier = nas_identifier;
        ctx.calling_station_id = calling_station_id;

        if ctx.username.is_empty() {
            return Err(AuthError::Malformed("missing User-Name".into()));
        }
        debug!(
            username = %ctx.username,
            client_ip = %ctx.remote_ip,
            request_id = ctx.packet().identifier,
            eap = ctx.is_eap,
            "Access-Request"
        );
        Ok(())
    }
}

pub struct NasLookupStage {
    nas: Arc<dyn NasRepository>,
}

#[async_trait]
impl PipelineStage for NasLookupStage {
    fn name(&self) -> &'static str {
        "nas_lookup"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        let nas = self
            .nas
            .get_by_ip_or_identifier(ctx.remote_ip, &ctx.nas_identifier)
            .await?
            .filter(|n| n.is_enabled())
            .ok_or_else(|| {
                AuthError::UnauthorizedNas(format!("{} ({})", ctx.remote_ip, ctx.nas_identifier))
            })?;

        ctx.secret = nas.secret.as_bytes().to_vec();
        ctx.response = Some(ctx.packet().reply(Code::AccessAccept));
        ctx.nas = Some(nas);
        Ok(())
    }
}

pub struct RateLimitStage {
    limiter: Arc<AuthRateLimiter>,
}

#[async_trait]
impl PipelineStage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        // EAP spans several requests per login
        if ctx.is_eap {
            return Ok(());
        }
        match self.limiter.try_acquire(&ctx.username) {
            Some(permit) => {
                ctx.rate_limit = Some(permit);
                Ok(())
            }
            None => Err(AuthError::RateLimited(ctx.username.clone())),
        }
    }
}

pub struct VendorParseStage {
    registry: Arc<PluginRegistry>,
}

#[async_trait]
impl PipelineStage for VendorParseStage {
    fn name(&self) -> &'static str {
        "vendor_parse"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        let Some(parser) = self.registry.vendor_parser(ctx.vendor_code()) else {
            return Ok(());
        };
        ctx.vendor_request = parser.parse(ctx.packet());

        // MAC authentication: the NAS sends the client MAC as User-Name
        let mac = &ctx.vendor_request.mac_addr;
        ctx.is_mac_auth = !mac.is_empty() && normalize_mac(&ctx.username) == *mac;
        if ctx.is_mac_auth {
            debug!(mac = %mac, "MAC authentication request");
        }
        Ok(())
    }
}

pub struct LoadUserStage {
    users: Arc<dyn UserRepository>,
}

#[async_trait]
impl PipelineStage for LoadUserStage {
    fn name(&self) -> &'static str {
        "load_user"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        let user = if ctx.is_mac_auth {
            match self.users.get_by_mac(&ctx.vendor_request.mac_addr).await? {
                Some(user) => Some(user),
                None => self.users.get_by_username(&ctx.username).await?,
            }
        } else {
            self.users.get_by_username(&ctx.username).await?
        };
        let user = user.ok_or_else(|| AuthError::UserNotFound(ctx.username.clone()))?;

        if !user.is_enabled() {
            return Err(AuthError::UserDisabled(user.username));
        }
        if user.is_expired(Utc::now()) {
            return Err(AuthError::UserExpired(user.username));
        }
        ctx.user = Some(user);
        Ok(())
    }
}

pub struct EapDispatchStage {
    eap: Arc<EapCoordinator>,
}

#[async_trait]
impl PipelineStage for EapDispatchStage {
    fn name(&self) -> &'static str {
        "eap_dispatch"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        if !ctx.is_eap {
            return Ok(());
        }
        let result = self.eap.handle(ctx)?;
        if result.success {
            ctx.skip_password_validation = true;
            ctx.set_metadata(META_AUTH_METHOD, "eap");
        } else if result.handled {
            // Access-Challenge already queued
            ctx.stopped = true;
        }
        Ok(())
    }
}

pub struct PluginAuthStage {
    registry: Arc<PluginRegistry>,
    users: Arc<dyn UserRepository>,
}

impl PluginAuthStage {
    fn validate_password(&self, ctx: &mut AuthRequestContext, password: &str) -> Result<(), AuthError> {
        let validator = self
            .registry
            .password_validators()
            .into_iter()
            .find(|v| v.can_handle(ctx))
            .ok_or_else(|| AuthError::NoHandler("no password validator for request".into()))?;
        validator.validate(ctx, password)?;
        ctx.set_metadata(META_AUTH_METHOD, validator.name());
        Ok(())
    }

    /// Store MAC/VLAN seen on the first successful login; failures only log
    async fn learn_bindings(&self, ctx: &AuthRequestContext) {
        let Some(user) = ctx.user.as_ref() else {
            return;
        };
        let vendor = &ctx.vendor_request;

        if is_placeholder_mac(&user.mac_addr) && !vendor.mac_addr.is_empty() {
            if let Err(e) = self
                .users
                .update_mac_addr(&user.username, &vendor.mac_addr)
                .await
            {
                warn!(username = %user.username, error = %e, "failed to store MAC binding");
            }
        }
        if user.vlan_id1 == 0 && user.vlan_id2 == 0 && (vendor.vlan_id1 != 0 || vendor.vlan_id2 != 0) {
            if let Err(e) = self
                .users
                .update_vlan_id(&user.username, vendor.vlan_id1, vendor.vlan_id2)
                .await
            {
                warn!(username = %user.username, error = %e, "failed to store VLAN binding");
            }
        }
        if let Err(e) = self.users.update_last_online(&user.username).await {
            warn!(username = %user.username, error = %e, "failed to update last online time");
        }
    }
}

#[async_trait]
impl PipelineStage for PluginAuthStage {
    fn name(&self) -> &'static str {
        "plugin_auth"
    }

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        let user = ctx
            .user
            .clone()
            .ok_or_else(|| AuthError::UserNotFound(ctx.username.clone()))?;

        if ctx.is_mac_auth || ctx.skip_password_validation {
            if ctx.is_mac_auth {
                ctx.set_metadata(META_AUTH_METHOD, "mac");
            }
        } else {
            self.validate_password(ctx, &user.password)?;
        }

        for checker in self.registry.policy_checkers() {
            checker.check(ctx, &user).await?;
        }
        for enhancer in self.registry.enhancers() {
            enhancer.enhance(ctx).await?;
        }

        self.learn_bindings(ctx).await;
        ctx.stopped = true;
        Ok(())
    }
}
