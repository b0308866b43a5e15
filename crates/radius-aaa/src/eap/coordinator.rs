use super::state::{EapChallengeState, EapStateStore, StateCleanup};
use super::{EapHandler, EapMethodOutcome, EapRoundContext};
use crate::config::{enabled_eap_handlers, keys, ConfigProvider};
use crate::error::AuthError;
use crate::pipeline::context::META_EAP_STATE;
use crate::pipeline::AuthRequestContext;
use crate::registry::PluginRegistry;
use radius_wire::eap::{add_eap_to_radius_packet, eap_from_radius_packet, eap_to_radius_attributes};
use radius_wire::{
    verify_packet_message_authenticator, Attribute, AttributeType, Code, EapCode, EapError,
    EapPacket, EapType,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one EAP round as seen by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EapResult {
    /// The request carried EAP and was answered by the coordinator
    pub handled: bool,
    /// The method authenticated the peer
    pub success: bool,
}

fn malformed(e: EapError) -> AuthError {
    AuthError::Malformed(format!("EAP: {}", e))
}

/// Placeholder filled in when the reply is signed
fn message_authenticator() -> Result<Attribute, AuthError> {
    Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16])
        .map_err(|e| AuthError::Other(e.to_string()))
}

pub struct EapCoordinator {
    registry: Arc<PluginRegistry>,
    store: Arc<EapStateStore>,
    config: Arc<dyn ConfigProvider>,
}

impl EapCoordinator {
    pub fn new(
        registry: Arc<PluginRegistry>,
        store: Arc<EapStateStore>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        EapCoordinator {
            registry,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<EapStateStore> {
        &self.store
    }

    fn is_enabled(enabled: &[String], name: &str) -> bool {
        enabled.iter().any(|e| e == "*" || e.eq_ignore_ascii_case(name))
    }

    /// Preferred method, then the allow-list in order, then anything
    /// registered when fallback is on
    fn select_handler(&self, preferred: &str) -> Result<Arc<dyn EapHandler>, AuthError> {
        let enabled = enabled_eap_handlers(self.config.as_ref());

        if !preferred.is_empty() && Self::is_enabled(&enabled, preferred) {
            if let Some(handler) = self.registry.eap_handler_by_name(preferred) {
                return Ok(handler);
            }
        }
        for name in enabled.iter().filter(|n| n.as_str() != "*") {
            if let Some(handler) = self.registry.eap_handler_by_name(name) {
                return Ok(handler);
            }
        }

        let fallback = self
            .config
            .get_bool(keys::EAP_FALLBACK_TO_ANY)
            .unwrap_or(true);
        if fallback || enabled.iter().any(|n| n == "*") {
            if let Some(handler) = self.registry.eap_handlers().into_iter().next() {
                debug!(method = handler.name(), "falling back to first registered EAP method");
                return Ok(handler);
            }
        }
        Err(AuthError::NoHandler(format!(
            "no EAP method available for preference {:?}",
            preferred
        )))
    }

    /// First Nak proposal that is both enabled and registered
    fn select_from_nak(&self, proposed: &[u8]) -> Option<Arc<dyn EapHandler>> {
        let enabled = enabled_eap_handlers(self.config.as_ref());
        proposed
            .iter()
            .filter_map(|t| self.registry.eap_handler(*t))
            .find(|h| Self::is_enabled(&enabled, h.name()))
    }

    /// Queue an Access-Challenge carrying `request` on the context
    fn challenge(
        &self,
        ctx: &mut AuthRequestContext,
        request: &EapPacket,
        state_id: &str,
    ) -> Result<(), AuthError> {
        let mut reply = ctx.packet().reply(Code::AccessChallenge);
        add_eap_to_radius_packet(&mut reply, request).map_err(malformed)?;
        reply.add_attribute(
            Attribute::string(AttributeType::State as u8, state_id)
                .map_err(|e| AuthError::Other(e.to_string()))?,
        );
        reply.add_attribute(message_authenticator()?);
        ctx.response = Some(reply);
        ctx.set_metadata(META_EAP_STATE, state_id);
        Ok(())
    }

    /// Run one EAP round for the request in `ctx`
    pub fn handle(&self, ctx: &mut AuthRequestContext) -> Result<EapResult, AuthError> {
        let Some(eap) = eap_from_radius_packet(ctx.packet()).map_err(malformed)? else {
            return Ok(EapResult::default());
        };

        match verify_packet_message_authenticator(ctx.packet(), &ctx.secret) {
            Ok(true) => {}
            Ok(false) => {
                return Err(AuthError::Malformed(
                    "invalid Message-Authenticator".to_string(),
                ))
            }
            Err(e) => return Err(AuthError::Malformed(e.to_string())),
        }

        ctx.eap_identifier = Some(eap.identifier);
        if eap.code != EapCode::Response {
            return Err(AuthError::Malformed(format!(
                "unexpected EAP code {:?}",
                eap.code
            )));
        }

        let password = ctx
            .user
            .as_ref()
            .map(|u| u.password.clone())
            .ok_or_else(|| AuthError::UserNotFound(ctx.username.clone()))?;

        match eap.eap_type() {
            Some(EapType::Identity) => self.start(ctx, &eap, &password),
            Some(EapType::Nak) => self.renegotiate(ctx, &eap, &password),
            _ => self.resume(ctx, &eap, &password),
        }
    }

    fn start(
        &self,
        ctx: &mut AuthRequestContext,
        eap: &EapPacket,
        password: &str,
    ) -> Result<EapResult, AuthError> {
        let handler = self.select_handler(&ctx.eap_method)?;
        let state_id = hex::encode(rand::random::<[u8; 16]>());

        let mut state = EapChallengeState::new(state_id.clone(), ctx.username.clone());
        state.method = handler.name().to_string();
        state.eap_identifier = eap.identifier.wrapping_add(1);

        let request = {
            let round = EapRoundContext {
                username: &ctx.username,
                password,
                secret: &ctx.secret,
                request_authenticator: ctx.request_authenticator(),
            };
            handler.initiate(&mut state, &round).map_err(malformed)?
        };

        debug!(
            username = %ctx.username,
            method = handler.name(),
            state = %state_id,
            "EAP conversation started"
        );
        self.store.insert(state);
        self.challenge(ctx, &request, &state_id)?;
        Ok(EapResult {
            handled: true,
            success: false,
        })
    }

    fn load_state(&self, ctx: &AuthRequestContext) -> Result<EapChallengeState, AuthError> {
        let state_id = ctx.packet().string_value(AttributeType::State);
        if state_id.is_empty() {
            return Err(AuthError::Malformed("EAP response without State".into()));
        }
        let state = self
            .store
            .get(&state_id)
            .ok_or_else(|| AuthError::Malformed("unknown or expired EAP state".into()))?;
        if state.username != ctx.username {
            warn!(
                username = %ctx.username,
                state_user = %state.username,
                "EAP state belongs to another user"
            );
            return Err(AuthError::Malformed("EAP state user mismatch".into()));
        }
        Ok(state)
    }

    fn renegotiate(
        &self,
        ctx: &mut AuthRequestContext,
        eap: &EapPacket,
        password: &str,
    ) -> Result<EapResult, AuthError> {
        let mut state = self.load_state(ctx)?;
        let mut cleanup = StateCleanup::new(&self.store, state.state_id.clone());

        let proposed = eap.nak_desired_types();
        let handler = self.select_from_nak(&proposed).ok_or_else(|| {
            AuthError::NoHandler(format!("none of the proposed EAP types {:?}", proposed))
        })?;

        info!(
            username = %ctx.username,
            from = %state.method,
            to = handler.name(),
            "EAP method renegotiated"
        );
        state.method = handler.name().to_string();
        state.challenge.clear();
        state.method_data.clear();
        state.eap_identifier = eap.identifier.wrapping_add(1);

        let request = {
            let round = EapRoundContext {
                username: &ctx.username,
                password,
                secret: &ctx.secret,
                request_authenticator: ctx.request_authenticator(),
            };
            handler.initiate(&mut state, &round).map_err(malformed)?
        };

        let state_id = state.state_id.clone();
        self.store.update(state);
        cleanup.disarm();
        self.challenge(ctx, &request, &state_id)?;
        Ok(EapResult {
            handled: true,
            success: false,
        })
    }

    fn resume(
        &self,
        ctx: &mut AuthRequestContext,
        eap: &EapPacket,
        password: &str,
    ) -> Result<EapResult, AuthError> {
        let mut state = self.load_state(ctx)?;
        let state_id = state.state_id.clone();
        // dropped on every exit except a further challenge
        let mut cleanup = StateCleanup::new(&self.store, state_id.clone());

        let handler = self
            .registry
            .eap_handler_by_name(&state.method)
            .ok_or_else(|| AuthError::NoHandler(format!("EAP method {}", state.method)))?;
        if eap.type_code != Some(handler.eap_type()) {
            return Err(AuthError::Malformed(format!(
                "EAP type {:?} does not match method {}",
                eap.type_code, state.method
            )));
        }

        let outcome = {
            let round = EapRoundContext {
                username: &ctx.username,
                password,
                secret: &ctx.secret,
                request_authenticator: ctx.request_authenticator(),
            };
            handler
                .handle_response(&mut state, eap, &round)
                .map_err(malformed)?
        };

        match outcome {
            EapMethodOutcome::Challenge(request) => {
                self.store.update(state);
                cleanup.disarm();
                self.challenge(ctx, &request, &state_id)?;
                Ok(EapResult {
                    handled: true,
                    success: false,
                })
            }
            EapMethodOutcome::Success { attributes } => {
                info!(username = %ctx.username, method = handler.name(), "EAP authentication succeeded");
                let success = EapPacket::success(eap.identifier);
                ctx.accept_attributes
                    .extend(eap_to_radius_attributes(&success).map_err(malformed)?);
                ctx.accept_attributes.extend(attributes);
                ctx.accept_attributes.push(message_authenticator()?);
                ctx.set_metadata(META_EAP_STATE, state_id.as_str());
                Ok(EapResult {
                    handled: true,
                    success: true,
                })
            }
            EapMethodOutcome::Failure => {
                debug!(username = %ctx.username, method = handler.name(), "EAP method failed");
                Err(AuthError::PasswordMismatch)
            }
        }
    }
}
