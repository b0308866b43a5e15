use super::sign_and_write;
use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::error::{AuthError, RejectKind};
use crate::metrics::AuthMetrics;
use crate::pipeline::{AuthPipeline, AuthRequestContext};
use crate::plugins::GuardDecision;
use crate::registry::PluginRegistry;
use crate::server::{RadiusService, Request, ResponseWriter};
use async_trait::async_trait;
use radius_wire::eap::add_eap_to_radius_packet;
use radius_wire::{Attribute, AttributeType, Code, EapPacket, Packet};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const INTERNAL_ERROR_MESSAGE: &str = "internal error";

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

fn message_authenticator() -> Option<Attribute> {
    Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16]).ok()
}

fn reply_message(text: &str) -> Option<Attribute> {
    Attribute::string(AttributeType::ReplyMessage as u8, text).ok()
}

/// Answers Access-Request and Status-Server
pub struct AuthService {
    pipeline: Arc<AuthPipeline>,
    registry: Arc<PluginRegistry>,
    metrics: Arc<AuthMetrics>,
    audit: Arc<AuditLogger>,
}

impl AuthService {
    pub fn new(
        pipeline: Arc<AuthPipeline>,
        registry: Arc<PluginRegistry>,
        metrics: Arc<AuthMetrics>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        AuthService {
            pipeline,
            registry,
            metrics,
            audit,
        }
    }

    async fn authenticate(&self, writer: Arc<dyn ResponseWriter>, request: Request) {
        // kept outside the task so a panic can still be answered
        let packet = request.packet.clone();
        let secret = request.secret.clone();
        let remote_addr = request.remote_addr;

        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::spawn(async move {
            let mut ctx = AuthRequestContext::new(request);
            let result = pipeline.execute(&mut ctx).await;
            (ctx, result)
        });

        match task.await {
            Ok((ctx, Ok(()))) => self.finish(writer.as_ref(), ctx).await,
            Ok((ctx, Err(e))) => self.reject(writer.as_ref(), ctx, e).await,
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    let payload = join_error.into_panic();
                    panic_message(payload.as_ref()).to_string()
                } else {
                    join_error.to_string()
                };
                error!(
                    client_ip = %remote_addr.ip(),
                    request_id = packet.identifier,
                    panic = %message,
                    "authentication pipeline panicked"
                );
                self.metrics.record_panic();
                self.metrics.record_reject(RejectKind::Other);

                let mut reply = packet.reply(Code::AccessReject);
                reply.attributes.extend(reply_message(INTERNAL_ERROR_MESSAGE));
                sign_and_write(writer.as_ref(), reply, &packet.authenticator, &secret).await;
            }
        }
    }

    async fn finish(&self, writer: &dyn ResponseWriter, mut ctx: AuthRequestContext) {
        let request_authenticator = *ctx.request_authenticator();

        let Some(mut reply) = ctx.response.take() else {
            let err = AuthError::Other("pipeline finished without a response".into());
            return self.reject(writer, ctx, err).await;
        };

        if reply.code == Code::AccessChallenge {
            debug!(username = %ctx.username, request_id = reply.identifier, "Access-Challenge");
            self.metrics.record_challenge();
            sign_and_write(writer, reply, &request_authenticator, &ctx.secret).await;
            return;
        }

        reply.attributes.append(&mut ctx.accept_attributes);
        info!(
            username = %ctx.username,
            client_ip = %ctx.remote_ip,
            request_id = reply.identifier,
            method = ctx.metadata_str(crate::pipeline::context::META_AUTH_METHOD).unwrap_or("-"),
            "Access-Accept"
        );
        self.metrics.record_accept();
        self.audit
            .log(
                AuditEntry::new(AuditEventType::AuthAccept)
                    .with_username(ctx.username.clone())
                    .with_nas_ip(ctx.remote_ip)
                    .with_nas_identifier(ctx.nas_identifier.clone())
                    .with_request_id(reply.identifier),
            )
            .await;
        sign_and_write(writer, reply, &request_authenticator, &ctx.secret).await;
    }

    /// Run the guards, then answer with an Access-Reject unless suppressed
    async fn reject(&self, writer: &dyn ResponseWriter, ctx: AuthRequestContext, err: AuthError) {
        let mut err = err;
        for guard in self.registry.guards() {
            err = match guard.on_error(&ctx, err) {
                GuardDecision::Pass(e) => e,
                GuardDecision::Replace(e) => {
                    debug!(guard = guard.name(), error = %e, "guard replaced error");
                    e
                }
                GuardDecision::Suppress => {
                    debug!(guard = guard.name(), username = %ctx.username, "guard suppressed reply");
                    self.metrics.record_dropped();
                    return;
                }
            };
        }

        let kind = err.kind();
        let request_id = ctx.packet().identifier;
        warn!(
            username = %ctx.username,
            client_ip = %ctx.remote_ip,
            request_id,
            reason = kind.metrics_tag(),
            stage = err.stage().unwrap_or("-"),
            error = %err,
            "Access-Reject"
        );
        self.metrics.record_reject(kind);

        let event = if kind == RejectKind::UnauthorizedNas {
            AuditEventType::UnauthorizedNas
        } else {
            AuditEventType::AuthReject
        };
        self.audit
            .log(
                AuditEntry::new(event)
                    .with_username(ctx.username.clone())
                    .with_nas_ip(ctx.remote_ip)
                    .with_nas_identifier(ctx.nas_identifier.clone())
                    .with_request_id(request_id)
                    .with_reject_kind(kind.metrics_tag())
                    .with_details(err.to_string()),
            )
            .await;

        let reply = self.build_reject(&ctx, &err);
        sign_and_write(writer, reply, ctx.request_authenticator(), &ctx.secret).await;
    }

    fn build_reject(&self, ctx: &AuthRequestContext, err: &AuthError) -> Packet {
        let mut reply = ctx.packet().reply(Code::AccessReject);
        reply.attributes.extend(reply_message(&err.reply_message()));

        if ctx.is_eap {
            let failure = EapPacket::failure(ctx.eap_identifier.unwrap_or(0));
            if let Err(e) = add_eap_to_radius_packet(&mut reply, &failure) {
                warn!(error = %e, "failed to attach EAP-Failure");
            }
            reply.attributes.extend(message_authenticator());
        }
        reply
    }

    async fn status_server(&self, writer: &dyn ResponseWriter, request: Request) {
        let mut reply = request.packet.reply(Code::AccessAccept);
        reply.attributes.extend(message_authenticator());
        debug!(client_ip = %request.remote_addr.ip(), "Status-Server");
        sign_and_write(writer, reply, &request.packet.authenticator, &request.secret).await;
    }
}

#[async_trait]
impl RadiusService for AuthService {
    async fn serve_radius(&self, writer: Arc<dyn ResponseWriter>, request: Request) {
        match request.packet.code {
            Code::AccessRequest => self.authenticate(writer, request).await,
            Code::StatusServer => self.status_server(writer.as_ref(), request).await,
            code => debug!(?code, client_ip = %request.remote_addr.ip(), "ignored packet on auth listener"),
        }
    }
}
