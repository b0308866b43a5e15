//! Accounting listener service
//!
//! The Accounting-Response goes out before any repository work so a slow
//! store never makes the NAS retransmit. Processing failures are logged
//! and counted but never change what the NAS was told.

use super::sign_and_write;
use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::metrics::AuthMetrics;
use crate::plugins::vendors::DEFAULT_VENDOR;
use crate::plugins::{AccountingContext, AccountingError};
use crate::registry::PluginRegistry;
use crate::repository::NasRepository;
use crate::server::{RadiusService, Request, ResponseWriter};
use async_trait::async_trait;
use radius_wire::{AcctStatusType, AttributeType, Code};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AcctService {
    registry: Arc<PluginRegistry>,
    nas: Arc<dyn NasRepository>,
    metrics: Arc<AuthMetrics>,
    audit: Arc<AuditLogger>,
}

impl AcctService {
    pub fn new(
        registry: Arc<PluginRegistry>,
        nas: Arc<dyn NasRepository>,
        metrics: Arc<AuthMetrics>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        AcctService {
            registry,
            nas,
            metrics,
            audit,
        }
    }

    /// Decode the request and hand it to the matching accounting handler
    pub async fn process(&self, request: Request) -> Result<(), AccountingError> {
        let packet = &request.packet;
        let raw_status = packet
            .integer_value(AttributeType::AcctStatusType)
            .ok_or(AccountingError::MissingAttribute("Acct-Status-Type"))?;
        let status =
            AcctStatusType::from_u32(raw_status).ok_or(AccountingError::UnknownStatus(raw_status))?;
        self.metrics.record_accounting(status);

        let remote_ip = request.remote_addr.ip();
        let nas_identifier = packet.string_value(AttributeType::NasIdentifier);
        let nas = self
            .nas
            .get_by_ip_or_identifier(remote_ip, &nas_identifier)
            .await?;

        let vendor_code = nas
            .as_ref()
            .map(|n| n.vendor_code.as_str())
            .unwrap_or(DEFAULT_VENDOR);
        let vendor_request = self
            .registry
            .vendor_parser(vendor_code)
            .map(|parser| parser.parse(packet))
            .unwrap_or_default();

        let ctx = AccountingContext {
            username: packet.string_value(AttributeType::UserName),
            packet: request.packet.clone(),
            status,
            remote_ip,
            nas,
            vendor_request,
        };

        if status.is_nas_status() {
            info!(
                nas_ip = %ctx.nas_addr(),
                nas_identifier = %ctx.nas_identifier(),
                status = %status,
                "NAS reported restart, clearing its sessions"
            );
            self.audit
                .log(
                    AuditEntry::new(AuditEventType::NasReboot)
                        .with_nas_ip(ctx.remote_ip)
                        .with_nas_identifier(ctx.nas_identifier())
                        .with_request_id(packet.identifier)
                        .with_details(status.to_string()),
                )
                .await;
        }

        let handler = self.registry.accounting_handler_for(status)?;
        debug!(
            handler = handler.name(),
            username = %ctx.username,
            status = %status,
            "dispatching accounting request"
        );
        handler.handle(&ctx).await
    }
}

#[async_trait]
impl RadiusService for AcctService {
    async fn serve_radius(&self, writer: Arc<dyn ResponseWriter>, request: Request) {
        if request.packet.code != Code::AccountingRequest {
            debug!(
                code = ?request.packet.code,
                client_ip = %request.remote_addr.ip(),
                "ignored packet on accounting listener"
            );
            return;
        }

        let reply = request.packet.reply(Code::AccountingResponse);
        sign_and_write(
            writer.as_ref(),
            reply,
            &request.packet.authenticator,
            &request.secret,
        )
        .await;

        // processed inline so the transport's worker permit covers it
        let client_ip = request.remote_addr.ip();
        let request_id = request.packet.identifier;
        if let Err(e) = self.process(request).await {
            self.metrics.record_accounting_error();
            warn!(%client_ip, request_id, error = %e, "accounting request failed");
        }
    }
}
