use super::{AccountingContext, AccountingError, AccountingHandler};
use crate::repository::{AccountingRepository, AccountingStop, SessionRepository};
use async_trait::async_trait;
use chrono::Utc;
use radius_wire::{AcctStatusType, AcctTerminateCause, AttributeType};
use std::sync::Arc;
use tracing::{info, warn};

/// Closes the accounting record and drops the online session
pub struct StopHandler {
    sessions: Arc<dyn SessionRepository>,
    accounting: Arc<dyn AccountingRepository>,
}

impl StopHandler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        accounting: Arc<dyn AccountingRepository>,
    ) -> Self {
        StopHandler {
            sessions,
            accounting,
        }
    }
}

#[async_trait]
impl AccountingHandler for StopHandler {
    fn name(&self) -> &'static str {
        "stop"
    }

    fn can_handle(&self, status: AcctStatusType) -> bool {
        status == AcctStatusType::Stop
    }

    async fn handle(&self, ctx: &AccountingContext) -> Result<(), AccountingError> {
        let session_id = ctx.session_id()?;
        let packet = &ctx.packet;

        let stop = AccountingStop {
            acct_stop_time: Utc::now(),
            acct_session_time: packet
                .integer_value(AttributeType::AcctSessionTime)
                .unwrap_or(0),
            acct_input_total: ctx.input_octets(),
            acct_output_total: ctx.output_octets(),
            acct_input_packets: packet
                .integer_value(AttributeType::AcctInputPackets)
                .unwrap_or(0),
            acct_output_packets: packet
                .integer_value(AttributeType::AcctOutputPackets)
                .unwrap_or(0),
            acct_terminate_cause: packet.integer_value(AttributeType::AcctTerminateCause),
        };

        // the session goes away even if the record cannot be closed
        if let Err(e) = self.accounting.update_stop(&session_id, stop).await {
            warn!(session_id = %session_id, error = %e, "failed to close accounting record");
        }
        self.sessions.delete(&session_id).await?;

        let cause = terminate_cause(packet.integer_value(AttributeType::AcctTerminateCause));
        info!(
            username = %ctx.username,
            session_id = %session_id,
            cause = %cause,
            "accounting stop"
        );
        Ok(())
    }
}

/// Readable Acct-Terminate-Cause for logs
fn terminate_cause(value: Option<u32>) -> String {
    match value {
        None => "none".to_string(),
        Some(v) => match AcctTerminateCause::from_u32(v) {
            Some(cause) => format!("{:?}", cause),
            None => format!("unknown({})", v),
        },
    }
}
