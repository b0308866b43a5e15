use super::{AccountingContext, AccountingError, AccountingHandler};
use crate::model::AccountingRecord;
use crate::repository::{AccountingRepository, SessionRepository};
use async_trait::async_trait;
use chrono::Utc;
use radius_wire::AcctStatusType;
use std::sync::Arc;
use tracing::{debug, info};

/// Opens the online session and the accounting record
pub struct StartHandler {
    sessions: Arc<dyn SessionRepository>,
    accounting: Arc<dyn AccountingRepository>,
}

impl StartHandler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        accounting: Arc<dyn AccountingRepository>,
    ) -> Self {
        StartHandler {
            sessions,
            accounting,
        }
    }
}

#[async_trait]
impl AccountingHandler for StartHandler {
    fn name(&self) -> &'static str {
        "start"
    }

    fn can_handle(&self, status: AcctStatusType) -> bool {
        status == AcctStatusType::Start
    }

    async fn handle(&self, ctx: &AccountingContext) -> Result<(), AccountingError> {
        let session = ctx.new_session(Utc::now())?;

        // a retransmitted Start refreshes the row and keeps the open record
        if !self.sessions.upsert(session.clone()).await? {
            debug!(session_id = %session.acct_session_id, "duplicate Start, session refreshed");
            return Ok(());
        }

        self.accounting
            .create(AccountingRecord::from(&session))
            .await?;

        info!(
            username = %ctx.username,
            session_id = %session.acct_session_id,
            nas = %session.nas_addr,
            "accounting start"
        );
        Ok(())
    }
}
