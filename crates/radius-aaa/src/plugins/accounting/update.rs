use super::{AccountingContext, AccountingError, AccountingHandler};
use crate::model::AccountingRecord;
use crate::repository::{AccountingRepository, SessionRepository};
use async_trait::async_trait;
use chrono::Utc;
use radius_wire::AcctStatusType;
use std::sync::Arc;
use tracing::{debug, warn};

/// Refreshes usage counters; recreates the session when its Start was lost
pub struct InterimUpdateHandler {
    sessions: Arc<dyn SessionRepository>,
    accounting: Arc<dyn AccountingRepository>,
}

impl InterimUpdateHandler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        accounting: Arc<dyn AccountingRepository>,
    ) -> Self {
        InterimUpdateHandler {
            sessions,
            accounting,
        }
    }
}

#[async_trait]
impl AccountingHandler for InterimUpdateHandler {
    fn name(&self) -> &'static str {
        "interim_update"
    }

    fn can_handle(&self, status: AcctStatusType) -> bool {
        status == AcctStatusType::InterimUpdate
    }

    async fn handle(&self, ctx: &AccountingContext) -> Result<(), AccountingError> {
        let session_id = ctx.session_id()?;
        let now = Utc::now();

        match self.sessions.get(&session_id).await? {
            Some(mut session) => {
                ctx.apply_counters(&mut session, now);
                self.sessions.update(session).await?;
                debug!(session_id = %session_id, "interim update");
            }
            None => {
                warn!(
                    username = %ctx.username,
                    session_id = %session_id,
                    "interim update for unknown session, recreating"
                );
                let session = ctx.new_session(now)?;
                if self.sessions.upsert(session.clone()).await? {
                    self.accounting
                        .create(AccountingRecord::from(&session))
                        .await?;
                }
            }
        }
        Ok(())
    }
}
