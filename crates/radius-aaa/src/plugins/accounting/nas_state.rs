use super::{AccountingContext, AccountingError, AccountingHandler};
use crate::repository::SessionRepository;
use async_trait::async_trait;
use radius_wire::AcctStatusType;
use std::sync::Arc;
use tracing::info;

/// Accounting-On/Off: the NAS lost every session it had
pub struct NasStateHandler {
    sessions: Arc<dyn SessionRepository>,
}

impl NasStateHandler {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        NasStateHandler { sessions }
    }
}

#[async_trait]
impl AccountingHandler for NasStateHandler {
    fn name(&self) -> &'static str {
        "nas_state"
    }

    fn can_handle(&self, status: AcctStatusType) -> bool {
        status.is_nas_status()
    }

    async fn handle(&self, ctx: &AccountingContext) -> Result<(), AccountingError> {
        let nas_addr = ctx.nas_addr();
        let nas_identifier = ctx.nas_identifier();
        let removed = self
            .sessions
            .batch_delete_by_nas(&nas_addr, &nas_identifier)
            .await?;

        info!(
            status = %ctx.status,
            nas = %nas_addr,
            nas_identifier = %nas_identifier,
            removed,
            "cleared sessions of NAS"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::repository::MemorySessionRepository;
    use chrono::Utc;

    #[tokio::test]
    async fn test_accounting_on_clears_nas_sessions() {
        let sessions = MemorySessionRepository::new();
        let handler = NasStateHandler::new(Arc::new(sessions.clone()));

        for (id, user) in [("s1", "alice"), ("s2", "bob")] {
            let ctx = acct_context(AcctStatusType::Start, id, user);
            sessions.create(ctx.new_session(Utc::now()).unwrap()).await.unwrap();
        }
        let mut other = acct_context(AcctStatusType::Start, "s3", "carol").new_session(Utc::now()).unwrap();
        other.nas_addr = "198.51.100.1".into();
        other.nas_id = "bras-2".into();
        sessions.create(other).await.unwrap();

        let ctx = acct_context(AcctStatusType::AccountingOn, "", "");
        handler.handle(&ctx).await.unwrap();

        assert_eq!(sessions.len(), 1);
        assert!(sessions.exists("s3").await.unwrap());
    }

    #[test]
    fn test_handles_on_and_off_only() {
        let handler = NasStateHandler::new(Arc::new(MemorySessionRepository::new()));
        assert!(handler.can_handle(AcctStatusType::AccountingOn));
        assert!(handler.can_handle(AcctStatusType::AccountingOff));
        assert!(!handler.can_handle(AcctStatusType::Start));
    }
}
