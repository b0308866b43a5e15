//! Wiring of repositories, plugins, pipeline and services

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::eap::{EapCoordinator, EapStateStore};
use crate::metrics::AuthMetrics;
use crate::pipeline::{AuthPipeline, PipelineDeps};
use crate::ratelimit::AuthRateLimiter;
use crate::registry::{PluginRegistry, RegistryDeps};
use crate::repository::Repositories;
use crate::server::{NasSecretProvider, RadiusServer, ServerError};
use crate::service::{AcctService, AuthService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

const RATE_LIMITER_MAX_ENTRIES: usize = 65_536;
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub struct Engine {
    config: Arc<Config>,
    repositories: Repositories,
    registry: Arc<PluginRegistry>,
    eap_states: Arc<EapStateStore>,
    pipeline: Arc<AuthPipeline>,
    metrics: Arc<AuthMetrics>,
    audit: Arc<AuditLogger>,
}

impl Engine {
    pub fn new(config: Arc<Config>, repositories: Repositories, audit: Arc<AuditLogger>) -> Self {
        let settings = config.radius.clone();

        let registry = Arc::new(PluginRegistry::with_defaults(RegistryDeps {
            config: config.clone(),
            settings: settings.clone(),
            sessions: Arc::clone(&repositories.sessions),
            accounting: Arc::clone(&repositories.accounting),
        }));

        let eap_states = Arc::new(EapStateStore::new(
            Duration::from_secs(settings.eap_state_ttl_secs),
            settings.eap_state_max_entries,
        ));
        let eap = Arc::new(EapCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&eap_states),
            config.clone(),
        ));

        let rate_limit_interval = Duration::from_secs(settings.auth_rate_limit_interval.max(0) as u64);
        let pipeline = AuthPipeline::with_default_stages(&PipelineDeps {
            registry: Arc::clone(&registry),
            repositories: repositories.clone(),
            rate_limiter: Arc::new(AuthRateLimiter::new(
                rate_limit_interval,
                RATE_LIMITER_MAX_ENTRIES,
            )),
            eap,
            config: config.clone(),
        });

        Engine {
            config,
            repositories,
            registry,
            eap_states,
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(AuthMetrics::new()),
            audit,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    pub fn metrics(&self) -> &Arc<AuthMetrics> {
        &self.metrics
    }

    pub fn eap_states(&self) -> &Arc<EapStateStore> {
        &self.eap_states
    }

    /// Stage list for customisation; services built afterwards see the change
    pub fn pipeline_mut(&mut self) -> &mut AuthPipeline {
        Arc::make_mut(&mut self.pipeline)
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            Arc::clone(&self.audit),
        )
    }

    pub fn acct_service(&self) -> AcctService {
        AcctService::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.repositories.nas),
            Arc::clone(&self.metrics),
            Arc::clone(&self.audit),
        )
    }

    /// Periodic removal of expired EAP conversations
    pub fn start_eap_sweeper(&self) -> JoinHandle<()> {
        let every = (Duration::from_secs(self.config.radius.eap_state_ttl_secs) / 2)
            .max(MIN_SWEEP_INTERVAL);
        self.eap_states.start_sweeper(every)
    }

    /// Bind the authentication and accounting sockets
    pub async fn bind(
        &self,
        auth_addr: SocketAddr,
        acct_addr: SocketAddr,
    ) -> Result<Listeners, ServerError> {
        let secrets = Arc::new(NasSecretProvider::new(Arc::clone(&self.repositories.nas)));
        let workers = self.config.max_workers;

        let auth = RadiusServer::bind(
            auth_addr,
            Arc::new(self.auth_service()),
            secrets.clone(),
            workers,
        )
        .await?;
        let acct = RadiusServer::bind(
            acct_addr,
            Arc::new(self.acct_service()),
            secrets,
            workers,
        )
        .await?;

        info!(
            auth = %auth.local_addr()?,
            acct = %acct.local_addr()?,
            stages = ?self.pipeline.stage_names(),
            "engine listening"
        );
        Ok(Listeners { auth, acct })
    }
}

/// Bound auth and accounting listeners
pub struct Listeners {
    pub auth: RadiusServer,
    pub acct: RadiusServer,
}

impl Listeners {
    /// Serve both sockets until one of them fails
    pub async fn run(self) -> Result<(), ServerError> {
        tokio::try_join!(self.auth.run(), self.acct.run())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AuthRequestContext, PipelineStage};
    use crate::error::AuthError;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl PipelineStage for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn execute(&self, _ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn engine() -> Engine {
        Engine::new(
            Arc::new(Config::default()),
            Repositories::in_memory(Vec::new(), Vec::new()),
            Arc::new(AuditLogger::disabled()),
        )
    }

    #[test]
    fn test_default_wiring() {
        let engine = engine();
        assert_eq!(engine.registry().password_validators().len(), 3);
        assert_eq!(engine.registry().accounting_handlers().len(), 4);
        assert_eq!(engine.registry().eap_handlers().len(), 2);
        assert!(engine.eap_states().is_empty());
    }

    #[test]
    fn test_pipeline_customisation() {
        let mut engine = engine();
        engine
            .pipeline_mut()
            .insert_after("nas_lookup", Arc::new(Noop))
            .unwrap();
        let names = engine.pipeline.stage_names();
        let nas = names.iter().position(|n| *n == "nas_lookup").unwrap();
        assert_eq!(names[nas + 1], "noop");
    }

    #[tokio::test]
    async fn test_bind_ephemeral_ports() {
        let engine = engine();
        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listeners = engine.bind(any, any).await.unwrap();
        assert_ne!(
            listeners.auth.local_addr().unwrap(),
            listeners.acct.local_addr().unwrap()
        );
    }
}
