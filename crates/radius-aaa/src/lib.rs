//! RADIUS AAA request-processing engine
//!
//! Authentication runs as an ordered pipeline of named stages over a shared
//! [`PluginRegistry`] of password validators, policy checkers, response
//! enhancers, vendor parsers and builders, guards, accounting handlers and
//! EAP method handlers. Accounting is dispatched per Acct-Status-Type after
//! the Accounting-Response has been sent.
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_aaa::{AuditLogger, Config, Engine, Repositories};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.json")?;
//!     let repositories = Repositories::in_memory(config.users.clone(), config.nas.clone());
//!     let (auth_addr, acct_addr) = (config.auth_addr()?, config.acct_addr()?);
//!
//!     let engine = Engine::new(Arc::new(config), repositories, Arc::new(AuditLogger::disabled()));
//!     let _sweeper = engine.start_eap_sweeper();
//!     engine.bind(auth_addr, acct_addr).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod eap;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod plugins;
pub mod ratelimit;
pub mod registry;
pub mod repository;
pub mod server;
pub mod service;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use config::{Config, ConfigError, ConfigProvider, RadiusSettings};
pub use engine::{Engine, Listeners};
pub use error::{AuthError, RejectKind};
pub use metrics::AuthMetrics;
pub use model::{AccountingRecord, Nas, OnlineSession, Status, User};
pub use pipeline::{AuthPipeline, AuthRequestContext, PipelineError, PipelineStage};
pub use registry::{PluginRegistry, RegistryDeps};
pub use repository::{Repositories, RepositoryError};
pub use server::{RadiusServer, RadiusService, Request, ResponseWriter, ServerError};
pub use service::{AcctService, AuthService};
