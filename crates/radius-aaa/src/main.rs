use clap::Parser;
use radius_aaa::{AuditEntry, AuditEventType, AuditLogger, Config, Engine, Repositories};
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RADIUS AAA engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius_aaa")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit
    #[arg(short, long)]
    validate: bool,
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_summary(config: &Config) {
    println!("Configuration OK");
    println!("  Auth:    {}:{}", config.listen_address, config.auth_port);
    println!("  Acct:    {}:{}", config.listen_address, config.acct_port);
    println!("  Workers: {}", config.max_workers);
    println!("  NAS:     {}", config.nas.len());
    println!("  Users:   {}", config.users.len());
    println!("  EAP:     {}", config.radius.eap_enabled_handlers);
    if let Some(ref path) = config.audit_log_path {
        println!("  Audit:   {}", path);
    }
    for nas in &config.nas {
        println!(
            "  - {} {} ({:?}, vendor {})",
            nas.ipaddr, nas.identifier, nas.status, nas.vendor_code
        );
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if cli.validate {
                eprintln!("Configuration validation failed: {}", e);
                process::exit(1);
            }

            init_tracing("info");
            warn!(path = %cli.config_path, error = %e, "could not load config");
            info!(path = %cli.config_path, "writing example configuration");
            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }
            info!("Please edit {} and restart the server", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        print_summary(&config);
        process::exit(0);
    }

    init_tracing(config.log_level.as_deref().unwrap_or("info"));
    info!("radius-aaa v{}", env!("CARGO_PKG_VERSION"));

    let (auth_addr, acct_addr) = match (config.auth_addr(), config.acct_addr()) {
        (Ok(auth), Ok(acct)) => (auth, acct),
        (Err(e), _) | (_, Err(e)) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let audit = match AuditLogger::new(config.audit_log_path.as_deref()) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            error!("Failed to open audit log: {}", e);
            process::exit(1);
        }
    };

    if config.nas.is_empty() {
        warn!("no NAS configured, every request will be dropped");
    }

    let repositories = Repositories::in_memory(config.users.clone(), config.nas.clone());
    let engine = Engine::new(Arc::new(config), repositories, Arc::clone(&audit));
    let sweeper = engine.start_eap_sweeper();

    let listeners = match engine.bind(auth_addr, acct_addr).await {
        Ok(listeners) => listeners,
        Err(e) => {
            error!("Failed to bind listeners: {}", e);
            process::exit(1);
        }
    };
    audit.log(AuditEntry::new(AuditEventType::ServerStart)).await;

    tokio::select! {
        result = listeners.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    sweeper.abort();
    audit.log(AuditEntry::new(AuditEventType::ServerStop)).await;
    info!(accepts = engine.metrics().accepts(), "stopped");
    debug!("final counters:\n{}", engine.metrics().render_prometheus());
}
