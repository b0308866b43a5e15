use crate::model::{Nas, User};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Keys understood by [`ConfigProvider`]
pub mod keys {
    pub const EAP_METHOD: &str = "radius.EapMethod";
    pub const EAP_ENABLED_HANDLERS: &str = "radius.EapEnabledHandlers";
    pub const EAP_FALLBACK_TO_ANY: &str = "radius.EapFallbackToAny";
    pub const ACCT_INTERIM_INTERVAL: &str = "radius.AcctInterimInterval";
    pub const AUTH_RATE_LIMIT_INTERVAL: &str = "radius.AuthRateLimitInterval";
}

/// Read-only, key-based view of the runtime settings.
///
/// Plugins take an `Arc<dyn ConfigProvider>` rather than the whole
/// [`Config`] so tests can hand them a map.
pub trait ConfigProvider: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_int64(&self, key: &str) -> Option<i64> {
        self.get_string(key)?.trim().parse().ok()
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_string(key)?.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ConfigProvider for std::collections::HashMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Split `radius.EapEnabledHandlers` into lowercase method names.
/// `*` is kept as an entry of its own.
pub fn enabled_eap_handlers(config: &dyn ConfigProvider) -> Vec<String> {
    config
        .get_string(keys::EAP_ENABLED_HANDLERS)
        .unwrap_or_else(|| "*".to_string())
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Tunables of the AAA engine, exposed under the `radius.` key prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiusSettings {
    /// Preferred EAP method name
    #[serde(default = "default_eap_method")]
    pub eap_method: String,

    /// `*` or a comma separated list of EAP method names
    #[serde(default = "default_eap_enabled_handlers")]
    pub eap_enabled_handlers: String,

    /// Offer any registered handler when neither the preferred method nor
    /// the allow-list yields one
    #[serde(default = "default_true")]
    pub eap_fallback_to_any: bool,

    /// Acct-Interim-Interval sent in Access-Accept, seconds
    #[serde(default = "default_acct_interim_interval")]
    pub acct_interim_interval: i64,

    /// Minimum seconds between two authentications of one username, 0 only
    /// rejects concurrent attempts
    #[serde(default)]
    pub auth_rate_limit_interval: i64,

    #[serde(default = "default_eap_state_ttl")]
    pub eap_state_ttl_secs: u64,

    #[serde(default = "default_eap_state_max_entries")]
    pub eap_state_max_entries: usize,

    /// Failures tolerated per user inside the window before rejects become
    /// rate limited
    #[serde(default = "default_reject_delay_threshold")]
    pub reject_delay_threshold: u32,

    #[serde(default = "default_reject_delay_window")]
    pub reject_delay_window_secs: u64,

    #[serde(default = "default_reject_delay_max_entries")]
    pub reject_delay_max_entries: usize,
}

fn default_eap_method() -> String {
    "eap-md5".to_string()
}

fn default_eap_enabled_handlers() -> String {
    "*".to_string()
}

fn default_true() -> bool {
    true
}

fn default_acct_interim_interval() -> i64 {
    120
}

fn default_eap_state_ttl() -> u64 {
    300
}

fn default_eap_state_max_entries() -> usize {
    10_000
}

fn default_reject_delay_threshold() -> u32 {
    7
}

fn default_reject_delay_window() -> u64 {
    10
}

fn default_reject_delay_max_entries() -> usize {
    65_536
}

impl Default for RadiusSettings {
    fn default() -> Self {
        RadiusSettings {
            eap_method: default_eap_method(),
            eap_enabled_handlers: default_eap_enabled_handlers(),
            eap_fallback_to_any: true,
            acct_interim_interval: default_acct_interim_interval(),
            auth_rate_limit_interval: 0,
            eap_state_ttl_secs: default_eap_state_ttl(),
            eap_state_max_entries: default_eap_state_max_entries(),
            reject_delay_threshold: default_reject_delay_threshold(),
            reject_delay_window_secs: default_reject_delay_window(),
            reject_delay_max_entries: default_reject_delay_max_entries(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_auth_port")]
    pub auth_port: u16,

    #[serde(default = "default_acct_port")]
    pub acct_port: u16,

    /// Upper bound on datagrams processed concurrently
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Audit log file path (JSON lines, optional)
    #[serde(default)]
    pub audit_log_path: Option<String>,

    #[serde(default)]
    pub radius: RadiusSettings,

    /// NAS devices loaded into the in-memory repository
    #[serde(default)]
    pub nas: Vec<Nas>,

    /// Users loaded into the in-memory repository
    #[serde(default)]
    pub users: Vec<User>,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_auth_port() -> u16 {
    1812
}

fn default_acct_port() -> u16 {
    1813
}

fn default_max_workers() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: default_listen_address(),
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            max_workers: default_max_workers(),
            log_level: None,
            audit_log_path: None,
            radius: RadiusSettings::default(),
            nas: vec![],
            users: vec![],
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn listen_ip(&self) -> Result<IpAddr, ConfigError> {
        self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid listen address: {}", self.listen_address))
        })
    }

    pub fn auth_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.listen_ip()?, self.auth_port))
    }

    pub fn acct_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.listen_ip()?, self.acct_port))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_ip()?;

        if self.auth_port == self.acct_port && self.auth_port != 0 {
            return Err(ConfigError::Invalid(
                "auth_port and acct_port must differ".to_string(),
            ));
        }

        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers cannot be 0".to_string()));
        }

        if self.radius.eap_state_max_entries == 0 || self.radius.reject_delay_max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache caps must be greater than 0".to_string(),
            ));
        }

        for nas in &self.nas {
            if nas.secret.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "NAS {} has empty secret",
                    nas.ipaddr
                )));
            }
        }

        for user in &self.users {
            if user.username.is_empty() {
                return Err(ConfigError::Invalid("User has empty username".to_string()));
            }
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        let mut nas = Nas::new(IpAddr::from([127, 0, 0, 1]), "testing123");
        nas.name = "local".to_string();
        nas.identifier = "local-nas".to_string();

        let mut limited = User::new("user1", "password1");
        limited.up_rate = 1024;
        limited.down_rate = 4096;
        limited.active_num = 1;

        Config {
            log_level: Some("info".to_string()),
            audit_log_path: Some("/var/log/radius/audit.log".to_string()),
            nas: vec![nas],
            users: vec![User::new("admin", "admin123"), limited],
            ..Config::default()
        }
    }
}

impl ConfigProvider for Config {
    fn get_string(&self, key: &str) -> Option<String> {
        let radius = &self.radius;
        match key {
            keys::EAP_METHOD => Some(radius.eap_method.clone()),
            keys::EAP_ENABLED_HANDLERS => Some(radius.eap_enabled_handlers.clone()),
            keys::EAP_FALLBACK_TO_ANY => Some(radius.eap_fallback_to_any.to_string()),
            keys::ACCT_INTERIM_INTERVAL => Some(radius.acct_interim_interval.to_string()),
            keys::AUTH_RATE_LIMIT_INTERVAL => Some(radius.auth_rate_limit_interval.to_string()),
            _ => None,
        }
    }
}
