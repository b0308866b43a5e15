//! Audit trail for access decisions
//!
//! One JSON object per line: accepts, rejects with their classification,
//! requests from unknown NAS devices and NAS reboots reported through
//! Accounting-On/Off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AuthAccept,
    AuthReject,
    UnauthorizedNas,
    NasReboot,
    ServerStart,
    ServerStop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nas_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nas_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u8>,
    /// Metrics tag of the reject classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        AuditEntry {
            timestamp: Utc::now(),
            event_type,
            username: None,
            nas_ip: None,
            nas_identifier: None,
            request_id: None,
            reject_kind: None,
            details: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        if !username.is_empty() {
            self.username = Some(username);
        }
        self
    }

    pub fn with_nas_ip(mut self, ip: IpAddr) -> Self {
        self.nas_ip = Some(ip);
        self
    }

    pub fn with_nas_identifier(mut self, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        if !identifier.is_empty() {
            self.nas_identifier = Some(identifier);
        }
        self
    }

    pub fn with_request_id(mut self, id: u8) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_reject_kind(mut self, tag: &str) -> Self {
        self.reject_kind = Some(tag.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Appends entries to a file; a logger without a path drops them
pub struct AuditLogger {
    file: Option<Mutex<std::fs::File>>,
}

impl AuditLogger {
    pub fn new<P: AsRef<Path>>(file_path: Option<P>) -> std::io::Result<Self> {
        let file = match file_path {
            Some(path) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => None,
        };
        Ok(AuditLogger { file })
    }

    pub fn disabled() -> Self {
        AuditLogger { file: None }
    }

    pub async fn log(&self, entry: AuditEntry) {
        let Some(file) = &self.file else {
            return;
        };
        match serde_json::to_string(&entry) {
            Ok(json) => {
                let mut f = file.lock().await;
                if let Err(e) = writeln!(f, "{}", json) {
                    error!("Failed to write audit log: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize audit entry: {}", e),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_entry_skips_empty_fields() {
        let entry = AuditEntry::new(AuditEventType::AuthReject)
            .with_username("")
            .with_nas_identifier("bras-1")
            .with_reject_kind("password_mismatch");

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"auth_reject\""));
        assert!(json.contains("password_mismatch"));
        assert!(!json.contains("username"));
    }

    #[tokio::test]
    async fn test_audit_logger_appends_json_lines() {
        let temp_file = NamedTempFile::new().unwrap();
        let logger = AuditLogger::new(Some(temp_file.path())).unwrap();
        assert!(logger.is_enabled());

        logger
            .log(
                AuditEntry::new(AuditEventType::AuthAccept)
                    .with_username("alice")
                    .with_nas_ip("10.0.0.1".parse().unwrap())
                    .with_request_id(7),
            )
            .await;
        logger
            .log(AuditEntry::new(AuditEventType::UnauthorizedNas).with_details("no NAS"))
            .await;

        let contents = fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, AuditEventType::AuthAccept);
        assert_eq!(first.username.as_deref(), Some("alice"));
        assert_eq!(first.request_id, Some(7));
    }

    #[tokio::test]
    async fn test_disabled_logger_is_noop() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());
        logger.log(AuditEntry::new(AuditEventType::ServerStart)).await;
    }
}
