//! Classified authentication errors
//!
//! Every error the pipeline can surface maps to a [`RejectKind`], which
//! carries a stable tag for metrics and audit so operators never have to
//! parse messages.

use crate::repository::RepositoryError;
use thiserror::Error;

/// Reply-Message values longer than this are cut on a char boundary
pub const MAX_REPLY_MESSAGE_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    UserNotFound,
    UserDisabled,
    UserExpired,
    PasswordMismatch,
    MacBindFailure,
    VlanBindFailure,
    OnlineLimitExceeded,
    UnauthorizedNas,
    RateLimited,
    Other,
}

impl RejectKind {
    pub const COUNT: usize = 10;

    pub const ALL: [RejectKind; Self::COUNT] = [
        RejectKind::UserNotFound,
        RejectKind::UserDisabled,
        RejectKind::UserExpired,
        RejectKind::PasswordMismatch,
        RejectKind::MacBindFailure,
        RejectKind::VlanBindFailure,
        RejectKind::OnlineLimitExceeded,
        RejectKind::UnauthorizedNas,
        RejectKind::RateLimited,
        RejectKind::Other,
    ];

    pub fn metrics_tag(self) -> &'static str {
        match self {
            RejectKind::UserNotFound => "user_not_found",
            RejectKind::UserDisabled => "user_disabled",
            RejectKind::UserExpired => "user_expired",
            RejectKind::PasswordMismatch => "password_mismatch",
            RejectKind::MacBindFailure => "mac_bind_failure",
            RejectKind::VlanBindFailure => "vlan_bind_failure",
            RejectKind::OnlineLimitExceeded => "online_limit_exceeded",
            RejectKind::UnauthorizedNas => "unauthorized_nas",
            RejectKind::RateLimited => "rate_limited",
            RejectKind::Other => "other",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("user {0} is disabled")]
    UserDisabled(String),

    #[error("user {0} has expired")]
    UserExpired(String),

    #[error("password mismatch")]
    PasswordMismatch,

    #[error("MAC address binding mismatch")]
    MacBindFailure,

    #[error("VLAN binding mismatch")]
    VlanBindFailure,

    #[error("online session limit of {0} reached")]
    OnlineLimitExceeded(u32),

    #[error("unauthorized NAS {0}")]
    UnauthorizedNas(String),

    #[error("too many authentication attempts for {0}")]
    RateLimited(String),

    /// Protocol format violation, never a credential mismatch
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("no handler for {0}")]
    NoHandler(String),

    #[error("{0}")]
    Other(String),

    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    pub fn in_stage(self, stage: &'static str) -> Self {
        AuthError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The error with any stage wrappers removed
    pub fn root(&self) -> &AuthError {
        match self {
            AuthError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the innermost stage that produced the error
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            AuthError::Stage { stage, source } => source.stage().or(Some(stage)),
            _ => None,
        }
    }

    pub fn kind(&self) -> RejectKind {
        match self.root() {
            AuthError::UserNotFound(_) => RejectKind::UserNotFound,
            AuthError::UserDisabled(_) => RejectKind::UserDisabled,
            AuthError::UserExpired(_) => RejectKind::UserExpired,
            AuthError::PasswordMismatch => RejectKind::PasswordMismatch,
            AuthError::MacBindFailure => RejectKind::MacBindFailure,
            AuthError::VlanBindFailure => RejectKind::VlanBindFailure,
            AuthError::OnlineLimitExceeded(_) => RejectKind::OnlineLimitExceeded,
            AuthError::UnauthorizedNas(_) => RejectKind::UnauthorizedNas,
            AuthError::RateLimited(_) => RejectKind::RateLimited,
            _ => RejectKind::Other,
        }
    }

    /// Text for the Reply-Message of an Access-Reject
    pub fn reply_message(&self) -> String {
        truncate_reply_message(&self.root().to_string()).to_string()
    }
}

pub fn truncate_reply_message(message: &str) -> &str {
    if message.len() <= MAX_REPLY_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_REPLY_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_unwraps_stages() {
        let err = AuthError::PasswordMismatch
            .in_stage("plugin_auth")
            .in_stage("outer");
        assert_eq!(err.kind(), RejectKind::PasswordMismatch);
        assert_eq!(err.stage(), Some("plugin_auth"));
        assert_eq!(err.reply_message(), "password mismatch");
    }

    #[test]
    fn test_malformed_is_not_a_credential_error() {
        let err = AuthError::Malformed("CHAP-Password length 16".into());
        assert_eq!(err.kind(), RejectKind::Other);
    }

    #[test]
    fn test_truncate_reply_message_on_char_boundary() {
        let long = "é".repeat(200);
        let cut = truncate_reply_message(&long);
        assert!(cut.len() <= MAX_REPLY_MESSAGE_LEN);
        assert_eq!(cut.len(), 252);
        assert!(cut.chars().all(|c| c == 'é'));

        assert_eq!(truncate_reply_message("short"), "short");
    }

    #[test]
    fn test_metrics_tags_are_unique() {
        let mut tags: Vec<_> = RejectKind::ALL.iter().map(|k| k.metrics_tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), RejectKind::ALL.len());
    }
}
