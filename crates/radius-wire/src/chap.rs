//! CHAP (RFC 2865 Section 5.3, RFC 1994)

use thiserror::Error;

pub const CHAP_PASSWORD_LENGTH: usize = 17;
pub const CHAP_CHALLENGE_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChapError {
    #[error("Invalid CHAP-Password length: expected 17 bytes, got {0}")]
    InvalidPasswordLength(usize),
    #[error("Invalid CHAP-Challenge length: expected 16 bytes, got {0}")]
    InvalidChallengeLength(usize),
}

/// CHAP-Password value: identifier followed by the 16-byte MD5 digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapResponse {
    pub ident: u8,
    pub response: [u8; 16],
}

impl ChapResponse {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChapError> {
        if bytes.len() != CHAP_PASSWORD_LENGTH {
            return Err(ChapError::InvalidPasswordLength(bytes.len()));
        }
        let mut response = [0u8; 16];
        response.copy_from_slice(&bytes[1..]);
        Ok(ChapResponse {
            ident: bytes[0],
            response,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CHAP_PASSWORD_LENGTH);
        bytes.push(self.ident);
        bytes.extend_from_slice(&self.response);
        bytes
    }
}

/// MD5(ident ‖ password ‖ challenge)
pub fn compute_chap_response(ident: u8, password: &[u8], challenge: &[u8]) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume([ident]);
    ctx.consume(password);
    ctx.consume(challenge);
    ctx.compute().0
}

/// Check a CHAP-Password against a known password.
///
/// Lengths are validated before any hashing so a malformed request never
/// reports as a credential mismatch.
pub fn verify_chap_password(
    chap_password: &[u8],
    challenge: &[u8],
    password: &[u8],
) -> Result<bool, ChapError> {
    let response = ChapResponse::from_bytes(chap_password)?;
    if challenge.len() != CHAP_CHALLENGE_LENGTH {
        return Err(ChapError::InvalidChallengeLength(challenge.len()));
    }
    Ok(compute_chap_response(response.ident, password, challenge) == response.response)
}
