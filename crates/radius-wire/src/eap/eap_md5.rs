//! EAP-MD5 Challenge (RFC 3748 Section 5.4)
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Value-Size    | Value ...       | Name ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::{EapCode, EapError, EapPacket, EapType};

pub const MD5_CHALLENGE_SIZE: usize = 16;
pub const MD5_RESPONSE_SIZE: usize = 16;

pub fn create_challenge(identifier: u8, challenge: &[u8], name: &str) -> EapPacket {
    let mut data = Vec::with_capacity(1 + challenge.len() + name.len());
    data.push(challenge.len() as u8);
    data.extend_from_slice(challenge);
    data.extend_from_slice(name.as_bytes());
    EapPacket::new(EapCode::Request, identifier, Some(EapType::Md5Challenge), data)
}

/// Challenge value of an MD5 request
pub fn parse_challenge(packet: &EapPacket) -> Result<Vec<u8>, EapError> {
    let (value, _) = split_value(packet)?;
    Ok(value.to_vec())
}

pub fn create_response(identifier: u8, response_hash: &[u8; 16], name: &str) -> EapPacket {
    let mut data = Vec::with_capacity(1 + MD5_RESPONSE_SIZE + name.len());
    data.push(MD5_RESPONSE_SIZE as u8);
    data.extend_from_slice(response_hash);
    data.extend_from_slice(name.as_bytes());
    EapPacket::new(EapCode::Response, identifier, Some(EapType::Md5Challenge), data)
}

/// Returns (response hash, name)
pub fn parse_response(packet: &EapPacket) -> Result<([u8; 16], String), EapError> {
    let (value, name) = split_value(packet)?;
    let hash: [u8; MD5_RESPONSE_SIZE] = value
        .try_into()
        .map_err(|_| EapError::InvalidChallengeLength(value.len()))?;
    Ok((hash, String::from_utf8_lossy(name).into_owned()))
}

fn split_value(packet: &EapPacket) -> Result<(&[u8], &[u8]), EapError> {
    if packet.type_code != Some(EapType::Md5Challenge.as_u8()) {
        return Err(EapError::UnexpectedType(packet.type_code.unwrap_or(0)));
    }
    let Some((&size, rest)) = packet.data.split_first() else {
        return Err(EapError::InvalidChallengeLength(0));
    };
    let size = size as usize;
    if rest.len() < size {
        return Err(EapError::PacketTooShort {
            expected: 1 + size,
            actual: packet.data.len(),
        });
    }
    Ok(rest.split_at(size))
}

/// MD5(identifier ‖ password ‖ challenge)
pub fn compute_response_hash(identifier: u8, password: &str, challenge: &[u8]) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume([identifier]);
    ctx.consume(password.as_bytes());
    ctx.consume(challenge);
    ctx.compute().0
}

pub fn verify_response(
    identifier: u8,
    password: &str,
    challenge: &[u8],
    response_hash: &[u8; 16],
) -> bool {
    compute_response_hash(identifier, password, challenge) == *response_hash
}
