//! Authenticator and User-Password hiding (RFC 2865 Section 3 and 5.2,
//! RFC 2866 Section 3).

use crate::attributes::AttributeType;
use crate::message_auth::calculate_message_authenticator;
use crate::packet::{Packet, PacketError};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Invalid encrypted password length: {0}")]
    InvalidLength(usize),
    #[error("Invalid UTF-8 in password")]
    InvalidUtf8,
}

/// Random Request Authenticator (16 bytes)
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut authenticator = [0u8; 16];
    rand::rng().fill(&mut authenticator);
    authenticator
}

/// MD5(Code + ID + Length + `authenticator` + Attributes + Secret)
///
/// Shared by the Response Authenticator (request authenticator as input)
/// and the Accounting-Request Authenticator (16 zero octets as input).
fn packet_digest(
    packet: &Packet,
    authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<[u8; 16], PacketError> {
    let mut encoded = packet.encode()?;
    encoded[4..20].copy_from_slice(authenticator);
    encoded.extend_from_slice(secret);
    Ok(md5::compute(&encoded).0)
}

/// Response Authenticator for Access-Accept/Reject/Challenge and
/// Accounting-Response.
pub fn calculate_response_authenticator(
    packet: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<[u8; 16], PacketError> {
    packet_digest(packet, request_authenticator, secret)
}

pub fn verify_response_authenticator(
    response: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    calculate_response_authenticator(response, request_authenticator, secret)
        .map(|expected| expected == response.authenticator)
        .unwrap_or(false)
}

/// Request Authenticator for Accounting-Request (RFC 2866 Section 3)
pub fn calculate_accounting_request_authenticator(
    packet: &Packet,
    secret: &[u8],
) -> Result<[u8; 16], PacketError> {
    packet_digest(packet, &[0u8; 16], secret)
}

pub fn verify_accounting_request_authenticator(packet: &Packet, secret: &[u8]) -> bool {
    calculate_accounting_request_authenticator(packet, secret)
        .map(|expected| expected == packet.authenticator)
        .unwrap_or(false)
}

/// Finalize a reply built with [`Packet::reply`].
///
/// When the reply carries a Message-Authenticator it is computed first over
/// the packet with the request authenticator in place (RFC 3579 Section 3.2),
/// then the Response Authenticator is written.
pub fn sign_response(
    reply: &mut Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<(), PacketError> {
    reply.authenticator = *request_authenticator;

    let message_auth = AttributeType::MessageAuthenticator as u8;
    if let Some(index) = reply
        .attributes
        .iter()
        .position(|a| a.attr_type == message_auth)
    {
        reply.attributes[index].value = vec![0u8; 16];
        let mac = calculate_message_authenticator(&reply.encode()?, secret);
        reply.attributes[index].value = mac.to_vec();
    }

    reply.authenticator = calculate_response_authenticator(reply, request_authenticator, secret)?;
    Ok(())
}

/// Hide a User-Password value per RFC 2865 Section 5.2
pub fn encrypt_user_password(password: &str, secret: &[u8], authenticator: &[u8; 16]) -> Vec<u8> {
    let mut padded = password.as_bytes().to_vec();
    let padded_len = padded.len().div_ceil(16).max(1) * 16;
    padded.resize(padded_len, 0);

    let mut result = Vec::with_capacity(padded_len);
    let mut previous: [u8; 16] = *authenticator;
    for chunk in padded.chunks(16) {
        let mut ctx = md5::Context::new();
        ctx.consume(secret);
        ctx.consume(previous);
        let hash = ctx.compute().0;

        for (i, byte) in chunk.iter().enumerate() {
            previous[i] = byte ^ hash[i];
        }
        result.extend_from_slice(&previous);
    }
    result
}

/// Recover a User-Password value; trailing NUL padding is stripped
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Result<String, PasswordError> {
    if encrypted.is_empty() || encrypted.len() % 16 != 0 || encrypted.len() > 128 {
        return Err(PasswordError::InvalidLength(encrypted.len()));
    }

    let mut result = Vec::with_capacity(encrypted.len());
    let mut previous: &[u8] = authenticator;
    for chunk in encrypted.chunks(16) {
        let mut ctx = md5::Context::new();
        ctx.consume(secret);
        ctx.consume(previous);
        let hash = ctx.compute().0;

        result.extend(chunk.iter().zip(hash.iter()).map(|(c, h)| c ^ h));
        previous = chunk;
    }

    while result.last() == Some(&0) {
        result.pop();
    }
    String::from_utf8(result).map_err(|_| PasswordError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::message_auth::verify_packet_message_authenticator;
    use crate::packet::Code;

    #[test]
    fn test_generate_authenticator() {
        assert_ne!(generate_request_authenticator(), generate_request_authenticator());
    }

    #[test]
    fn test_password_hiding() {
        let secret = b"sharedsecret";
        let authenticator = [1u8; 16];

        let encrypted = encrypt_user_password("a-password-longer-than-16", secret, &authenticator);
        assert_eq!(encrypted.len(), 32);
        assert_eq!(
            decrypt_user_password(&encrypted, secret, &authenticator).unwrap(),
            "a-password-longer-than-16"
        );
    }

    #[test]
    fn test_empty_password_pads_to_one_block() {
        assert_eq!(encrypt_user_password("", b"s", &[0u8; 16]).len(), 16);
    }

    #[test]
    fn test_decrypt_rejects_bad_length() {
        assert_eq!(
            decrypt_user_password(&[0u8; 15], b"s", &[0u8; 16]),
            Err(PasswordError::InvalidLength(15))
        );
    }

    #[test]
    fn test_response_authenticator() {
        let secret = b"sharedsecret";
        let request_auth = [1u8; 16];
        let mut packet = Packet::new(Code::AccessAccept, 42, request_auth);
        sign_response(&mut packet, &request_auth, secret).unwrap();
        assert!(verify_response_authenticator(&packet, &request_auth, secret));
        assert!(!verify_response_authenticator(&packet, &request_auth, b"other"));
    }

    #[test]
    fn test_accounting_request_authenticator() {
        let secret = b"acctsecret";
        let mut packet = Packet::new(Code::AccountingRequest, 9, [0u8; 16]);
        packet.add_attribute(Attribute::string(AttributeType::AcctSessionId as u8, "S1").unwrap());
        packet.authenticator = calculate_accounting_request_authenticator(&packet, secret).unwrap();

        assert!(verify_accounting_request_authenticator(&packet, secret));
        assert!(!verify_accounting_request_authenticator(&packet, b"wrong"));
    }

    #[test]
    fn test_sign_response_fills_message_authenticator() {
        let secret = b"secret";
        let request_auth = [7u8; 16];
        let request = Packet::new(Code::AccessRequest, 5, request_auth);
        let mut reply = request.reply(Code::AccessChallenge);
        reply.add_attribute(
            Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16]).unwrap(),
        );

        sign_response(&mut reply, &request_auth, secret).unwrap();

        let mut check = reply.clone();
        check.authenticator = request_auth;
        assert!(verify_packet_message_authenticator(&check, secret).unwrap());
        assert!(verify_response_authenticator(&reply, &request_auth, secret));
    }
}
