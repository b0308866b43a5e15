//! Message-Authenticator (RFC 2869 Section 5.14, RFC 3579 Section 3.2)
//!
//! HMAC-MD5 keyed with the shared secret over the whole packet, with the
//! Message-Authenticator value zeroed during calculation.

use crate::attributes::AttributeType;
use crate::packet::{Packet, PacketError};
use hmac::{Hmac, Mac};
use md5_digest::Md5;

type HmacMd5 = Hmac<Md5>;

/// HMAC-MD5 over `packet_bytes`
pub fn calculate_message_authenticator(packet_bytes: &[u8], secret: &[u8]) -> [u8; 16] {
    // HMAC accepts keys of any length, so new_from_slice cannot fail here
    let mut mac = match HmacMd5::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return [0u8; 16],
    };
    mac.update(packet_bytes);
    let mut output = [0u8; 16];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

/// Verify a Message-Authenticator located at `offset` within raw packet bytes
pub fn verify_message_authenticator(packet_bytes: &[u8], secret: &[u8], offset: usize) -> bool {
    if offset + 16 > packet_bytes.len() {
        return false;
    }

    let mut zeroed = packet_bytes.to_vec();
    zeroed[offset..offset + 16].fill(0);
    let expected = calculate_message_authenticator(&zeroed, secret);

    // Constant-time comparison
    packet_bytes[offset..offset + 16]
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Verify the Message-Authenticator of a decoded packet.
///
/// The packet's `authenticator` field must hold the value that was on the
/// wire when the HMAC was computed (the Request Authenticator for requests).
/// Returns `Ok(true)` when the attribute is absent.
pub fn verify_packet_message_authenticator(
    packet: &Packet,
    secret: &[u8],
) -> Result<bool, PacketError> {
    let message_auth = AttributeType::MessageAuthenticator as u8;
    let mut offset = Packet::MIN_PACKET_SIZE;
    for attr in &packet.attributes {
        if attr.attr_type == message_auth {
            if attr.value.len() != 16 {
                return Ok(false);
            }
            let encoded = packet.encode()?;
            return Ok(verify_message_authenticator(&encoded, secret, offset + 2));
        }
        offset += attr.encoded_length();
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::packet::Code;

    #[test]
    fn test_message_authenticator_depends_on_secret() {
        let packet = vec![0u8; 20];
        assert_ne!(
            calculate_message_authenticator(&packet, b"secret1"),
            calculate_message_authenticator(&packet, b"secret2")
        );
    }

    #[test]
    fn test_verify_raw() {
        let mut packet = vec![0u8; 40];
        let auth = calculate_message_authenticator(&packet, b"testing123");
        packet[20..36].copy_from_slice(&auth);
        assert!(verify_message_authenticator(&packet, b"testing123", 20));
        assert!(!verify_message_authenticator(&packet, b"other", 20));
        assert!(!verify_message_authenticator(&packet, b"testing123", 100));
    }

    #[test]
    fn test_verify_packet() {
        let secret = b"testing123";
        let mut packet = Packet::new(Code::AccessRequest, 1, [3u8; 16]);
        packet.add_attribute(Attribute::string(AttributeType::UserName as u8, "alice").unwrap());
        packet.add_attribute(
            Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16]).unwrap(),
        );
        let mac = calculate_message_authenticator(&packet.encode().unwrap(), secret);
        packet.attributes[1].value = mac.to_vec();

        assert!(verify_packet_message_authenticator(&packet, secret).unwrap());

        packet.attributes[0].value = b"mallory".to_vec();
        assert!(!verify_packet_message_authenticator(&packet, secret).unwrap());
    }

    #[test]
    fn test_absent_attribute_passes() {
        let packet = Packet::new(Code::AccessRequest, 1, [0u8; 16]);
        assert!(verify_packet_message_authenticator(&packet, b"x").unwrap());
    }
}
