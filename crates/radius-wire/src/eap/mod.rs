//! EAP (RFC 3748) framing and EAP over RADIUS (RFC 3579).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Code      |  Identifier   |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |  Type-Data ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

pub mod eap_md5;
pub mod eap_mschapv2;

use crate::attributes::{Attribute, AttributeType};
use crate::packet::Packet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapCode {
    Request = 1,
    Response = 2,
    Success = 3,
    Failure = 4,
}

impl EapCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EapCode::Request),
            2 => Some(EapCode::Response),
            3 => Some(EapCode::Success),
            4 => Some(EapCode::Failure),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// EAP method types (IANA registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EapType {
    Identity = 1,
    Notification = 2,
    /// Legacy Nak, response only
    Nak = 3,
    Md5Challenge = 4,
    Tls = 13,
    Ttls = 21,
    Peap = 25,
    MsChapV2 = 26,
}

impl EapType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EapType::Identity),
            2 => Some(EapType::Notification),
            3 => Some(EapType::Nak),
            4 => Some(EapType::Md5Challenge),
            13 => Some(EapType::Tls),
            21 => Some(EapType::Ttls),
            25 => Some(EapType::Peap),
            26 => Some(EapType::MsChapV2),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EapError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Invalid EAP code: {0}")]
    InvalidCode(u8),

    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),

    #[error("Unexpected EAP type: {0}")]
    UnexpectedType(u8),

    #[error("Invalid challenge length: {0}")]
    InvalidChallengeLength(usize),

    #[error("Invalid response format: {0}")]
    InvalidResponseFormat(&'static str),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Decoded EAP packet. The type octet is kept raw so that methods this
/// server does not know still round-trip and can be named in a Nak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapPacket {
    pub code: EapCode,
    pub identifier: u8,
    /// Present for Request/Response only
    pub type_code: Option<u8>,
    pub data: Vec<u8>,
}

impl EapPacket {
    pub fn new(code: EapCode, identifier: u8, eap_type: Option<EapType>, data: Vec<u8>) -> Self {
        EapPacket {
            code,
            identifier,
            type_code: eap_type.map(EapType::as_u8),
            data,
        }
    }

    pub fn identity_request(identifier: u8) -> Self {
        Self::new(EapCode::Request, identifier, Some(EapType::Identity), Vec::new())
    }

    pub fn identity_response(identifier: u8, identity: &str) -> Self {
        Self::new(
            EapCode::Response,
            identifier,
            Some(EapType::Identity),
            identity.as_bytes().to_vec(),
        )
    }

    /// Legacy Nak listing the methods the peer would accept instead
    pub fn nak(identifier: u8, desired: &[u8]) -> Self {
        Self::new(EapCode::Response, identifier, Some(EapType::Nak), desired.to_vec())
    }

    pub fn success(identifier: u8) -> Self {
        Self::new(EapCode::Success, identifier, None, Vec::new())
    }

    pub fn failure(identifier: u8) -> Self {
        Self::new(EapCode::Failure, identifier, None, Vec::new())
    }

    pub fn eap_type(&self) -> Option<EapType> {
        self.type_code.and_then(EapType::from_u8)
    }

    pub fn is_response_of(&self, eap_type: EapType) -> bool {
        self.code == EapCode::Response && self.type_code == Some(eap_type.as_u8())
    }

    /// Identity carried by an Identity response
    pub fn identity(&self) -> Option<String> {
        self.is_response_of(EapType::Identity)
            .then(|| String::from_utf8_lossy(&self.data).into_owned())
    }

    /// Method types proposed in a Nak, in peer preference order
    pub fn nak_desired_types(&self) -> Vec<u8> {
        if self.is_response_of(EapType::Nak) {
            self.data.iter().copied().filter(|t| *t != 0).collect()
        } else {
            Vec::new()
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EapError> {
        if bytes.len() < 4 {
            return Err(EapError::PacketTooShort {
                expected: 4,
                actual: bytes.len(),
            });
        }

        let code = EapCode::from_u8(bytes[0]).ok_or(EapError::InvalidCode(bytes[0]))?;
        let identifier = bytes[1];
        let length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if length < 4 {
            return Err(EapError::InvalidLength(length));
        }
        if bytes.len() < length {
            return Err(EapError::PacketTooShort {
                expected: length,
                actual: bytes.len(),
            });
        }

        let (type_code, data) = match code {
            EapCode::Request | EapCode::Response => {
                if length < 5 {
                    return Err(EapError::InvalidLength(length));
                }
                (Some(bytes[4]), bytes[5..length].to_vec())
            }
            EapCode::Success | EapCode::Failure => (None, Vec::new()),
        };

        Ok(EapPacket {
            code,
            identifier,
            type_code,
            data,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let length = self.length();
        let mut bytes = Vec::with_capacity(length);
        bytes.push(self.code.as_u8());
        bytes.push(self.identifier);
        bytes.extend_from_slice(&(length as u16).to_be_bytes());
        if let (EapCode::Request | EapCode::Response, Some(type_code)) = (self.code, self.type_code)
        {
            bytes.push(type_code);
            bytes.extend_from_slice(&self.data);
        }
        bytes
    }

    pub fn length(&self) -> usize {
        match (self.code, self.type_code) {
            (EapCode::Request | EapCode::Response, Some(_)) => 5 + self.data.len(),
            _ => 4,
        }
    }
}

/// Split an EAP packet over as many EAP-Message attributes as needed
pub fn eap_to_radius_attributes(eap_packet: &EapPacket) -> Result<Vec<Attribute>, EapError> {
    eap_packet
        .to_bytes()
        .chunks(Attribute::MAX_VALUE_LENGTH)
        .map(|chunk| {
            Attribute::new(AttributeType::EapMessage as u8, chunk.to_vec())
                .map_err(|e| EapError::EncodingError(e.to_string()))
        })
        .collect()
}

/// Reassemble the EAP packet carried in a RADIUS packet, if any
pub fn eap_from_radius_packet(radius_packet: &Packet) -> Result<Option<EapPacket>, EapError> {
    let eap_bytes: Vec<u8> = radius_packet
        .find_all_attributes(AttributeType::EapMessage as u8)
        .into_iter()
        .flat_map(|a| a.value.iter().copied())
        .collect();

    if eap_bytes.is_empty() {
        return Ok(None);
    }
    EapPacket::from_bytes(&eap_bytes).map(Some)
}

pub fn add_eap_to_radius_packet(
    radius_packet: &mut Packet,
    eap_packet: &EapPacket,
) -> Result<(), EapError> {
    for attr in eap_to_radius_attributes(eap_packet)? {
        radius_packet.add_attribute(attr);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Code;

    #[test]
    fn test_identity_response_bytes() {
        let packet = EapPacket::identity_response(5, "alice");
        let bytes = packet.to_bytes();
        assert_eq!(&bytes[..5], &[2, 5, 0, 10, 1]);
        assert_eq!(&bytes[5..], b"alice");

        let decoded = EapPacket::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.identity().as_deref(), Some("alice"));
    }

    #[test]
    fn test_success_failure_are_header_only() {
        assert_eq!(EapPacket::success(9).to_bytes(), vec![3, 9, 0, 4]);
        assert_eq!(EapPacket::failure(9).to_bytes(), vec![4, 9, 0, 4]);
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let bytes = [2u8, 1, 0, 6, 200, 0xAB];
        let packet = EapPacket::from_bytes(&bytes).unwrap();
        assert_eq!(packet.type_code, Some(200));
        assert_eq!(packet.eap_type(), None);
        assert_eq!(packet.to_bytes(), bytes.to_vec());
    }

    #[test]
    fn test_nak_desired_types() {
        let nak = EapPacket::nak(3, &[26, 4]);
        assert_eq!(nak.nak_desired_types(), vec![26, 4]);
        assert!(EapPacket::identity_response(3, "x").nak_desired_types().is_empty());
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(EapPacket::from_bytes(&[2, 1, 0]).is_err());
        assert!(matches!(
            EapPacket::from_bytes(&[2, 1, 0, 3]),
            Err(EapError::InvalidLength(3))
        ));
        assert!(matches!(
            EapPacket::from_bytes(&[2, 1, 0, 9, 1]),
            Err(EapError::PacketTooShort { .. })
        ));
    }

    #[test]
    fn test_radius_fragmentation_and_reassembly() {
        let eap = EapPacket::new(EapCode::Request, 1, Some(EapType::Tls), vec![0x5A; 600]);
        let attrs = eap_to_radius_attributes(&eap).unwrap();
        assert_eq!(attrs.len(), 3);

        let mut radius = Packet::new(Code::AccessChallenge, 1, [0u8; 16]);
        for attr in attrs {
            radius.add_attribute(attr);
        }
        assert_eq!(eap_from_radius_packet(&radius).unwrap(), Some(eap));
    }

    #[test]
    fn test_no_eap_message() {
        let radius = Packet::new(Code::AccessRequest, 1, [0u8; 16]);
        assert_eq!(eap_from_radius_packet(&radius).unwrap(), None);
    }
}
