//! EAP-MSCHAPv2 framing (draft-kamath-pppext-eap-mschapv2)
//!
//! Every request and the Response carry
//! `OpCode | MS-CHAPv2-ID | MS-Length(2) | ...` where MS-Length covers the
//! whole type-data. Success and Failure acknowledgements from the peer are a
//! bare OpCode.

use super::{EapCode, EapError, EapPacket, EapType};
use crate::mschap::{CHALLENGE_LENGTH, NT_RESPONSE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Challenge = 1,
    Response = 2,
    Success = 3,
    Failure = 4,
}

impl OpCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(OpCode::Challenge),
            2 => Some(OpCode::Response),
            3 => Some(OpCode::Success),
            4 => Some(OpCode::Failure),
            _ => None,
        }
    }
}

/// Value-Size of the Response: peer challenge, reserved, NT-Response, flags
const RESPONSE_VALUE_SIZE: usize = 49;

/// Peer's answer to a Challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    pub ms_chap_id: u8,
    pub peer_challenge: [u8; CHALLENGE_LENGTH],
    pub nt_response: [u8; NT_RESPONSE_LENGTH],
    pub flags: u8,
    pub name: String,
}

fn with_header(opcode: OpCode, ms_chap_id: u8, body: &[u8]) -> Vec<u8> {
    let ms_length = (4 + body.len()) as u16;
    let mut data = Vec::with_capacity(4 + body.len());
    data.push(opcode as u8);
    data.push(ms_chap_id);
    data.extend_from_slice(&ms_length.to_be_bytes());
    data.extend_from_slice(body);
    data
}

fn request(identifier: u8, data: Vec<u8>) -> EapPacket {
    EapPacket::new(EapCode::Request, identifier, Some(EapType::MsChapV2), data)
}

fn response(identifier: u8, data: Vec<u8>) -> EapPacket {
    EapPacket::new(EapCode::Response, identifier, Some(EapType::MsChapV2), data)
}

pub fn create_challenge(
    identifier: u8,
    ms_chap_id: u8,
    challenge: &[u8; CHALLENGE_LENGTH],
    server_name: &str,
) -> EapPacket {
    let mut body = Vec::with_capacity(1 + CHALLENGE_LENGTH + server_name.len());
    body.push(CHALLENGE_LENGTH as u8);
    body.extend_from_slice(challenge);
    body.extend_from_slice(server_name.as_bytes());
    request(identifier, with_header(OpCode::Challenge, ms_chap_id, &body))
}

/// Success-Request carrying the Authenticator Response ("S=...")
pub fn create_success_request(
    identifier: u8,
    ms_chap_id: u8,
    authenticator_response: &str,
    message: &str,
) -> EapPacket {
    let text = format!("{} M={}", authenticator_response, message);
    request(
        identifier,
        with_header(OpCode::Success, ms_chap_id, text.as_bytes()),
    )
}

/// Failure-Request with error 691 (authentication failure), no retry
pub fn create_failure_request(
    identifier: u8,
    ms_chap_id: u8,
    challenge: &[u8; CHALLENGE_LENGTH],
    message: &str,
) -> EapPacket {
    let text = format!(
        "E=691 R=0 C={} V=3 M={}",
        hex::encode_upper(challenge),
        message
    );
    request(
        identifier,
        with_header(OpCode::Failure, ms_chap_id, text.as_bytes()),
    )
}

pub fn create_response(identifier: u8, ms_chap_id: u8, value: &ChallengeResponse) -> EapPacket {
    let mut body = Vec::with_capacity(1 + RESPONSE_VALUE_SIZE + value.name.len());
    body.push(RESPONSE_VALUE_SIZE as u8);
    body.extend_from_slice(&value.peer_challenge);
    body.extend_from_slice(&[0u8; 8]);
    body.extend_from_slice(&value.nt_response);
    body.push(value.flags);
    body.extend_from_slice(value.name.as_bytes());
    response(identifier, with_header(OpCode::Response, ms_chap_id, &body))
}

/// Peer acknowledgement of a Success- or Failure-Request
pub fn create_ack(identifier: u8, opcode: OpCode) -> EapPacket {
    response(identifier, vec![opcode as u8])
}

pub fn opcode(packet: &EapPacket) -> Result<OpCode, EapError> {
    if packet.type_code != Some(EapType::MsChapV2.as_u8()) {
        return Err(EapError::UnexpectedType(packet.type_code.unwrap_or(0)));
    }
    let first = *packet
        .data
        .first()
        .ok_or(EapError::InvalidResponseFormat("missing OpCode"))?;
    OpCode::from_u8(first).ok_or(EapError::InvalidResponseFormat("unknown OpCode"))
}

/// Server challenge carried in a Challenge request
pub fn parse_challenge(packet: &EapPacket) -> Result<(u8, [u8; CHALLENGE_LENGTH]), EapError> {
    if opcode(packet)? != OpCode::Challenge {
        return Err(EapError::InvalidResponseFormat("not a Challenge"));
    }
    let data = &packet.data;
    if data.len() < 5 + CHALLENGE_LENGTH || data[4] as usize != CHALLENGE_LENGTH {
        return Err(EapError::InvalidChallengeLength(data.len()));
    }
    let mut challenge = [0u8; CHALLENGE_LENGTH];
    challenge.copy_from_slice(&data[5..5 + CHALLENGE_LENGTH]);
    Ok((data[1], challenge))
}

pub fn parse_response(packet: &EapPacket) -> Result<ChallengeResponse, EapError> {
    if opcode(packet)? != OpCode::Response {
        return Err(EapError::InvalidResponseFormat("not a Response"));
    }
    let data = &packet.data;
    if data.len() < 5 + RESPONSE_VALUE_SIZE {
        return Err(EapError::PacketTooShort {
            expected: 5 + RESPONSE_VALUE_SIZE,
            actual: data.len(),
        });
    }
    if data[4] as usize != RESPONSE_VALUE_SIZE {
        return Err(EapError::InvalidResponseFormat("bad Value-Size"));
    }

    let value = &data[5..5 + RESPONSE_VALUE_SIZE];
    let mut peer_challenge = [0u8; CHALLENGE_LENGTH];
    peer_challenge.copy_from_slice(&value[..16]);
    let mut nt_response = [0u8; NT_RESPONSE_LENGTH];
    nt_response.copy_from_slice(&value[24..48]);

    Ok(ChallengeResponse {
        ms_chap_id: data[1],
        peer_challenge,
        nt_response,
        flags: value[48],
        name: String::from_utf8_lossy(&data[5 + RESPONSE_VALUE_SIZE..]).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_layout() {
        let packet = create_challenge(1, 9, &[0x11; 16], "aaa");
        assert_eq!(packet.data[0], OpCode::Challenge as u8);
        assert_eq!(packet.data[1], 9);
        assert_eq!(u16::from_be_bytes([packet.data[2], packet.data[3]]) as usize, packet.data.len());
        assert_eq!(packet.data[4], 16);
        assert_eq!(parse_challenge(&packet).unwrap(), (9, [0x11; 16]));
    }

    #[test]
    fn test_response_round_trip() {
        let value = ChallengeResponse {
            ms_chap_id: 9,
            peer_challenge: [0x22; 16],
            nt_response: [0x33; 24],
            flags: 0,
            name: "alice".to_string(),
        };
        let packet = create_response(1, 9, &value);
        assert_eq!(parse_response(&packet).unwrap(), value);
    }

    #[test]
    fn test_success_request_text() {
        let packet = create_success_request(2, 9, "S=ABCDEF", "OK");
        assert_eq!(opcode(&packet).unwrap(), OpCode::Success);
        assert_eq!(&packet.data[4..], b"S=ABCDEF M=OK");
    }

    #[test]
    fn test_ack_and_truncated_response() {
        let ack = create_ack(3, OpCode::Success);
        assert_eq!(ack.data, vec![3]);
        assert_eq!(opcode(&ack).unwrap(), OpCode::Success);
        assert!(parse_response(&ack).is_err());

        let mut short = create_response(
            1,
            1,
            &ChallengeResponse {
                ms_chap_id: 1,
                peer_challenge: [0; 16],
                nt_response: [0; 24],
                flags: 0,
                name: String::new(),
            },
        );
        short.data.truncate(20);
        assert!(matches!(
            parse_response(&short),
            Err(EapError::PacketTooShort { .. })
        ));
    }
}
