use super::{check_identifier, EapHandler, EapMethodOutcome, EapRoundContext, SERVER_NAME};
use super::state::{EapChallengeState, EapStage};
use crate::plugins::validators::{mppe_attributes, mschap_username};
use radius_wire::eap::eap_mschapv2::{self, OpCode};
use radius_wire::mschap::{
    derive_mppe_keys, generate_authenticator_response, verify_nt_response, MppeKeys,
    CHALLENGE_LENGTH,
};
use radius_wire::{EapError, EapPacket, EapType};
use tracing::debug;

/// EAP-MSCHAPv2 (draft-kamath-pppext-eap-mschapv2)
///
/// Challenge, Response, Success-Request, then the peer's Success ack. The
/// MPPE keys derived when the Response checks out are parked in
/// `method_data` until the ack arrives.
pub struct EapMsChapV2Handler;

fn server_challenge(state: &EapChallengeState) -> Result<[u8; CHALLENGE_LENGTH], EapError> {
    state
        .challenge
        .as_slice()
        .try_into()
        .map_err(|_| EapError::InvalidChallengeLength(state.challenge.len()))
}

fn stored_keys(state: &EapChallengeState) -> Result<MppeKeys, EapError> {
    if state.method_data.len() != 32 {
        return Err(EapError::InvalidResponseFormat("no key material"));
    }
    let mut send_key = [0u8; 16];
    let mut recv_key = [0u8; 16];
    send_key.copy_from_slice(&state.method_data[..16]);
    recv_key.copy_from_slice(&state.method_data[16..]);
    Ok(MppeKeys { send_key, recv_key })
}

impl EapMsChapV2Handler {
    fn verify(
        &self,
        state: &mut EapChallengeState,
        response: &EapPacket,
        round: &EapRoundContext<'_>,
    ) -> Result<EapMethodOutcome, EapError> {
        if state.stage != EapStage::MethodChallenge {
            return Err(EapError::InvalidResponseFormat("unexpected Response"));
        }
        let value = eap_mschapv2::parse_response(response)?;
        let challenge = server_challenge(state)?;

        let name = if value.name.is_empty() {
            round.username
        } else {
            value.name.as_str()
        };
        let username = mschap_username(name);

        if !verify_nt_response(
            &challenge,
            &value.peer_challenge,
            username,
            round.password,
            &value.nt_response,
        ) {
            state.stage = EapStage::Failure;
            return Ok(EapMethodOutcome::Failure);
        }

        let auth_response = generate_authenticator_response(
            round.password,
            &value.nt_response,
            &value.peer_challenge,
            &challenge,
            username,
        );
        let keys = derive_mppe_keys(round.password, &value.nt_response, true);
        state.method_data = [keys.send_key, keys.recv_key].concat();
        state.stage = EapStage::MethodResponse;
        state.eap_identifier = response.identifier.wrapping_add(1);

        Ok(EapMethodOutcome::Challenge(
            eap_mschapv2::create_success_request(
                state.eap_identifier,
                value.ms_chap_id,
                &auth_response,
                "Authenticated",
            ),
        ))
    }
}

impl EapHandler for EapMsChapV2Handler {
    fn name(&self) -> &'static str {
        "eap-mschapv2"
    }

    fn eap_type(&self) -> u8 {
        EapType::MsChapV2.as_u8()
    }

    fn initiate(
        &self,
        state: &mut EapChallengeState,
        _round: &EapRoundContext<'_>,
    ) -> Result<EapPacket, EapError> {
        let challenge: [u8; CHALLENGE_LENGTH] = rand::random();
        state.challenge = challenge.to_vec();
        state.stage = EapStage::MethodChallenge;
        Ok(eap_mschapv2::create_challenge(
            state.eap_identifier,
            state.eap_identifier,
            &challenge,
            SERVER_NAME,
        ))
    }

    fn handle_response(
        &self,
        state: &mut EapChallengeState,
        response: &EapPacket,
        round: &EapRoundContext<'_>,
    ) -> Result<EapMethodOutcome, EapError> {
        check_identifier(state, response)?;

        match eap_mschapv2::opcode(response)? {
            OpCode::Response => self.verify(state, response, round),
            OpCode::Success if state.stage == EapStage::MethodResponse => {
                let keys = stored_keys(state)?;
                let attributes =
                    mppe_attributes(&keys, round.secret, round.request_authenticator)
                        .map_err(|e| EapError::EncodingError(e.to_string()))?;
                state.stage = EapStage::Success;
                state.success = true;
                Ok(EapMethodOutcome::Success { attributes })
            }
            OpCode::Failure => {
                state.stage = EapStage::Failure;
                Ok(EapMethodOutcome::Failure)
            }
            op => {
                debug!(?op, stage = ?state.stage, "unexpected EAP-MSCHAPv2 opcode");
                Err(EapError::InvalidResponseFormat("unexpected OpCode"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_wire::eap::eap_mschapv2::ChallengeResponse;
    use radius_wire::mschap::generate_nt_response;

    const SECRET: &[u8] = b"secret";
    const AUTH: [u8; 16] = [7u8; 16];

    fn round<'a>(password: &'a str) -> EapRoundContext<'a> {
        EapRoundContext {
            username: "alice",
            password,
            secret: SECRET,
            request_authenticator: &AUTH,
        }
    }

    fn peer_response(state: &EapChallengeState, password: &str) -> EapPacket {
        let challenge = server_challenge(state).unwrap();
        let peer_challenge = [0x21u8; 16];
        let value = ChallengeResponse {
            ms_chap_id: state.eap_identifier,
            peer_challenge,
            nt_response: generate_nt_response(&challenge, &peer_challenge, "alice", password),
            flags: 0,
            name: "alice".into(),
        };
        eap_mschapv2::create_response(state.eap_identifier, state.eap_identifier, &value)
    }

    fn challenged() -> EapChallengeState {
        let mut state = EapChallengeState::new("s", "alice");
        state.eap_identifier = 2;
        let request = EapMsChapV2Handler.initiate(&mut state, &round("pw")).unwrap();
        let (_, challenge) = eap_mschapv2::parse_challenge(&request).unwrap();
        assert_eq!(challenge.to_vec(), state.challenge);
        state
    }

    #[test]
    fn test_full_exchange() {
        let mut state = challenged();
        let response = peer_response(&state, "pw");

        let outcome = EapMsChapV2Handler
            .handle_response(&mut state, &response, &round("pw"))
            .unwrap();
        let EapMethodOutcome::Challenge(success_request) = outcome else {
            panic!("expected Success-Request");
        };
        assert_eq!(success_request.identifier, 3);
        assert_eq!(eap_mschapv2::opcode(&success_request).unwrap(), OpCode::Success);
        assert!(String::from_utf8_lossy(&success_request.data).contains("S="));
        assert_eq!(state.method_data.len(), 32);

        let ack = eap_mschapv2::create_ack(3, OpCode::Success);
        let outcome = EapMsChapV2Handler
            .handle_response(&mut state, &ack, &round("pw"))
            .unwrap();
        let EapMethodOutcome::Success { attributes } = outcome else {
            panic!("expected success");
        };
        assert_eq!(attributes.len(), 4);
        assert!(state.success);
    }

    #[test]
    fn test_wrong_password_fails() {
        let mut state = challenged();
        let response = peer_response(&state, "wrong");
        let outcome = EapMsChapV2Handler
            .handle_response(&mut state, &response, &round("pw"))
            .unwrap();
        assert!(matches!(outcome, EapMethodOutcome::Failure));
    }

    #[test]
    fn test_ack_before_response_is_rejected() {
        let mut state = challenged();
        let ack = eap_mschapv2::create_ack(2, OpCode::Success);
        assert!(EapMsChapV2Handler
            .handle_response(&mut state, &ack, &round("pw"))
            .is_err());
    }
}
