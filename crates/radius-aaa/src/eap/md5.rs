use super::{check_identifier, EapHandler, EapMethodOutcome, EapRoundContext, SERVER_NAME};
use super::state::{EapChallengeState, EapStage};
use radius_wire::eap::eap_md5;
use radius_wire::{EapError, EapPacket, EapType};

/// EAP-MD5 (RFC 3748 Section 5.4)
pub struct EapMd5Handler;

impl EapHandler for EapMd5Handler {
    fn name(&self) -> &'static str {
        "eap-md5"
    }

    fn eap_type(&self) -> u8 {
        EapType::Md5Challenge.as_u8()
    }

    fn initiate(
        &self,
        state: &mut EapChallengeState,
        _round: &EapRoundContext<'_>,
    ) -> Result<EapPacket, EapError> {
        let challenge: [u8; eap_md5::MD5_CHALLENGE_SIZE] = rand::random();
        state.challenge = challenge.to_vec();
        state.stage = EapStage::MethodChallenge;
        Ok(eap_md5::create_challenge(
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
        let (hash, _name) = eap_md5::parse_response(response)?;
        state.stage = EapStage::MethodResponse;

        if eap_md5::verify_response(response.identifier, round.password, &state.challenge, &hash) {
            state.stage = EapStage::Success;
            state.success = true;
            Ok(EapMethodOutcome::Success {
                attributes: Vec::new(),
            })
        } else {
            state.stage = EapStage::Failure;
            Ok(EapMethodOutcome::Failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round<'a>(password: &'a str) -> EapRoundContext<'a> {
        EapRoundContext {
            username: "alice",
            password,
            secret: b"secret",
            request_authenticator: &[0u8; 16],
        }
    }

    fn challenged(password: &str) -> (EapChallengeState, EapPacket) {
        let mut state = EapChallengeState::new("s", "alice");
        state.eap_identifier = 2;
        let request = EapMd5Handler.initiate(&mut state, &round(password)).unwrap();
        (state, request)
    }

    #[test]
    fn test_challenge_is_random_and_stored() {
        let (state, request) = challenged("pw");
        assert_eq!(state.stage, EapStage::MethodChallenge);
        assert_eq!(request.identifier, 2);
        assert_eq!(
            eap_md5::parse_challenge(&request).unwrap(),
            state.challenge
        );
        let (other, _) = challenged("pw");
        assert_ne!(state.challenge, other.challenge);
    }

    #[test]
    fn test_correct_response_succeeds() {
        let (mut state, _) = challenged("pw");
        let hash = eap_md5::compute_response_hash(2, "pw", &state.challenge);
        let response = eap_md5::create_response(2, &hash, "alice");

        let outcome = EapMd5Handler
            .handle_response(&mut state, &response, &round("pw"))
            .unwrap();
        assert!(matches!(outcome, EapMethodOutcome::Success { .. }));
        assert!(state.success);
    }

    #[test]
    fn test_wrong_password_fails() {
        let (mut state, _) = challenged("pw");
        let hash = eap_md5::compute_response_hash(2, "wrong", &state.challenge);
        let response = eap_md5::create_response(2, &hash, "alice");

        let outcome = EapMd5Handler
            .handle_response(&mut state, &response, &round("pw"))
            .unwrap();
        assert!(matches!(outcome, EapMethodOutcome::Failure));
        assert_eq!(state.stage, EapStage::Failure);
    }

    #[test]
    fn test_stale_identifier_is_rejected() {
        let (mut state, _) = challenged("pw");
        let hash = eap_md5::compute_response_hash(1, "pw", &state.challenge);
        let response = eap_md5::create_response(1, &hash, "alice");
        assert!(EapMd5Handler
            .handle_response(&mut state, &response, &round("pw"))
            .is_err());
    }
}
