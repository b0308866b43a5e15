//! Multi-round EAP (RFC 3748, RFC 3579)
//!
//! The [`EapCoordinator`] owns the conversation: it allocates the RADIUS
//! State, picks a method and keeps an [`EapChallengeState`] per exchange.
//! Methods implement [`EapHandler`] and only ever see their own state.

pub mod coordinator;
pub mod md5;
pub mod mschapv2;
pub mod state;

pub use coordinator::{EapCoordinator, EapResult};
pub use md5::EapMd5Handler;
pub use mschapv2::EapMsChapV2Handler;
pub use state::{EapChallengeState, EapStage, EapStateStore};

use radius_wire::{Attribute, EapError, EapPacket};

/// Name the server puts in method challenges
pub const SERVER_NAME: &str = "radius-aaa";

/// Inputs a method may need for one round
#[derive(Debug, Clone, Copy)]
pub struct EapRoundContext<'a> {
    pub username: &'a str,
    /// Stored clear-text password of the user
    pub password: &'a str,
    pub secret: &'a [u8],
    /// Authenticator of the Access-Request being answered
    pub request_authenticator: &'a [u8; 16],
}

#[derive(Debug)]
pub enum EapMethodOutcome {
    /// Send this EAP-Request in an Access-Challenge
    Challenge(EapPacket),
    /// Authenticated; extra attributes go on the Access-Accept
    Success { attributes: Vec<Attribute> },
    Failure,
}

pub trait EapHandler: Send + Sync {
    /// Lower-case method name used in configuration, e.g. `eap-md5`
    fn name(&self) -> &'static str;

    fn eap_type(&self) -> u8;

    /// First request of the method. `state.eap_identifier` already holds the
    /// identifier to use.
    fn initiate(
        &self,
        state: &mut EapChallengeState,
        round: &EapRoundContext<'_>,
    ) -> Result<EapPacket, EapError>;

    fn handle_response(
        &self,
        state: &mut EapChallengeState,
        response: &EapPacket,
        round: &EapRoundContext<'_>,
    ) -> Result<EapMethodOutcome, EapError>;
}

/// The response must answer the last request we sent
pub(crate) fn check_identifier(
    state: &EapChallengeState,
    response: &EapPacket,
) -> Result<(), EapError> {
    if response.identifier != state.eap_identifier {
        return Err(EapError::InvalidResponseFormat("identifier mismatch"));
    }
    Ok(())
}
