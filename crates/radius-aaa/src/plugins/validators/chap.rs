use crate::error::AuthError;
use crate::pipeline::AuthRequestContext;
use crate::plugins::PasswordValidator;
use radius_wire::{verify_chap_password, AttributeType};

/// CHAP-Password against a 16-byte CHAP-Challenge; a request without the
/// challenge attribute is malformed
pub struct ChapValidator;

impl PasswordValidator for ChapValidator {
    fn name(&self) -> &'static str {
        "chap"
    }

    fn can_handle(&self, ctx: &AuthRequestContext) -> bool {
        ctx.packet().has_attribute(AttributeType::ChapPassword)
    }

    fn validate(&self, ctx: &mut AuthRequestContext, password: &str) -> Result<(), AuthError> {
        let packet = ctx.packet();
        let chap_password = packet
            .bytes_value(AttributeType::ChapPassword)
            .ok_or_else(|| AuthError::Malformed("missing CHAP-Password".into()))?;
        let challenge = packet
            .bytes_value(AttributeType::ChapChallenge)
            .ok_or_else(|| AuthError::Malformed("missing CHAP-Challenge".into()))?;

        match verify_chap_password(chap_password, challenge, password.as_bytes()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::PasswordMismatch),
            Err(e) => Err(AuthError::Malformed(e.to_string())),
        }
    }
}
