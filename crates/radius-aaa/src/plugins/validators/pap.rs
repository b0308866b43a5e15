use crate::error::AuthError;
use crate::pipeline::AuthRequestContext;
use crate::plugins::PasswordValidator;
use radius_wire::{decrypt_user_password, AttributeType};

/// User-Password hidden with the NAS secret (RFC 2865 Section 5.2)
pub struct PapValidator;

impl PasswordValidator for PapValidator {
    fn name(&self) -> &'static str {
        "pap"
    }

    fn can_handle(&self, ctx: &AuthRequestContext) -> bool {
        ctx.packet()
            .bytes_value(AttributeType::UserPassword)
            .is_some_and(|v| !v.is_empty())
    }

    fn validate(&self, ctx: &mut AuthRequestContext, password: &str) -> Result<(), AuthError> {
        let hidden = ctx
            .packet()
            .bytes_value(AttributeType::UserPassword)
            .ok_or_else(|| AuthError::Malformed("missing User-Password".into()))?;

        let clear = decrypt_user_password(hidden, &ctx.secret, ctx.request_authenticator())
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        if clear.trim() != password {
            return Err(AuthError::PasswordMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::test_context;
    use radius_wire::{encrypt_user_password, Attribute, Code, Packet};

    fn pap_request(password: &str, secret: &[u8]) -> Packet {
        let auth = [0x42u8; 16];
        let mut packet = Packet::new(Code::AccessRequest, 1, auth);
        packet.add_attribute(Attribute::string(AttributeType::UserName as u8, "alice").unwrap());
        packet.add_attribute(
            Attribute::new(
                AttributeType::UserPassword as u8,
                encrypt_user_password(password, secret, &auth),
            )
            .unwrap(),
        );
        packet
    }

    #[test]
    fn test_pap_match_and_mismatch() {
        let mut ctx = test_context(pap_request("secret-pw", b"s3cr3t"), b"s3cr3t");
        assert!(PapValidator.can_handle(&ctx));
        assert!(PapValidator.validate(&mut ctx, "secret-pw").is_ok());
        assert!(matches!(
            PapValidator.validate(&mut ctx, "other"),
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_wrong_secret_is_a_mismatch() {
        let mut ctx = test_context(pap_request("secret-pw", b"s3cr3t"), b"wrong");
        assert!(PapValidator.validate(&mut ctx, "secret-pw").is_err());
    }

    #[test]
    fn test_not_pap() {
        let packet = Packet::new(Code::AccessRequest, 1, [0u8; 16]);
        let ctx = test_context(packet, b"s");
        assert!(!PapValidator.can_handle(&ctx));
    }
}
