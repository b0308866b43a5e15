use crate::error::AuthError;
use crate::pipeline::AuthRequestContext;
use crate::plugins::PasswordValidator;
use radius_wire::mschap::{
    derive_mppe_keys, encrypt_mppe_key, generate_authenticator_response, ms_attr,
    verify_nt_response, MppeKeys, MsChap2Response, CHALLENGE_LENGTH,
};
use radius_wire::{vendor_id, Attribute, PacketError, VendorAttribute};

/// Encryption allowed, not required
const MPPE_POLICY_ALLOWED: u32 = 1;
/// 40- and 128-bit RC4
const MPPE_TYPES_40_128: u32 = 6;

/// MS-MPPE key attributes (RFC 2548) salt-encrypted for one reply
pub(crate) fn mppe_attributes(
    keys: &MppeKeys,
    secret: &[u8],
    request_authenticator: &[u8; 16],
) -> Result<Vec<Attribute>, PacketError> {
    let ms = vendor_id::MICROSOFT;
    [
        VendorAttribute::integer(ms, ms_attr::MPPE_ENCRYPTION_POLICY, MPPE_POLICY_ALLOWED)?,
        VendorAttribute::integer(ms, ms_attr::MPPE_ENCRYPTION_TYPES, MPPE_TYPES_40_128)?,
        VendorAttribute::new(
            ms,
            ms_attr::MPPE_SEND_KEY,
            encrypt_mppe_key(&keys.send_key, secret, request_authenticator),
        )?,
        VendorAttribute::new(
            ms,
            ms_attr::MPPE_RECV_KEY,
            encrypt_mppe_key(&keys.recv_key, secret, request_authenticator),
        )?,
    ]
    .iter()
    .map(VendorAttribute::to_attribute)
    .collect()
}

/// The user name fed into ChallengeHash drops any `DOMAIN\` prefix
/// (RFC 2759 Section 4)
pub(crate) fn mschap_username(username: &str) -> &str {
    username.rsplit('\\').next().unwrap_or(username)
}

/// MS-CHAP-Challenge plus MS-CHAP2-Response (RFC 2548, RFC 2759)
pub struct MsChapV2Validator;

impl PasswordValidator for MsChapV2Validator {
    fn name(&self) -> &'static str {
        "mschapv2"
    }

    fn can_handle(&self, ctx: &AuthRequestContext) -> bool {
        let packet = ctx.packet();
        packet
            .vendor_attribute(vendor_id::MICROSOFT, ms_attr::CHAP_CHALLENGE)
            .is_some()
            && packet
                .vendor_attribute(vendor_id::MICROSOFT, ms_attr::CHAP2_RESPONSE)
                .is_some()
    }

    fn validate(&self, ctx: &mut AuthRequestContext, password: &str) -> Result<(), AuthError> {
        let packet = ctx.packet();
        let challenge_attr = packet
            .vendor_attribute(vendor_id::MICROSOFT, ms_attr::CHAP_CHALLENGE)
            .ok_or_else(|| AuthError::Malformed("missing MS-CHAP-Challenge".into()))?;
        let response_attr = packet
            .vendor_attribute(vendor_id::MICROSOFT, ms_attr::CHAP2_RESPONSE)
            .ok_or_else(|| AuthError::Malformed("missing MS-CHAP2-Response".into()))?;

        let challenge: [u8; CHALLENGE_LENGTH] =
            challenge_attr.value.as_slice().try_into().map_err(|_| {
                AuthError::Malformed(format!(
                    "MS-CHAP-Challenge must be {} bytes, got {}",
                    CHALLENGE_LENGTH,
                    challenge_attr.value.len()
                ))
            })?;
        let response = MsChap2Response::from_bytes(&response_attr.value)
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        let username = mschap_username(&ctx.username).to_string();
        if !verify_nt_response(
            &challenge,
            &response.peer_challenge,
            &username,
            password,
            &response.nt_response,
        ) {
            return Err(AuthError::PasswordMismatch);
        }

        let auth_response = generate_authenticator_response(
            password,
            &response.nt_response,
            &response.peer_challenge,
            &challenge,
            &username,
        );
        let mut success = Vec::with_capacity(1 + auth_response.len());
        success.push(response.ident);
        success.extend_from_slice(auth_response.as_bytes());

        let keys = derive_mppe_keys(password, &response.nt_response, true);
        let to_auth_err = |e: PacketError| AuthError::Other(e.to_string());

        let mut attributes = vec![VendorAttribute::new(
            vendor_id::MICROSOFT,
            ms_attr::CHAP2_SUCCESS,
            success,
        )
        .and_then(|v| v.to_attribute())
        .map_err(to_auth_err)?];
        attributes.extend(
            mppe_attributes(&keys, &ctx.secret, ctx.request_authenticator())
                .map_err(to_auth_err)?,
        );

        ctx.accept_attributes.extend(attributes);
        Ok(())
    }
}
