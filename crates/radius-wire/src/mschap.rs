//! MS-CHAPv2 (RFC 2759), MPPE key derivation (RFC 3079) and the
//! Microsoft vendor attributes that carry them (RFC 2548).

use crate::packet::PacketError;
use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;
use md4::Md4;
use rand::Rng;
use sha1::{Digest, Sha1};

pub const CHALLENGE_LENGTH: usize = 16;
pub const NT_RESPONSE_LENGTH: usize = 24;
/// MS-CHAP2-Response value: ident, flags, peer challenge, reserved, NT-Response
pub const MSCHAP2_RESPONSE_LENGTH: usize = 50;
/// "S=" + 40 hex digits
pub const AUTH_RESPONSE_LENGTH: usize = 42;

/// Microsoft (vendor 311) attribute types
pub mod ms_attr {
    pub const MS_CHAP_ERROR: u8 = 2;
    pub const MPPE_ENCRYPTION_POLICY: u8 = 7;
    pub const MPPE_ENCRYPTION_TYPES: u8 = 8;
    pub const CHAP_CHALLENGE: u8 = 11;
    pub const MPPE_SEND_KEY: u8 = 16;
    pub const MPPE_RECV_KEY: u8 = 17;
    pub const CHAP2_RESPONSE: u8 = 25;
    pub const CHAP2_SUCCESS: u8 = 26;
}

const MAGIC1: &[u8] = b"Magic server to client signing constant";
const MAGIC2: &[u8] = b"Pad to make it do more than one iteration";
const MPPE_MASTER_MAGIC: &[u8] = b"This is the MPPE Master Key";
const MPPE_SEND_MAGIC_CLIENT: &[u8] =
    b"On the client side, this is the send key; on the server side, it is the receive key.";
const MPPE_SEND_MAGIC_SERVER: &[u8] =
    b"On the client side, this is the receive key; on the server side, it is the send key.";
const SHS_PAD1: [u8; 40] = [0x00; 40];
const SHS_PAD2: [u8; 40] = [0xF2; 40];

/// Decoded MS-CHAP2-Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsChap2Response {
    pub ident: u8,
    pub flags: u8,
    pub peer_challenge: [u8; CHALLENGE_LENGTH],
    pub nt_response: [u8; NT_RESPONSE_LENGTH],
}

impl MsChap2Response {
    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() != MSCHAP2_RESPONSE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "MS-CHAP2-Response must be {} bytes, got {}",
                MSCHAP2_RESPONSE_LENGTH,
                data.len()
            )));
        }
        let mut peer_challenge = [0u8; CHALLENGE_LENGTH];
        peer_challenge.copy_from_slice(&data[2..18]);
        let mut nt_response = [0u8; NT_RESPONSE_LENGTH];
        nt_response.copy_from_slice(&data[26..50]);
        Ok(MsChap2Response {
            ident: data[0],
            flags: data[1],
            peer_challenge,
            nt_response,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MSCHAP2_RESPONSE_LENGTH);
        out.push(self.ident);
        out.push(self.flags);
        out.extend_from_slice(&self.peer_challenge);
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&self.nt_response);
        out
    }
}

pub fn generate_challenge() -> [u8; CHALLENGE_LENGTH] {
    let mut challenge = [0u8; CHALLENGE_LENGTH];
    rand::rng().fill(&mut challenge);
    challenge
}

/// MD4 of the UTF-16LE password
pub fn nt_password_hash(password: &str) -> [u8; 16] {
    let unicode: Vec<u8> = password
        .encode_utf16()
        .flat_map(|c| c.to_le_bytes())
        .collect();
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md4::digest(&unicode));
    out
}

pub fn hash_nt_password_hash(password_hash: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md4::digest(password_hash));
    out
}

pub fn challenge_hash(
    peer_challenge: &[u8; CHALLENGE_LENGTH],
    authenticator_challenge: &[u8; CHALLENGE_LENGTH],
    username: &str,
) -> [u8; 8] {
    let mut hasher = Sha1::new();
    hasher.update(peer_challenge);
    hasher.update(authenticator_challenge);
    hasher.update(username.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hasher.finalize()[..8]);
    out
}

/// Spread 56 key bits over 8 octets, low bit of each left for parity
fn des_encrypt(key: &[u8; 7], clear: &[u8; 8]) -> [u8; 8] {
    let expanded = [
        key[0],
        (key[0] << 7) | (key[1] >> 1),
        (key[1] << 6) | (key[2] >> 2),
        (key[2] << 5) | (key[3] >> 3),
        (key[3] << 4) | (key[4] >> 4),
        (key[4] << 3) | (key[5] >> 5),
        (key[5] << 2) | (key[6] >> 6),
        key[6] << 1,
    ];
    let cipher = Des::new(GenericArray::from_slice(&expanded));
    let mut block = GenericArray::clone_from_slice(clear);
    cipher.encrypt_block(&mut block);
    let mut out = [0u8; 8];
    out.copy_from_slice(&block);
    out
}

fn challenge_response(challenge: &[u8; 8], password_hash: &[u8; 16]) -> [u8; NT_RESPONSE_LENGTH] {
    let mut z_hash = [0u8; 21];
    z_hash[..16].copy_from_slice(password_hash);

    let mut response = [0u8; NT_RESPONSE_LENGTH];
    for (i, chunk) in z_hash.chunks_exact(7).enumerate() {
        let mut key = [0u8; 7];
        key.copy_from_slice(chunk);
        response[i * 8..(i + 1) * 8].copy_from_slice(&des_encrypt(&key, challenge));
    }
    response
}

/// GenerateNTResponse (RFC 2759 Section 8.1)
pub fn generate_nt_response(
    authenticator_challenge: &[u8; CHALLENGE_LENGTH],
    peer_challenge: &[u8; CHALLENGE_LENGTH],
    username: &str,
    password: &str,
) -> [u8; NT_RESPONSE_LENGTH] {
    let challenge = challenge_hash(peer_challenge, authenticator_challenge, username);
    challenge_response(&challenge, &nt_password_hash(password))
}

pub fn verify_nt_response(
    authenticator_challenge: &[u8; CHALLENGE_LENGTH],
    peer_challenge: &[u8; CHALLENGE_LENGTH],
    username: &str,
    password: &str,
    nt_response: &[u8; NT_RESPONSE_LENGTH],
) -> bool {
    let expected = generate_nt_response(authenticator_challenge, peer_challenge, username, password);
    expected
        .iter()
        .zip(nt_response.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// GenerateAuthenticatorResponse (RFC 2759 Section 8.7): "S=" + 40 upper hex
pub fn generate_authenticator_response(
    password: &str,
    nt_response: &[u8; NT_RESPONSE_LENGTH],
    peer_challenge: &[u8; CHALLENGE_LENGTH],
    authenticator_challenge: &[u8; CHALLENGE_LENGTH],
    username: &str,
) -> String {
    let password_hash_hash = hash_nt_password_hash(&nt_password_hash(password));

    let mut hasher = Sha1::new();
    hasher.update(password_hash_hash);
    hasher.update(nt_response);
    hasher.update(MAGIC1);
    let digest = hasher.finalize();

    let challenge = challenge_hash(peer_challenge, authenticator_challenge, username);
    let mut hasher = Sha1::new();
    hasher.update(digest);
    hasher.update(challenge);
    hasher.update(MAGIC2);

    format!("S={}", hex::encode_upper(hasher.finalize()))
}

/// Session keys from the server's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MppeKeys {
    pub send_key: [u8; 16],
    pub recv_key: [u8; 16],
}

/// GetMasterKey (RFC 3079 Section 3.4)
pub fn mppe_master_key(
    password_hash_hash: &[u8; 16],
    nt_response: &[u8; NT_RESPONSE_LENGTH],
) -> [u8; 16] {
    let mut hasher = Sha1::new();
    hasher.update(password_hash_hash);
    hasher.update(nt_response);
    hasher.update(MPPE_MASTER_MAGIC);
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize()[..16]);
    out
}

fn asymmetric_start_key(master_key: &[u8; 16], magic: &[u8]) -> [u8; 16] {
    let mut hasher = Sha1::new();
    hasher.update(master_key);
    hasher.update(SHS_PAD1);
    hasher.update(magic);
    hasher.update(SHS_PAD2);
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize()[..16]);
    out
}

/// 128-bit MPPE start keys (RFC 3079 Section 3.3)
pub fn derive_mppe_keys(
    password: &str,
    nt_response: &[u8; NT_RESPONSE_LENGTH],
    is_server: bool,
) -> MppeKeys {
    let password_hash_hash = hash_nt_password_hash(&nt_password_hash(password));
    let master = mppe_master_key(&password_hash_hash, nt_response);
    let (send_magic, recv_magic) = if is_server {
        (MPPE_SEND_MAGIC_SERVER, MPPE_SEND_MAGIC_CLIENT)
    } else {
        (MPPE_SEND_MAGIC_CLIENT, MPPE_SEND_MAGIC_SERVER)
    };
    MppeKeys {
        send_key: asymmetric_start_key(&master, send_magic),
        recv_key: asymmetric_start_key(&master, recv_magic),
    }
}

/// Salt-encrypt an MS-MPPE-Send-Key / Recv-Key value (RFC 2548 Section 2.4.2)
pub fn encrypt_mppe_key(key: &[u8], secret: &[u8], request_authenticator: &[u8; 16]) -> Vec<u8> {
    let mut salt = [0u8; 2];
    rand::rng().fill(&mut salt);
    salt[0] |= 0x80;
    encrypt_mppe_key_with_salt(key, secret, request_authenticator, salt)
}

fn encrypt_mppe_key_with_salt(
    key: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
    salt: [u8; 2],
) -> Vec<u8> {
    let mut plain = Vec::with_capacity(key.len() + 16);
    plain.push(key.len() as u8);
    plain.extend_from_slice(key);
    let padded_len = plain.len().div_ceil(16) * 16;
    plain.resize(padded_len, 0);

    let mut out = Vec::with_capacity(2 + padded_len);
    out.extend_from_slice(&salt);

    let mut ctx = md5::Context::new();
    ctx.consume(secret);
    ctx.consume(request_authenticator);
    ctx.consume(salt);
    let mut b = ctx.compute().0;

    for chunk in plain.chunks(16) {
        let cipher: Vec<u8> = chunk.iter().zip(b.iter()).map(|(p, k)| p ^ k).collect();
        let mut ctx = md5::Context::new();
        ctx.consume(secret);
        ctx.consume(&cipher);
        b = ctx.compute().0;
        out.extend_from_slice(&cipher);
    }
    out
}

/// Inverse of [`encrypt_mppe_key`]
pub fn decrypt_mppe_key(
    data: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
) -> Result<Vec<u8>, PacketError> {
    if data.len() < 18 || (data.len() - 2) % 16 != 0 {
        return Err(PacketError::AttributeError(format!(
            "Invalid MPPE key attribute length: {}",
            data.len()
        )));
    }
    let (salt, cipher) = data.split_at(2);

    let mut ctx = md5::Context::new();
    ctx.consume(secret);
    ctx.consume(request_authenticator);
    ctx.consume(salt);
    let mut b = ctx.compute().0;

    let mut plain = Vec::with_capacity(cipher.len());
    for chunk in cipher.chunks(16) {
        plain.extend(chunk.iter().zip(b.iter()).map(|(c, k)| c ^ k));
        let mut ctx = md5::Context::new();
        ctx.consume(secret);
        ctx.consume(chunk);
        b = ctx.compute().0;
    }

    let key_len = plain[0] as usize;
    if key_len + 1 > plain.len() {
        return Err(PacketError::AttributeError(
            "MPPE key length exceeds attribute".to_string(),
        ));
    }
    Ok(plain[1..=key_len].to_vec())
}
