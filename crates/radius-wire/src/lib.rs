//! RADIUS wire protocol
//!
//! Packet and attribute codecs for RFC 2865/2866/2869, EAP framing over
//! RADIUS (RFC 3579), Vendor-Specific attributes, and the MS-CHAPv2 and MPPE
//! primitives (RFC 2759, RFC 3079, RFC 2548). Nothing here knows about users
//! or sessions.
//!
//! # Example
//!
//! ```rust
//! use radius_wire::{Attribute, AttributeType, Code, Packet};
//! use radius_wire::auth::{encrypt_user_password, generate_request_authenticator};
//!
//! let req_auth = generate_request_authenticator();
//! let mut packet = Packet::new(Code::AccessRequest, 1, req_auth);
//! packet.add_attribute(Attribute::string(AttributeType::UserName as u8, "alice").unwrap());
//! let hidden = encrypt_user_password("password", b"secret", &req_auth);
//! packet.add_attribute(Attribute::new(AttributeType::UserPassword as u8, hidden).unwrap());
//!
//! let bytes = packet.encode().unwrap();
//! assert_eq!(Packet::decode(&bytes).unwrap(), packet);
//! ```

pub mod accounting;
pub mod attributes;
pub mod auth;
pub mod chap;
pub mod eap;
pub mod message_auth;
pub mod mschap;
pub mod packet;
pub mod vendor;

pub use accounting::{AcctStatusType, AcctTerminateCause};
pub use attributes::{Attribute, AttributeType};
pub use auth::{
    calculate_accounting_request_authenticator, calculate_response_authenticator,
    decrypt_user_password, encrypt_user_password, generate_request_authenticator, sign_response,
    verify_accounting_request_authenticator, verify_response_authenticator, PasswordError,
};
pub use chap::{compute_chap_response, verify_chap_password, ChapError, ChapResponse};
pub use eap::{EapCode, EapError, EapPacket, EapType};
pub use message_auth::{
    calculate_message_authenticator, verify_message_authenticator,
    verify_packet_message_authenticator,
};
pub use packet::{Code, Packet, PacketError};
pub use vendor::{vendor_id, VendorAttribute};
