use crate::model::{Nas, User};
use crate::plugins::VendorRequest;
use crate::ratelimit::RateLimitPermit;
use crate::server::Request;
use radius_wire::{Attribute, Packet};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// Metadata key holding the name of the validator that accepted the request
pub const META_AUTH_METHOD: &str = "auth_method";
/// Metadata key holding the EAP state id of the current round
pub const META_EAP_STATE: &str = "eap_state";

/// Mutable state of one Access-Request as it moves through the stages
pub struct AuthRequestContext {
    pub request: Request,
    /// Shared secret of the NAS, replaced by the NAS record's once resolved
    pub secret: Vec<u8>,
    /// Reply being built; an Access-Accept skeleton after `nas_lookup`
    pub response: Option<Packet>,
    pub username: String,
    pub calling_station_id: String,
    pub nas_identifier: String,
    pub remote_ip: IpAddr,
    pub nas: Option<Nas>,
    pub vendor_request: VendorRequest,
    pub user: Option<User>,
    pub is_eap: bool,
    pub is_mac_auth: bool,
    /// Preferred EAP method name
    pub eap_method: String,
    /// Identifier of the inbound EAP message, reused for EAP-Failure
    pub eap_identifier: Option<u8>,
    pub skip_password_validation: bool,
    pub rate_limit: Option<RateLimitPermit>,
    pub stopped: bool,
    pub metadata: HashMap<String, Value>,
    /// Attributes appended to the Access-Accept when it is finalised
    pub accept_attributes: Vec<Attribute>,
}

impl AuthRequestContext {
    pub fn new(request: Request) -> Self {
        let secret = request.secret.clone();
        let remote_ip = request.remote_addr.ip();
        AuthRequestContext {
            request,
            secret,
            response: None,
            username: String::new(),
            calling_station_id: String::new(),
            nas_identifier: String::new(),
            remote_ip,
            nas: None,
            vendor_request: VendorRequest::default(),
            user: None,
            is_eap: false,
            is_mac_auth: false,
            eap_method: String::new(),
            eap_identifier: None,
            skip_password_validation: false,
            rate_limit: None,
            stopped: false,
            metadata: HashMap::new(),
            accept_attributes: Vec::new(),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.request.packet
    }

    pub fn request_authenticator(&self) -> &[u8; 16] {
        &self.request.packet.authenticator
    }

    pub fn rate_limit_acquired(&self) -> bool {
        self.rate_limit.is_some()
    }

    /// Vendor code of the resolved NAS, `default` before lookup
    pub fn vendor_code(&self) -> &str {
        self.nas
            .as_ref()
            .map(|n| n.vendor_code.as_str())
            .unwrap_or(crate::plugins::vendors::DEFAULT_VENDOR)
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
pub(crate) fn test_context(packet: Packet, secret: &[u8]) -> AuthRequestContext {
    let request = Request::new(
        "192.0.2.10:40000".parse().unwrap(),
        "192.0.2.1:1812".parse().unwrap(),
        packet,
        secret.to_vec(),
    );
    let mut ctx = AuthRequestContext::new(request);
    ctx.username = ctx.packet().string_value(radius_wire::AttributeType::UserName);
    ctx
}
