use super::Code;
use crate::attributes::{Attribute, AttributeType};
use crate::vendor::VendorAttribute;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),
    #[error("Invalid packet code: {0}")]
    InvalidCode(u8),
    #[error("Attribute error: {0}")]
    AttributeError(String),
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
}

/// RADIUS Packet structure as defined in RFC 2865 Section 3
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Code      |  Identifier   |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Authenticator                         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Attributes ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub code: Code,
    pub identifier: u8,
    /// Request Authenticator on requests, Response Authenticator once signed
    pub authenticator: [u8; 16],
    pub attributes: Vec<Attribute>,
}

impl Packet {
    /// Header size: code + identifier + length + authenticator
    pub const MIN_PACKET_SIZE: usize = 20;
    /// RFC 2865 upper bound
    pub const MAX_PACKET_SIZE: usize = 4096;

    pub fn new(code: Code, identifier: u8, authenticator: [u8; 16]) -> Self {
        Packet {
            code,
            identifier,
            authenticator,
            attributes: Vec::new(),
        }
    }

    /// Start a reply to this packet. The authenticator is left as the
    /// request authenticator until the reply is signed.
    pub fn reply(&self, code: Code) -> Self {
        let mut reply = Packet::new(code, self.identifier, self.authenticator);
        // RFC 2865 Section 5.33: Proxy-State is echoed unmodified
        for attr in self.find_all_attributes(AttributeType::ProxyState as u8) {
            reply.attributes.push(attr.clone());
        }
        reply
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Replace every attribute of the given type with a single new value
    pub fn set_attribute(&mut self, attribute: Attribute) {
        let attr_type = attribute.attr_type;
        self.attributes.retain(|a| a.attr_type != attr_type);
        self.attributes.push(attribute);
    }

    pub fn remove_attributes(&mut self, attr_type: u8) {
        self.attributes.retain(|a| a.attr_type != attr_type);
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let total_length = self.length();
        if total_length > Self::MAX_PACKET_SIZE {
            return Err(PacketError::PacketTooLarge(total_length));
        }

        let mut buffer = Vec::with_capacity(total_length);
        buffer.push(self.code.as_u8());
        buffer.push(self.identifier);
        buffer.extend_from_slice(&(total_length as u16).to_be_bytes());
        buffer.extend_from_slice(&self.authenticator);
        for attr in &self.attributes {
            attr.encode_into(&mut buffer)?;
        }

        Ok(buffer)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < Self::MIN_PACKET_SIZE {
            return Err(PacketError::InvalidLength(data.len()));
        }

        let code = Code::from_u8(data[0]).ok_or(PacketError::InvalidCode(data[0]))?;
        let identifier = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;

        if !(Self::MIN_PACKET_SIZE..=Self::MAX_PACKET_SIZE).contains(&length) {
            return Err(PacketError::InvalidLength(length));
        }
        // Octets beyond Length are padding and MUST be ignored
        if data.len() < length {
            return Err(PacketError::InvalidLength(data.len()));
        }

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&data[4..20]);

        let mut attributes = Vec::new();
        let mut rest = &data[Self::MIN_PACKET_SIZE..length];
        while !rest.is_empty() {
            let attr = Attribute::decode(rest)?;
            rest = &rest[attr.encoded_length()..];
            attributes.push(attr);
        }

        Ok(Packet {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }

    /// Length of the encoded packet
    pub fn length(&self) -> usize {
        Self::MIN_PACKET_SIZE
            + self
                .attributes
                .iter()
                .map(Attribute::encoded_length)
                .sum::<usize>()
    }

    pub fn find_attribute(&self, attr_type: u8) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.attr_type == attr_type)
    }

    pub fn find_all_attributes(&self, attr_type: u8) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.attr_type == attr_type)
            .collect()
    }

    pub fn has_attribute(&self, attr_type: AttributeType) -> bool {
        self.find_attribute(attr_type as u8).is_some()
    }

    /// Attribute value as UTF-8 text, lossy; empty string when absent
    pub fn string_value(&self, attr_type: AttributeType) -> String {
        self.find_attribute(attr_type as u8)
            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
            .unwrap_or_default()
    }

    pub fn bytes_value(&self, attr_type: AttributeType) -> Option<&[u8]> {
        self.find_attribute(attr_type as u8)
            .map(|a| a.value.as_slice())
    }

    /// 32-bit integer attribute; None when absent or malformed
    pub fn integer_value(&self, attr_type: AttributeType) -> Option<u32> {
        self.find_attribute(attr_type as u8)
            .and_then(|a| a.as_integer().ok())
    }

    pub fn ipv4_value(&self, attr_type: AttributeType) -> Option<Ipv4Addr> {
        self.find_attribute(attr_type as u8)
            .and_then(|a| a.as_ipv4().ok())
            .map(Ipv4Addr::from)
    }

    /// All Vendor-Specific sub-attributes for a vendor id
    pub fn vendor_attributes(&self, vendor_id: u32) -> Vec<VendorAttribute> {
        self.find_all_attributes(AttributeType::VendorSpecific as u8)
            .into_iter()
            .filter_map(|a| VendorAttribute::parse_all(&a.value).ok())
            .flatten()
            .filter(|v| v.vendor_id == vendor_id)
            .collect()
    }

    /// First Vendor-Specific sub-attribute matching vendor id and type
    pub fn vendor_attribute(&self, vendor_id: u32, vendor_type: u8) -> Option<VendorAttribute> {
        self.vendor_attributes(vendor_id)
            .into_iter()
            .find(|v| v.vendor_type == vendor_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_encode_decode() {
        let mut packet = Packet::new(Code::AccessRequest, 42, [1u8; 16]);
        packet.add_attribute(Attribute::string(AttributeType::UserName as u8, "alice").unwrap());
        let encoded = packet.encode().unwrap();
        assert_eq!(encoded.len(), packet.length());

        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.string_value(AttributeType::UserName), "alice");
    }

    #[test]
    fn test_packet_min_size() {
        assert!(matches!(
            Packet::decode(&[0u8; 19]),
            Err(PacketError::InvalidLength(19))
        ));
    }

    #[test]
    fn test_trailing_padding_is_ignored() {
        let packet = Packet::new(Code::AccountingRequest, 7, [9u8; 16]);
        let mut encoded = packet.encode().unwrap();
        encoded.extend_from_slice(&[0xAA; 5]);
        let decoded = Packet::decode(&encoded).unwrap();
        assert!(decoded.attributes.is_empty());
    }

    #[test]
    fn test_reply_copies_proxy_state() {
        let mut request = Packet::new(Code::AccessRequest, 3, [2u8; 16]);
        request.add_attribute(Attribute::new(AttributeType::ProxyState as u8, vec![1, 2]).unwrap());
        request.add_attribute(Attribute::string(AttributeType::UserName as u8, "bob").unwrap());

        let reply = request.reply(Code::AccessReject);
        assert_eq!(reply.identifier, 3);
        assert_eq!(reply.attributes.len(), 1);
        assert_eq!(reply.attributes[0].attr_type, AttributeType::ProxyState as u8);
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut packet = Packet::new(Code::AccessAccept, 1, [0u8; 16]);
        packet.add_attribute(Attribute::integer(AttributeType::SessionTimeout as u8, 10).unwrap());
        packet.set_attribute(Attribute::integer(AttributeType::SessionTimeout as u8, 20).unwrap());
        assert_eq!(packet.find_all_attributes(AttributeType::SessionTimeout as u8).len(), 1);
        assert_eq!(packet.integer_value(AttributeType::SessionTimeout), Some(20));
    }
}
