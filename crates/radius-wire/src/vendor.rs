//! Vendor-Specific attributes (RFC 2865 Section 5.26)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |  Length       |            Vendor-Id
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!      Vendor-Id (cont)           | Vendor type   | Vendor length |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Attribute-Specific...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::attributes::{Attribute, AttributeType};
use crate::packet::PacketError;

/// IANA private enterprise numbers of supported vendors
pub mod vendor_id {
    pub const MICROSOFT: u32 = 311;
    pub const HUAWEI: u32 = 2011;
    pub const ZTE: u32 = 3902;
    pub const IKUAI: u32 = 10055;
    pub const MIKROTIK: u32 = 14988;
    pub const H3C: u32 = 25506;
}

/// Vendor id + type/length header
const VSA_HEADER: usize = 6;
/// Largest sub-attribute value that still fits one Vendor-Specific attribute
pub const MAX_VSA_VALUE_LENGTH: usize = Attribute::MAX_VALUE_LENGTH - VSA_HEADER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorAttribute {
    pub vendor_id: u32,
    pub vendor_type: u8,
    pub value: Vec<u8>,
}

impl VendorAttribute {
    pub fn new(vendor_id: u32, vendor_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        if value.len() > MAX_VSA_VALUE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Vendor attribute {}:{} value too long: {} bytes",
                vendor_id,
                vendor_type,
                value.len()
            )));
        }
        Ok(VendorAttribute {
            vendor_id,
            vendor_type,
            value,
        })
    }

    pub fn string(vendor_id: u32, vendor_type: u8, value: &str) -> Result<Self, PacketError> {
        Self::new(vendor_id, vendor_type, value.as_bytes().to_vec())
    }

    pub fn integer(vendor_id: u32, vendor_type: u8, value: u32) -> Result<Self, PacketError> {
        Self::new(vendor_id, vendor_type, value.to_be_bytes().to_vec())
    }

    /// Parse every sub-attribute packed in one Vendor-Specific value
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>, PacketError> {
        if data.len() < 4 {
            return Err(PacketError::AttributeError(format!(
                "Vendor-Specific too short: {} bytes",
                data.len()
            )));
        }
        let vendor_id = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

        let mut result = Vec::new();
        let mut rest = &data[4..];
        while !rest.is_empty() {
            if rest.len() < 2 {
                return Err(PacketError::AttributeError(
                    "Truncated vendor sub-attribute header".to_string(),
                ));
            }
            let length = rest[1] as usize;
            if length < 2 || length > rest.len() {
                return Err(PacketError::AttributeError(format!(
                    "Invalid vendor sub-attribute length: {}",
                    length
                )));
            }
            result.push(VendorAttribute {
                vendor_id,
                vendor_type: rest[0],
                value: rest[2..length].to_vec(),
            });
            rest = &rest[length..];
        }
        Ok(result)
    }

    /// Wrap into a Vendor-Specific (26) attribute
    pub fn to_attribute(&self) -> Result<Attribute, PacketError> {
        let mut value = Vec::with_capacity(VSA_HEADER + self.value.len());
        value.extend_from_slice(&self.vendor_id.to_be_bytes());
        value.push(self.vendor_type);
        value.push((self.value.len() + 2) as u8);
        value.extend_from_slice(&self.value);
        Attribute::new(AttributeType::VendorSpecific as u8, value)
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    pub fn as_integer(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_attribute_wire_format() {
        let vsa = VendorAttribute::string(vendor_id::MIKROTIK, 8, "1024k/2048k").unwrap();
        let attr = vsa.to_attribute().unwrap();
        assert_eq!(attr.attr_type, 26);
        assert_eq!(&attr.value[..4], &14988u32.to_be_bytes());
        assert_eq!(attr.value[4], 8);
        assert_eq!(attr.value[5] as usize, 2 + "1024k/2048k".len());

        let parsed = VendorAttribute::parse_all(&attr.value).unwrap();
        assert_eq!(parsed, vec![vsa]);
    }

    #[test]
    fn test_parse_multiple_sub_attributes() {
        let mut data = 2011u32.to_be_bytes().to_vec();
        data.extend_from_slice(&[2, 6, 0, 0, 4, 0]);
        data.extend_from_slice(&[5, 6, 0, 0, 8, 0]);
        let parsed = VendorAttribute::parse_all(&data).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].as_integer(), Some(1024));
        assert_eq!(parsed[1].vendor_type, 5);
        assert_eq!(parsed[1].as_integer(), Some(2048));
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        let mut data = 9u32.to_be_bytes().to_vec();
        data.extend_from_slice(&[1, 10, b'x']);
        assert!(VendorAttribute::parse_all(&data).is_err());
        assert!(VendorAttribute::parse_all(&[0, 0]).is_err());
    }
}
