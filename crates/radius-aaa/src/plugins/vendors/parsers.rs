use super::{normalize_mac, DEFAULT_VENDOR, VENDOR_H3C, VENDOR_HUAWEI, VENDOR_ZTE};
use crate::plugins::{VendorParser, VendorRequest};
use radius_wire::{vendor_id, AttributeType, Packet};
use regex::Regex;
use std::sync::LazyLock;

/// H3C-Ip-Host-Addr, "ip mac"
const H3C_IP_HOST_ADDR: u8 = 60;

static VLANID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvlanid=(\d+)").expect("valid vlanid pattern"));
static VLANID2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvlanid2=(\d+)").expect("valid vlanid2 pattern"));
/// `slot/subslot/port:outer.inner`
static PORT_VLAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[\d/]+:(\d+)(?:\.(\d+))?\s*$").expect("valid port vlan pattern")
});

fn capture_u32(re: &Regex, text: &str, group: usize) -> u32 {
    re.captures(text)
        .and_then(|c| c.get(group))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// VLAN tags out of a NAS-Port-Id, `(0, 0)` when none are present.
///
/// Understands `vlanid=100;vlanid2=200` and `3/0/1:2814.727`.
pub fn parse_vlan_ids(nas_port_id: &str) -> (u32, u32) {
    if VLANID.is_match(nas_port_id) {
        return (
            capture_u32(&VLANID, nas_port_id, 1),
            capture_u32(&VLANID2, nas_port_id, 1),
        );
    }
    if PORT_VLAN.is_match(nas_port_id) {
        return (
            capture_u32(&PORT_VLAN, nas_port_id, 1),
            capture_u32(&PORT_VLAN, nas_port_id, 2),
        );
    }
    (0, 0)
}

fn parse_standard(packet: &Packet) -> VendorRequest {
    let (vlan_id1, vlan_id2) = parse_vlan_ids(&packet.string_value(AttributeType::NasPortId));
    VendorRequest {
        mac_addr: normalize_mac(&packet.string_value(AttributeType::CallingStationId)),
        vlan_id1,
        vlan_id2,
    }
}

/// Calling-Station-Id for the MAC, NAS-Port-Id for VLANs
pub struct DefaultParser;

impl VendorParser for DefaultParser {
    fn vendor_code(&self) -> &str {
        DEFAULT_VENDOR
    }

    fn parse(&self, packet: &Packet) -> VendorRequest {
        parse_standard(packet)
    }
}

pub struct HuaweiParser;

impl VendorParser for HuaweiParser {
    fn vendor_code(&self) -> &str {
        VENDOR_HUAWEI
    }

    fn parse(&self, packet: &Packet) -> VendorRequest {
        parse_standard(packet)
    }
}

/// Prefers the MAC in H3C-Ip-Host-Addr over Calling-Station-Id
pub struct H3cParser;

impl VendorParser for H3cParser {
    fn vendor_code(&self) -> &str {
        VENDOR_H3C
    }

    fn parse(&self, packet: &Packet) -> VendorRequest {
        let mut request = parse_standard(packet);
        let host_mac = packet
            .vendor_attribute(vendor_id::H3C, H3C_IP_HOST_ADDR)
            .map(|v| v.as_string())
            .and_then(|s| s.split_whitespace().last().map(normalize_mac))
            .filter(|mac| !mac.is_empty());
        if let Some(mac) = host_mac {
            request.mac_addr = mac;
        }
        request
    }
}

pub struct ZteParser;

impl VendorParser for ZteParser {
    fn vendor_code(&self) -> &str {
        VENDOR_ZTE
    }

    fn parse(&self, packet: &Packet) -> VendorRequest {
        parse_standard(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_wire::{Attribute, Code, VendorAttribute};

    fn packet(calling: &str, port: &str) -> Packet {
        let mut p = Packet::new(Code::AccessRequest, 1, [0; 16]);
        p.add_attribute(Attribute::string(AttributeType::CallingStationId as u8, calling).unwrap());
        p.add_attribute(Attribute::string(AttributeType::NasPortId as u8, port).unwrap());
        p
    }

    #[test]
    fn test_vlan_formats() {
        assert_eq!(parse_vlan_ids("vlanid=100;vlanid2=200"), (100, 200));
        assert_eq!(
            parse_vlan_ids("slot=2;subslot=0;port=22;vlanid=503;"),
            (503, 0)
        );
        assert_eq!(parse_vlan_ids("3/0/1:2814.727"), (2814, 727));
        assert_eq!(parse_vlan_ids("3/0/1:2814"), (2814, 0));
        assert_eq!(parse_vlan_ids("eth0"), (0, 0));
        assert_eq!(parse_vlan_ids(""), (0, 0));
    }

    #[test]
    fn test_default_parser() {
        let req = DefaultParser.parse(&packet("AA-BB-CC-DD-EE-FF", "vlanid=10;vlanid2=20"));
        assert_eq!(req.mac_addr, "aa:bb:cc:dd:ee:ff");
        assert_eq!((req.vlan_id1, req.vlan_id2), (10, 20));

        let req = HuaweiParser.parse(&packet("N/A", ""));
        assert_eq!(req, VendorRequest::default());
    }

    #[test]
    fn test_h3c_host_addr_wins() {
        let mut p = packet("11:11:11:11:11:11", "");
        p.add_attribute(
            VendorAttribute::string(vendor_id::H3C, H3C_IP_HOST_ADDR, "10.0.0.5 22:22:22:22:22:22")
                .unwrap()
                .to_attribute()
                .unwrap(),
        );
        assert_eq!(H3cParser.parse(&p).mac_addr, "22:22:22:22:22:22");

        let plain = packet("11:11:11:11:11:11", "");
        assert_eq!(H3cParser.parse(&plain).mac_addr, "11:11:11:11:11:11");
    }
}
