//! Vendor dialects: request parsing and rate attribute encoding
//!
//! Both sides are keyed by the NAS vendor code (the IANA enterprise number
//! as a string) with [`DEFAULT_VENDOR`] as the fallback.

mod builders;
mod parsers;

pub use builders::{
    clamp_rate, DefaultResponseBuilder, H3cResponseBuilder, HuaweiResponseBuilder,
    IkuaiResponseBuilder, MikrotikResponseBuilder, ZteResponseBuilder,
};
pub use parsers::{parse_vlan_ids, DefaultParser, H3cParser, HuaweiParser, ZteParser};

pub const DEFAULT_VENDOR: &str = "default";
pub const VENDOR_HUAWEI: &str = "2011";
pub const VENDOR_ZTE: &str = "3902";
pub const VENDOR_MIKROTIK: &str = "14988";
pub const VENDOR_IKUAI: &str = "10055";
pub const VENDOR_H3C: &str = "25506";

/// Values NAS devices send when they do not know the MAC
pub fn is_placeholder_mac(mac: &str) -> bool {
    let mac = mac.trim();
    mac.is_empty() || mac.eq_ignore_ascii_case("N/A")
}

/// Canonical `aa:bb:cc:dd:ee:ff` form of any 12-hex-digit MAC notation
/// (`AA-BB-..`, `aabb.ccdd.eeff`, `AABBCCDDEEFF`); empty when not a MAC
pub fn normalize_mac(raw: &str) -> String {
    if is_placeholder_mac(raw) {
        return String::new();
    }
    let hex: Vec<char> = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();
    if hex.len() != 12 || !hex.iter().all(|c| c.is_ascii_hexdigit()) {
        return String::new();
    }
    hex.chunks(2)
        .map(|pair| pair.iter().collect::<String>().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(":")
}
