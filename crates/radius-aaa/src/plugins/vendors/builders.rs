use super::{
    DEFAULT_VENDOR, VENDOR_H3C, VENDOR_HUAWEI, VENDOR_IKUAI, VENDOR_MIKROTIK, VENDOR_ZTE,
};
use crate::plugins::{RateProfile, VendorResponseBuilder};
use radius_wire::{vendor_id, Attribute, PacketError, VendorAttribute};

/// Many NAS firmwares read rate attributes as signed 32-bit
const RATE_CEILING: u64 = i32::MAX as u64;

pub fn clamp_rate(value: u64) -> u32 {
    value.min(RATE_CEILING) as u32
}

/// KB/s to bytes/s
fn bytes_per_sec(kbps: u64) -> u32 {
    clamp_rate(kbps.saturating_mul(1024))
}

fn peak_of(average: u32) -> u32 {
    clamp_rate(u64::from(average).saturating_mul(4))
}

fn integers(vendor: u32, values: &[(u8, u32)]) -> Result<Vec<Attribute>, PacketError> {
    values
        .iter()
        .map(|(vendor_type, value)| {
            VendorAttribute::integer(vendor, *vendor_type, *value)?.to_attribute()
        })
        .collect()
}

/// Emits nothing
pub struct DefaultResponseBuilder;

impl VendorResponseBuilder for DefaultResponseBuilder {
    fn vendor_code(&self) -> &str {
        DEFAULT_VENDOR
    }

    fn build(&self, _profile: &RateProfile) -> Result<Vec<Attribute>, PacketError> {
        Ok(Vec::new())
    }
}

pub struct HuaweiResponseBuilder;

impl HuaweiResponseBuilder {
    const INPUT_AVERAGE_RATE: u8 = 2;
    const INPUT_PEAK_RATE: u8 = 3;
    const OUTPUT_AVERAGE_RATE: u8 = 5;
    const OUTPUT_PEAK_RATE: u8 = 6;
}

impl VendorResponseBuilder for HuaweiResponseBuilder {
    fn vendor_code(&self) -> &str {
        VENDOR_HUAWEI
    }

    fn build(&self, profile: &RateProfile) -> Result<Vec<Attribute>, PacketError> {
        let up = bytes_per_sec(profile.up_rate);
        let down = bytes_per_sec(profile.down_rate);
        integers(
            vendor_id::HUAWEI,
            &[
                (Self::INPUT_AVERAGE_RATE, up),
                (Self::INPUT_PEAK_RATE, peak_of(up)),
                (Self::OUTPUT_AVERAGE_RATE, down),
                (Self::OUTPUT_PEAK_RATE, peak_of(down)),
            ],
        )
    }
}

pub struct H3cResponseBuilder;

impl H3cResponseBuilder {
    const INPUT_PEAK_RATE: u8 = 1;
    const INPUT_AVERAGE_RATE: u8 = 2;
    const OUTPUT_PEAK_RATE: u8 = 4;
    const OUTPUT_AVERAGE_RATE: u8 = 5;
}

impl VendorResponseBuilder for H3cResponseBuilder {
    fn vendor_code(&self) -> &str {
        VENDOR_H3C
    }

    fn build(&self, profile: &RateProfile) -> Result<Vec<Attribute>, PacketError> {
        let up = bytes_per_sec(profile.up_rate);
        let down = bytes_per_sec(profile.down_rate);
        integers(
            vendor_id::H3C,
            &[
                (Self::INPUT_PEAK_RATE, peak_of(up)),
                (Self::INPUT_AVERAGE_RATE, up),
                (Self::OUTPUT_PEAK_RATE, peak_of(down)),
                (Self::OUTPUT_AVERAGE_RATE, down),
            ],
        )
    }
}

pub struct ZteResponseBuilder;

impl ZteResponseBuilder {
    const RATE_CTRL_SCR_DOWN: u8 = 83;
    const RATE_CTRL_SCR_UP: u8 = 89;
}

impl VendorResponseBuilder for ZteResponseBuilder {
    fn vendor_code(&self) -> &str {
        VENDOR_ZTE
    }

    fn build(&self, profile: &RateProfile) -> Result<Vec<Attribute>, PacketError> {
        integers(
            vendor_id::ZTE,
            &[
                (Self::RATE_CTRL_SCR_UP, bytes_per_sec(profile.up_rate)),
                (Self::RATE_CTRL_SCR_DOWN, bytes_per_sec(profile.down_rate)),
            ],
        )
    }
}

pub struct MikrotikResponseBuilder;

impl MikrotikResponseBuilder {
    const RATE_LIMIT: u8 = 8;
}

impl VendorResponseBuilder for MikrotikResponseBuilder {
    fn vendor_code(&self) -> &str {
        VENDOR_MIKROTIK
    }

    fn build(&self, profile: &RateProfile) -> Result<Vec<Attribute>, PacketError> {
        let limit = format!("{}k/{}k", profile.up_rate, profile.down_rate);
        Ok(vec![VendorAttribute::string(
            vendor_id::MIKROTIK,
            Self::RATE_LIMIT,
            &limit,
        )?
        .to_attribute()?])
    }
}

/// Rates in bits per second
pub struct IkuaiResponseBuilder;

impl IkuaiResponseBuilder {
    const UPSTREAM: u8 = 1;
    const DOWNSTREAM: u8 = 2;

    fn bits_per_sec(kbps: u64) -> u32 {
        clamp_rate(kbps.saturating_mul(1024).saturating_mul(8))
    }
}

impl VendorResponseBuilder for IkuaiResponseBuilder {
    fn vendor_code(&self) -> &str {
        VENDOR_IKUAI
    }

    fn build(&self, profile: &RateProfile) -> Result<Vec<Attribute>, PacketError> {
        integers(
            vendor_id::IKUAI,
            &[
                (Self::UPSTREAM, Self::bits_per_sec(profile.up_rate)),
                (Self::DOWNSTREAM, Self::bits_per_sec(profile.down_rate)),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(attrs: &[Attribute]) -> Vec<(u32, u8, Vec<u8>)> {
        attrs
            .iter()
            .flat_map(|a| VendorAttribute::parse_all(&a.value).unwrap())
            .map(|v| (v.vendor_id, v.vendor_type, v.value))
            .collect()
    }

    fn int_of(attrs: &[Attribute], vendor_type: u8) -> u32 {
        attrs
            .iter()
            .flat_map(|a| VendorAttribute::parse_all(&a.value).unwrap())
            .find(|v| v.vendor_type == vendor_type)
            .and_then(|v| v.as_integer())
            .unwrap()
    }

    #[test]
    fn test_huawei_rates() {
        let profile = RateProfile {
            up_rate: 1024,
            down_rate: 2048,
        };
        let attrs = HuaweiResponseBuilder.build(&profile).unwrap();
        assert_eq!(attrs.len(), 4);
        assert_eq!(int_of(&attrs, 2), 1024 * 1024);
        assert_eq!(int_of(&attrs, 3), 4 * 1024 * 1024);
        assert_eq!(int_of(&attrs, 5), 2048 * 1024);
        assert_eq!(int_of(&attrs, 6), 4 * 2048 * 1024);
        assert!(decoded(&attrs).iter().all(|(v, _, _)| *v == vendor_id::HUAWEI));
    }

    #[test]
    fn test_rates_clamp_to_i32_max() {
        let profile = RateProfile {
            up_rate: u64::MAX,
            down_rate: 1_000_000,
        };
        let attrs = H3cResponseBuilder.build(&profile).unwrap();
        assert_eq!(int_of(&attrs, 2), i32::MAX as u32);
        assert_eq!(int_of(&attrs, 1), i32::MAX as u32);
        // 1_000_000 * 1024 fits, four times it does not
        assert_eq!(int_of(&attrs, 5), 1_024_000_000);
        assert_eq!(int_of(&attrs, 4), i32::MAX as u32);

        let attrs = IkuaiResponseBuilder
            .build(&RateProfile {
                up_rate: 300_000,
                down_rate: 1,
            })
            .unwrap();
        assert_eq!(int_of(&attrs, 1), i32::MAX as u32);
        assert_eq!(int_of(&attrs, 2), 8192);
    }

    #[test]
    fn test_zte_average_only() {
        let attrs = ZteResponseBuilder
            .build(&RateProfile {
                up_rate: 1,
                down_rate: 2,
            })
            .unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(int_of(&attrs, 89), 1024);
        assert_eq!(int_of(&attrs, 83), 2048);
    }

    #[test]
    fn test_mikrotik_rate_limit_string() {
        let attrs = MikrotikResponseBuilder
            .build(&RateProfile {
                up_rate: 512,
                down_rate: 2048,
            })
            .unwrap();
        assert_eq!(
            decoded(&attrs),
            vec![(vendor_id::MIKROTIK, 8, b"512k/2048k".to_vec())]
        );
    }

    #[test]
    fn test_default_builder_is_empty() {
        assert!(DefaultResponseBuilder
            .build(&RateProfile::default())
            .unwrap()
            .is_empty());
    }
}
