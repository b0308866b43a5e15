macro_rules! attribute_types {
    ($( $(#[$meta:meta])* $variant:ident = $value:literal => $name:literal, )+) => {
        /// Standard RADIUS attribute types (RFC 2865, 2866, 2869, 3162, 3579, 4818)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum AttributeType {
            $( $(#[$meta])* $variant = $value, )+
        }

        impl AttributeType {
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some(AttributeType::$variant), )+
                    _ => None,
                }
            }

            /// Dictionary name
            pub fn name(self) -> &'static str {
                match self {
                    $( AttributeType::$variant => $name, )+
                }
            }
        }
    };
}

attribute_types! {
    UserName = 1 => "User-Name",
    UserPassword = 2 => "User-Password",
    ChapPassword = 3 => "CHAP-Password",
    NasIpAddress = 4 => "NAS-IP-Address",
    NasPort = 5 => "NAS-Port",
    ServiceType = 6 => "Service-Type",
    FramedProtocol = 7 => "Framed-Protocol",
    FramedIpAddress = 8 => "Framed-IP-Address",
    FramedIpNetmask = 9 => "Framed-IP-Netmask",
    FramedRouting = 10 => "Framed-Routing",
    FilterId = 11 => "Filter-Id",
    FramedMtu = 12 => "Framed-MTU",
    FramedCompression = 13 => "Framed-Compression",
    LoginIpHost = 14 => "Login-IP-Host",
    LoginService = 15 => "Login-Service",
    LoginTcpPort = 16 => "Login-TCP-Port",
    ReplyMessage = 18 => "Reply-Message",
    CallbackNumber = 19 => "Callback-Number",
    CallbackId = 20 => "Callback-Id",
    FramedRoute = 22 => "Framed-Route",
    State = 24 => "State",
    Class = 25 => "Class",
    VendorSpecific = 26 => "Vendor-Specific",
    SessionTimeout = 27 => "Session-Timeout",
    IdleTimeout = 28 => "Idle-Timeout",
    TerminationAction = 29 => "Termination-Action",
    CalledStationId = 30 => "Called-Station-Id",
    CallingStationId = 31 => "Calling-Station-Id",
    NasIdentifier = 32 => "NAS-Identifier",
    ProxyState = 33 => "Proxy-State",
    AcctStatusType = 40 => "Acct-Status-Type",
    AcctDelayTime = 41 => "Acct-Delay-Time",
    AcctInputOctets = 42 => "Acct-Input-Octets",
    AcctOutputOctets = 43 => "Acct-Output-Octets",
    AcctSessionId = 44 => "Acct-Session-Id",
    AcctAuthentic = 45 => "Acct-Authentic",
    AcctSessionTime = 46 => "Acct-Session-Time",
    AcctInputPackets = 47 => "Acct-Input-Packets",
    AcctOutputPackets = 48 => "Acct-Output-Packets",
    AcctTerminateCause = 49 => "Acct-Terminate-Cause",
    AcctMultiSessionId = 50 => "Acct-Multi-Session-Id",
    AcctLinkCount = 51 => "Acct-Link-Count",
    /// High 32 bits of the 64-bit input octet counter
    AcctInputGigawords = 52 => "Acct-Input-Gigawords",
    /// High 32 bits of the 64-bit output octet counter
    AcctOutputGigawords = 53 => "Acct-Output-Gigawords",
    EventTimestamp = 55 => "Event-Timestamp",
    ChapChallenge = 60 => "CHAP-Challenge",
    NasPortType = 61 => "NAS-Port-Type",
    PortLimit = 62 => "Port-Limit",
    ConnectInfo = 77 => "Connect-Info",
    EapMessage = 79 => "EAP-Message",
    MessageAuthenticator = 80 => "Message-Authenticator",
    AcctInterimInterval = 85 => "Acct-Interim-Interval",
    /// Text port identifier; BRAS vendors encode VLAN ids in it
    NasPortId = 87 => "NAS-Port-Id",
    FramedPool = 88 => "Framed-Pool",
    FramedIpv6Prefix = 97 => "Framed-IPv6-Prefix",
    DelegatedIpv6Prefix = 123 => "Delegated-IPv6-Prefix",
}

impl AttributeType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_known_and_unknown() {
        assert_eq!(AttributeType::from_u8(87), Some(AttributeType::NasPortId));
        assert_eq!(AttributeType::from_u8(123), Some(AttributeType::DelegatedIpv6Prefix));
        assert_eq!(AttributeType::from_u8(17), None);
    }

    #[test]
    fn test_name() {
        assert_eq!(AttributeType::AcctInterimInterval.name(), "Acct-Interim-Interval");
        assert_eq!(AttributeType::UserName.to_string(), "User-Name");
    }
}
