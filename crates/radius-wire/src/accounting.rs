//! Accounting attribute values (RFC 2866)

use std::fmt;

/// Acct-Status-Type values (RFC 2866 Section 5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AcctStatusType {
    Start = 1,
    Stop = 2,
    InterimUpdate = 3,
    /// NAS is ready; all of its previous sessions are gone
    AccountingOn = 7,
    /// NAS is shutting down
    AccountingOff = 8,
}

impl AcctStatusType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(AcctStatusType::Start),
            2 => Some(AcctStatusType::Stop),
            3 => Some(AcctStatusType::InterimUpdate),
            7 => Some(AcctStatusType::AccountingOn),
            8 => Some(AcctStatusType::AccountingOff),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_nas_status(self) -> bool {
        matches!(
            self,
            AcctStatusType::AccountingOn | AcctStatusType::AccountingOff
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            AcctStatusType::Start => "Start",
            AcctStatusType::Stop => "Stop",
            AcctStatusType::InterimUpdate => "Interim-Update",
            AcctStatusType::AccountingOn => "Accounting-On",
            AcctStatusType::AccountingOff => "Accounting-Off",
        }
    }
}

impl fmt::Display for AcctStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acct-Terminate-Cause values (RFC 2866 Section 5.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AcctTerminateCause {
    UserRequest = 1,
    LostCarrier = 2,
    LostService = 3,
    IdleTimeout = 4,
    SessionTimeout = 5,
    AdminReset = 6,
    AdminReboot = 7,
    PortError = 8,
    NasError = 9,
    NasRequest = 10,
    NasReboot = 11,
    PortUnneeded = 12,
    PortPreempted = 13,
    PortSuspended = 14,
    ServiceUnavailable = 15,
    Callback = 16,
    UserError = 17,
    HostRequest = 18,
}

impl AcctTerminateCause {
    const ALL: [AcctTerminateCause; 18] = [
        AcctTerminateCause::UserRequest,
        AcctTerminateCause::LostCarrier,
        AcctTerminateCause::LostService,
        AcctTerminateCause::IdleTimeout,
        AcctTerminateCause::SessionTimeout,
        AcctTerminateCause::AdminReset,
        AcctTerminateCause::AdminReboot,
        AcctTerminateCause::PortError,
        AcctTerminateCause::NasError,
        AcctTerminateCause::NasRequest,
        AcctTerminateCause::NasReboot,
        AcctTerminateCause::PortUnneeded,
        AcctTerminateCause::PortPreempted,
        AcctTerminateCause::PortSuspended,
        AcctTerminateCause::ServiceUnavailable,
        AcctTerminateCause::Callback,
        AcctTerminateCause::UserError,
        AcctTerminateCause::HostRequest,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_u32() == value)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acct_status_type_conversion() {
        for status in [
            AcctStatusType::Start,
            AcctStatusType::Stop,
            AcctStatusType::InterimUpdate,
            AcctStatusType::AccountingOn,
            AcctStatusType::AccountingOff,
        ] {
            assert_eq!(AcctStatusType::from_u32(status.as_u32()), Some(status));
        }
        assert_eq!(AcctStatusType::from_u32(99), None);
        assert_eq!(AcctStatusType::InterimUpdate.to_string(), "Interim-Update");
    }

    #[test]
    fn test_acct_status_type_categories() {
        assert!(AcctStatusType::AccountingOff.is_nas_status());
        assert!(!AcctStatusType::Start.is_nas_status());
    }

    #[test]
    fn test_terminate_cause() {
        assert_eq!(AcctTerminateCause::from_u32(4), Some(AcctTerminateCause::IdleTimeout));
        assert_eq!(AcctTerminateCause::from_u32(18), Some(AcctTerminateCause::HostRequest));
        assert_eq!(AcctTerminateCause::from_u32(0), None);
    }
}
