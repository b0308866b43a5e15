//! Extension points of the engine and their built-in implementations
//!
//! Every behaviour that differs between deployments sits behind one of the
//! traits below and is looked up through the
//! [`PluginRegistry`](crate::registry::PluginRegistry).

pub mod accounting;
pub mod checkers;
pub mod enhancers;
pub mod guards;
pub mod validators;
pub mod vendors;

use crate::error::AuthError;
use crate::model::User;
use crate::pipeline::AuthRequestContext;
use async_trait::async_trait;
use radius_wire::{Attribute, Packet, PacketError};

/// Verifies the credential carried in the request.
///
/// Validators are tried in registration order; the first whose
/// `can_handle` accepts the request decides.
pub trait PasswordValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, ctx: &AuthRequestContext) -> bool;

    /// `password` is the stored clear-text password of the user. Methods
    /// that answer with key material push it to `ctx.accept_attributes`.
    fn validate(&self, ctx: &mut AuthRequestContext, password: &str) -> Result<(), AuthError>;
}

/// Account policy evaluated after the credential check, lowest order first
#[async_trait]
pub trait PolicyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    fn order(&self) -> i32;

    async fn check(&self, ctx: &AuthRequestContext, user: &User) -> Result<(), AuthError>;
}

/// Adds attributes to an Access-Accept
#[async_trait]
pub trait ResponseEnhancer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn enhance(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError>;
}

/// What a guard wants done with a failed authentication
#[derive(Debug)]
pub enum GuardDecision {
    /// Keep the error as is
    Pass(AuthError),
    /// Continue with a different error
    Replace(AuthError),
    /// Send nothing at all
    Suppress,
}

/// Sees every authentication error before the reject goes out
pub trait AuthGuard: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_error(&self, ctx: &AuthRequestContext, err: AuthError) -> GuardDecision;
}

/// Vendor-specific facts pulled out of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorRequest {
    /// `aa:bb:cc:dd:ee:ff`, empty when unknown
    pub mac_addr: String,
    pub vlan_id1: u32,
    pub vlan_id2: u32,
}

pub trait VendorParser: Send + Sync {
    fn vendor_code(&self) -> &str;

    fn parse(&self, packet: &Packet) -> VendorRequest;
}

/// Bandwidth of a subscriber in KB/s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateProfile {
    pub up_rate: u64,
    pub down_rate: u64,
}

/// Encodes a [`RateProfile`] as the vendor's reply attributes
pub trait VendorResponseBuilder: Send + Sync {
    fn vendor_code(&self) -> &str;

    fn build(&self, profile: &RateProfile) -> Result<Vec<Attribute>, PacketError>;
}

pub use accounting::{AccountingContext, AccountingError, AccountingHandler};
