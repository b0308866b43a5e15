//! Top-level request handlers wired to the transport

pub mod acct;
pub mod auth;

pub use acct::AcctService;
pub use auth::AuthService;

use crate::server::ResponseWriter;
use radius_wire::{sign_response, Packet};
use tracing::warn;

/// Sign `reply` against the request authenticator and send it
pub(crate) async fn sign_and_write(
    writer: &dyn ResponseWriter,
    mut reply: Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) {
    if let Err(e) = sign_response(&mut reply, request_authenticator, secret) {
        warn!(request_id = reply.identifier, error = %e, "failed to sign response");
        return;
    }
    if let Err(e) = writer.write(&reply).await {
        warn!(request_id = reply.identifier, error = %e, "failed to send response");
    }
}
