//! Credential checks for PAP, CHAP and MS-CHAPv2 requests

mod chap;
mod mschapv2;
mod pap;

pub use chap::ChapValidator;
pub use mschapv2::MsChapV2Validator;
pub use pap::PapValidator;
pub(crate) use mschapv2::{mppe_attributes, mschap_username};
