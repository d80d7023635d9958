//! Registration confirmation flow
//!
//! - [`params`] turns the provider's redirect into a `ConfirmationRequest`
//! - [`controller`] resolves the request against the identity provider
//! - [`errors`] holds the failure taxonomy and user-facing messages

pub mod controller;
pub mod errors;
pub mod params;

pub use controller::{ConfirmationFlow, FlowOutcome, FlowState, ProfileSync};
pub use errors::{ConfirmationError, ConfirmationErrorKind};
pub use params::RedirectParams;
