#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the confirmrs application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analytics;
pub mod flow;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod session;
pub mod settings;
pub mod storage;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use flow::{ConfirmationFlow, FlowOutcome, FlowState};
pub use handlers::configure_services;
pub use provider::{IdentityProvider, ScopedProvider, SupabaseClient};
pub use settings::ConfirmrsSettings;
