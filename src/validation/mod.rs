//! Validation Module
//!
//! - [`registration`] - Sign-up form checks and provider error wording

pub mod registration;

pub use registration::{
    friendly_signup_error, is_valid_email, validate_registration, RegistrationError,
    RESEND_FAILED_MESSAGE,
};
