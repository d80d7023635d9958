//! Sign-up form validation and provider error wording

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::RegistrationForm;
use crate::provider::{ProviderError, SignUpMetadata, SignUpRequest};

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub const ALREADY_REGISTERED_MESSAGE: &str =
    "This email is already registered. Do you want to sign in?";
pub const PASSWORD_MESSAGE: &str = "Password must be at least 6 characters";
pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords do not match";
pub const SIGNUP_FALLBACK_MESSAGE: &str = "Could not register user";
pub const RESEND_FAILED_MESSAGE: &str = "Could not resend the email. Please try again later.";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The form was rejected before reaching the provider
    #[error("{0}")]
    Validation(&'static str),

    /// The provider refused the sign-up
    #[error("{message}")]
    Provider {
        message: &'static str,
        #[source]
        source: ProviderError,
    },
}

impl RegistrationError {
    #[must_use]
    pub fn from_provider(source: ProviderError) -> Self {
        Self::Provider {
            message: friendly_signup_error(&source),
            source,
        }
    }
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Check the form and turn it into a sign-up request
///
/// # Errors
///
/// Returns `RegistrationError::Validation` naming the first rule the form breaks
pub fn validate_registration(
    form: &RegistrationForm,
    email_redirect_to: Option<String>,
) -> Result<SignUpRequest, RegistrationError> {
    let email = form.email.trim();
    if !is_valid_email(email) {
        return Err(RegistrationError::Validation(EMAIL_MESSAGE));
    }
    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(RegistrationError::Validation(PASSWORD_MESSAGE));
    }
    if form.password != form.password_confirm {
        return Err(RegistrationError::Validation(PASSWORD_MISMATCH_MESSAGE));
    }

    Ok(SignUpRequest {
        email: email.to_string(),
        password: form.password.clone(),
        metadata: SignUpMetadata {
            full_name: form.full_name.trim().to_string(),
            company_name: form.company_name.trim().to_string(),
            phone: form.phone.trim().to_string(),
        },
        email_redirect_to,
    })
}

/// Map a provider sign-up failure to a message fit for the form
#[must_use]
pub fn friendly_signup_error(err: &ProviderError) -> &'static str {
    let message = err.message().to_lowercase();
    if message.contains("already registered") {
        ALREADY_REGISTERED_MESSAGE
    } else if message.contains("password") {
        PASSWORD_MESSAGE
    } else if message.contains("email") {
        EMAIL_MESSAGE
    } else {
        SIGNUP_FALLBACK_MESSAGE
    }
}
