//! Confirmation data types
//!
//! These are the values that flow through a single confirmation attempt: the
//! request parsed from the provider's redirect, the identity resolved from the
//! provider, and the record persisted once the attempt succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage key under which the latest confirmation record is kept
pub const CONFIRMATION_RECORD_KEY: &str = "confirmation-record";

/// Email placeholder used when the provider did not report an address
pub const UNSPECIFIED_EMAIL: &str = "unspecified";

/// The kind of out-of-band action the provider is redirecting back from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Signup,
    EmailConfirmation,
    Recovery,
    Unknown,
}

impl EventType {
    /// Map the raw `type` redirect parameter onto an event type
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "signup" => Self::Signup,
            "email_confirmation" => Self::EmailConfirmation,
            "recovery" => Self::Recovery,
            _ => Self::Unknown,
        }
    }

    /// Whether this event requires a user lookup against the provider
    #[must_use]
    pub fn is_recognized(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::EmailConfirmation => "email_confirmation",
            Self::Recovery => "recovery",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters handed back by the identity provider after an email link click
///
/// Built once per page load from the query string and URL fragment; see
/// [`crate::flow::params`] for the merge rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub event_type: Option<EventType>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl ConfirmationRequest {
    /// Both tokens needed to establish a provider session are present
    #[must_use]
    pub fn has_session_tokens(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }
}

/// Identity confirmed by the provider for the current attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub user_id: String,
    pub email: String,
    pub session_established: bool,
}

/// Durable marker that a confirmation attempt completed successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub timestamp: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub confirmed: bool,
}

impl ConfirmationRecord {
    /// Build the record for a resolved identity at the given instant
    #[must_use]
    pub fn for_identity(identity: &ResolvedIdentity, at: DateTime<Utc>) -> Self {
        let email = if identity.email.trim().is_empty() {
            UNSPECIFIED_EMAIL.to_string()
        } else {
            identity.email.clone()
        };

        Self {
            timestamp: at.to_rfc3339(),
            email,
            user_id: Some(identity.user_id.clone()),
            confirmed: true,
        }
    }
}
