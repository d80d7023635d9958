use serde::{Deserialize, Serialize};

use crate::flow::{FlowOutcome, FlowState};

pub mod confirmation;

pub use confirmation::{
    ConfirmationRecord, ConfirmationRequest, EventType, ResolvedIdentity,
    CONFIRMATION_RECORD_KEY, UNSPECIFIED_EMAIL,
};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Redirect parameters as seen by the browser
///
/// The fragment never reaches the server on its own, so the confirmation page
/// posts both parts back verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmPayload {
    pub query: String,
    pub fragment: String,
}

/// What the confirmation page renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmView {
    pub state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ConfirmationRecord>,
}

impl ConfirmView {
    #[must_use]
    pub fn from_outcome(outcome: &FlowOutcome, record: Option<ConfirmationRecord>) -> Self {
        match outcome {
            FlowOutcome::Success(identity) => Self {
                state: FlowState::Success,
                email: Some(identity.email.clone()),
                message: None,
                record,
            },
            FlowOutcome::Error(err) => Self {
                state: FlowState::Error,
                email: None,
                message: Some(err.user_message()),
                record: None,
            },
        }
    }
}

/// Registration form as submitted by the browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub company_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResendPayload {
    pub email: String,
}

/// Result of a registration or resend request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    /// True when the user must click the emailed link before signing in
    pub confirmation_sent: bool,
    pub email: String,
    pub message: String,
}

/// Whether the caller holds a live provider session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<String>,
}

impl SessionStatus {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            email: None,
            email_confirmed_at: None,
        }
    }
}
