//! Identity provider error types
//!
//! Every failure coming back from the provider is classified exactly once,
//! here, so callers match on [`ProviderErrorKind`] instead of inspecting
//! status codes or message strings.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// PostgREST / Postgres codes meaning the target relation does not exist
const MISSING_RELATION_CODES: &[&str] = &["42P01", "PGRST205"];

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Client is not usable (missing URL or key)
    Configuration,
    /// Connection failed before a response was received
    Network,
    /// The request exceeded the configured timeout
    Timeout,
    /// Token rejected, expired or lacking permission
    Unauthorized,
    /// The requested user, table or row does not exist
    NotFound,
    /// No session available to authorize the call
    SessionMissing,
    /// Provider throttled the request
    RateLimited,
    /// Provider rejected the payload
    InvalidRequest,
    /// Any other non-success response
    Api,
    /// Response body could not be decoded
    Decode,
}

impl ProviderErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::SessionMissing => "session_missing",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::Api => "api",
            Self::Decode => "decode",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified identity provider failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    status: Option<u16>,
}

/// Union of the error body shapes returned by GoTrue and PostgREST
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    code: Option<serde_json::Value>,
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ApiErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            _ => self.error_code.clone(),
        }
    }

    fn message(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
    }
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Error for calls that need a session when none is held
    #[must_use]
    pub fn session_missing() -> Self {
        Self::new(ProviderErrorKind::SessionMissing, "Auth session missing")
    }

    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    /// Classify a non-success HTTP response from the provider
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed.code();
        let message = parsed.message().unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Provider responded with HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });

        let missing_relation = code
            .as_deref()
            .is_some_and(|code| MISSING_RELATION_CODES.contains(&code));

        let kind = if missing_relation {
            ProviderErrorKind::NotFound
        } else {
            match status {
                401 | 403 => ProviderErrorKind::Unauthorized,
                404 => ProviderErrorKind::NotFound,
                408 | 504 => ProviderErrorKind::Timeout,
                429 => ProviderErrorKind::RateLimited,
                400 | 409 | 422 => ProviderErrorKind::InvalidRequest,
                _ => ProviderErrorKind::Api,
            }
        };

        Self::new(kind, message).with_status(status)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else if err.is_decode() {
            ProviderErrorKind::Decode
        } else if err.is_builder() {
            ProviderErrorKind::Configuration
        } else {
            ProviderErrorKind::Network
        };

        let error = Self::new(kind, err.to_string());
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(
            ProviderErrorKind::Decode,
            format!("Invalid provider response: {err}"),
        )
    }
}
