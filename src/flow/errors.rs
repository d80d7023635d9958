use thiserror::Error;

use crate::provider::ProviderError;

/// Shown when the provider reports an error without describing it
pub const REDIRECT_FALLBACK_MESSAGE: &str = "verification error";

/// Shown when a recognised confirmation resolves to no user
pub const USER_NOT_FOUND_MESSAGE: &str = "user not found";

/// Shown when the session fallback finds nothing
pub const SESSION_UNAVAILABLE_MESSAGE: &str =
    "confirmation could not be verified; link may have expired.";

/// Coarse error category, for logs and diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationErrorKind {
    Redirect,
    Provider,
    NotFound,
}

impl ConfirmationErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Provider => "provider",
            Self::NotFound => "not_found",
        }
    }
}

/// Why a confirmation attempt ended in the error state
///
/// Every variant renders the same way; the distinction only matters for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    /// The provider encoded an error in the redirect itself
    #[error("provider redirected with error {code}")]
    Redirect {
        code: String,
        description: Option<String>,
    },
    /// The user lookup call failed
    #[error("could not verify user: {0}")]
    Provider(#[source] ProviderError),
    /// Nothing resolvable although no error was reported
    #[error("{message}")]
    NotFound {
        message: &'static str,
        #[source]
        cause: Option<ProviderError>,
    },
}

impl ConfirmationError {
    #[must_use]
    pub fn kind(&self) -> ConfirmationErrorKind {
        match self {
            Self::Redirect { .. } => ConfirmationErrorKind::Redirect,
            Self::Provider(_) => ConfirmationErrorKind::Provider,
            Self::NotFound { .. } => ConfirmationErrorKind::NotFound,
        }
    }

    #[must_use]
    pub fn user_not_found() -> Self {
        Self::NotFound {
            message: USER_NOT_FOUND_MESSAGE,
            cause: None,
        }
    }

    #[must_use]
    pub fn session_unavailable(cause: Option<ProviderError>) -> Self {
        Self::NotFound {
            message: SESSION_UNAVAILABLE_MESSAGE,
            cause,
        }
    }

    /// The most specific message available, as rendered to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Redirect { description, .. } => description
                .clone()
                .unwrap_or_else(|| REDIRECT_FALLBACK_MESSAGE.to_string()),
            Self::Provider(_) | Self::NotFound { .. } => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;

    #[test]
    fn test_redirect_message_prefers_description() {
        let err = ConfirmationError::Redirect {
            code: "access_denied".to_string(),
            description: Some("Email link is invalid or has expired".to_string()),
        };
        assert_eq!(err.user_message(), "Email link is invalid or has expired");
        assert_eq!(err.kind(), ConfirmationErrorKind::Redirect);

        let err = ConfirmationError::Redirect {
            code: "access_denied".to_string(),
            description: None,
        };
        assert_eq!(err.user_message(), REDIRECT_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_provider_message_wraps_detail() {
        let err = ConfirmationError::Provider(ProviderError::new(
            ProviderErrorKind::Unauthorized,
            "invalid JWT",
        ));
        assert_eq!(err.user_message(), "could not verify user: invalid JWT");
        assert_eq!(err.kind().as_str(), "provider");
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(
            ConfirmationError::user_not_found().user_message(),
            USER_NOT_FOUND_MESSAGE
        );

        let cause = ProviderError::new(ProviderErrorKind::Network, "connection refused");
        let err = ConfirmationError::session_unavailable(Some(cause));
        assert_eq!(err.user_message(), SESSION_UNAVAILABLE_MESSAGE);
        assert_eq!(err.kind(), ConfirmationErrorKind::NotFound);
    }
}
