// Centralized logging for flow milestones; tokens are never passed in here
use log::{debug, info, warn};

use crate::flow::ConfirmationError;
use crate::models::ConfirmationRecord;
use crate::settings::ConfirmrsSettings;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log the outcome of a failed confirmation attempt
    pub fn log_confirmation_failed(err: &ConfirmationError) {
        match err {
            ConfirmationError::Redirect { code, .. } => {
                info!("❌ Provider redirected with error code {code}");
            }
            ConfirmationError::Provider(source) => {
                warn!(
                    "❌ User lookup failed ({}, status {:?}): {source}",
                    source.kind(),
                    source.status()
                );
            }
            ConfirmationError::NotFound { message, cause } => match cause {
                Some(cause) => info!("❌ {message} (session lookup failed: {cause})"),
                None => info!("❌ {message}"),
            },
        }
        debug!("Confirmation error kind: {}", err.kind().as_str());
    }

    /// Log a stored confirmation record
    pub fn log_confirmation_recorded(record: &ConfirmationRecord) {
        info!(
            "✅ Registration confirmed for {} at {}",
            record.email, record.timestamp
        );
    }

    /// Log provider configuration at startup
    pub fn log_provider_configured(settings: &ConfirmrsSettings) {
        info!(
            "🔧 Identity provider at {} (timeout {}s)",
            settings.provider.url, settings.provider.request_timeout_secs
        );
        if settings.profile.enabled {
            info!(
                "🔧 Profile sync to table '{}' on conflict '{}'",
                settings.profile.table, settings.profile.conflict_key
            );
        } else {
            info!("⏭️  Profile sync disabled");
        }
    }

    /// Log a sign-up attempt result
    pub fn log_sign_up(email: &str, confirmation_sent: bool) {
        if confirmation_sent {
            info!("📧 Confirmation email sent to {email}");
        } else {
            info!("✅ Account {email} created and signed in");
        }
    }
}
