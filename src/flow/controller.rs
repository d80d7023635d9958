//! Confirmation flow controller
//!
//! One [`ConfirmationFlow::resolve`] call corresponds to one page load of the
//! confirmation page. It starts in [`FlowState::Loading`] and always ends in
//! exactly one of the terminal states; no error escapes it.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::errors::ConfirmationError;
use crate::analytics::{AnalyticsDispatcher, AnalyticsEvent};
use crate::models::{
    ConfirmationRecord, ConfirmationRequest, ResolvedIdentity, CONFIRMATION_RECORD_KEY,
    UNSPECIFIED_EMAIL,
};
use crate::provider::{IdentityProvider, ProfileRecord, Session, User};
use crate::settings::ProfileSettings;
use crate::storage::ConfirmationStore;
use crate::utils::logging::LoggingHelper;

/// Visible state of the confirmation page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    Loading,
    Success,
    Error,
}

/// Terminal result of a confirmation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Success(ResolvedIdentity),
    Error(ConfirmationError),
}

impl FlowOutcome {
    #[must_use]
    pub fn state(&self) -> FlowState {
        match self {
            Self::Success(_) => FlowState::Success,
            Self::Error(_) => FlowState::Error,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        match self {
            Self::Success(identity) => Some(identity),
            Self::Error(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ConfirmationError> {
        match self {
            Self::Success(_) => None,
            Self::Error(err) => Some(err),
        }
    }
}

/// Where the advisory profile row goes, if anywhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSync {
    pub table: String,
    pub conflict_key: String,
}

impl ProfileSync {
    /// `None` when profile sync is disabled
    #[must_use]
    pub fn from_settings(settings: &ProfileSettings) -> Option<Self> {
        settings.enabled.then(|| Self {
            table: settings.table.clone(),
            conflict_key: settings.conflict_key.clone(),
        })
    }
}

impl Default for ProfileSync {
    fn default() -> Self {
        Self {
            table: "profiles".to_string(),
            conflict_key: "id".to_string(),
        }
    }
}

/// Sequences provider calls for one confirmation attempt
pub struct ConfirmationFlow<P: IdentityProvider> {
    provider: P,
    store: Arc<dyn ConfirmationStore>,
    analytics: AnalyticsDispatcher,
    profile_sync: Option<ProfileSync>,
}

impl<P: IdentityProvider> ConfirmationFlow<P> {
    /// Flow with default profile sync and no analytics sinks
    pub fn new(provider: P, store: Arc<dyn ConfirmationStore>) -> Self {
        Self {
            provider,
            store,
            analytics: AnalyticsDispatcher::default(),
            profile_sync: Some(ProfileSync::default()),
        }
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: AnalyticsDispatcher) -> Self {
        self.analytics = analytics;
        self
    }

    #[must_use]
    pub fn with_profile_sync(mut self, profile_sync: Option<ProfileSync>) -> Self {
        self.profile_sync = profile_sync;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run the flow to a terminal state and apply its side effects
    pub async fn resolve(&self, request: &ConfirmationRequest) -> FlowOutcome {
        self.resolve_recorded(request).await.0
    }

    /// Like [`Self::resolve`], also returning the record this attempt wrote
    ///
    /// The record is `None` on error and when the store rejected the write.
    /// Callers should use it rather than reading the shared slot back, since
    /// a concurrent confirmation may have overwritten it in the meantime.
    pub async fn resolve_recorded(
        &self,
        request: &ConfirmationRequest,
    ) -> (FlowOutcome, Option<ConfirmationRecord>) {
        debug!("Confirmation flow entering {:?}", FlowState::Loading);

        let (outcome, record) = match self.classify(request).await {
            Ok(identity) => {
                let record = self.on_success(&identity).await;
                (FlowOutcome::Success(identity), record)
            }
            Err(err) => {
                LoggingHelper::log_confirmation_failed(&err);
                (FlowOutcome::Error(err), None)
            }
        };

        debug!("Confirmation flow finished in {:?}", outcome.state());
        (outcome, record)
    }

    async fn classify(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<ResolvedIdentity, ConfirmationError> {
        if let Some(code) = &request.error_code {
            return Err(ConfirmationError::Redirect {
                code: code.clone(),
                description: request.error_description.clone(),
            });
        }

        match request.event_type {
            Some(event_type) if event_type.is_recognized() => {
                info!("Resolving {event_type} confirmation");
                self.resolve_event(request).await
            }
            _ => self.resolve_from_session().await,
        }
    }

    async fn resolve_event(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<ResolvedIdentity, ConfirmationError> {
        let user = match self.provider.get_user(request.access_token.as_deref()).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(ConfirmationError::user_not_found()),
            Err(err) => return Err(ConfirmationError::Provider(err)),
        };

        if let (Some(access_token), Some(refresh_token)) =
            (&request.access_token, &request.refresh_token)
        {
            if let Err(err) = self.provider.set_session(access_token, refresh_token).await {
                warn!(
                    "Could not establish provider session ({}): {err}",
                    err.kind()
                );
            }
        }

        self.sync_profile(&user).await;

        Ok(identity_for(&user, request.has_session_tokens()))
    }

    async fn resolve_from_session(&self) -> Result<ResolvedIdentity, ConfirmationError> {
        debug!("No confirmation event in redirect, falling back to session lookup");
        match self.provider.get_session().await {
            Ok(Some(Session {
                user: Some(user), ..
            })) => Ok(identity_for(&user, true)),
            Ok(_) => Err(ConfirmationError::session_unavailable(None)),
            Err(err) => Err(ConfirmationError::session_unavailable(Some(err))),
        }
    }

    /// Advisory write to the profile table; never affects the outcome
    async fn sync_profile(&self, user: &User) {
        let Some(sync) = &self.profile_sync else {
            return;
        };

        let record = ProfileRecord::confirmed(user, Utc::now());
        match self
            .provider
            .upsert(&sync.table, &record, &sync.conflict_key)
            .await
        {
            Ok(()) => debug!("Profile row for {} synced to {}", user.id, sync.table),
            Err(err) if err.is_not_found() => {
                debug!("Profile table {} not available, skipping sync: {err}", sync.table);
            }
            Err(err) => warn!("Profile sync to {} failed ({}): {err}", sync.table, err.kind()),
        }
    }

    async fn on_success(&self, identity: &ResolvedIdentity) -> Option<ConfirmationRecord> {
        let record = ConfirmationRecord::for_identity(identity, Utc::now());
        let stored = match self.store.write(CONFIRMATION_RECORD_KEY, &record) {
            Ok(()) => {
                LoggingHelper::log_confirmation_recorded(&record);
                Some(record)
            }
            Err(err) => {
                error!("Failed to persist confirmation record: {err}");
                None
            }
        };

        self.analytics
            .emit(&AnalyticsEvent::registration_confirmed(&identity.user_id))
            .await;
        stored
    }
}

fn identity_for(user: &User, session_established: bool) -> ResolvedIdentity {
    ResolvedIdentity {
        user_id: user.id.clone(),
        email: user
            .email
            .clone()
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| UNSPECIFIED_EMAIL.to_string()),
        session_established,
    }
}
