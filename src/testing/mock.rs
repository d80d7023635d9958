//! Mock objects and fake implementations for testing
//!
//! [`MockIdentityProvider`] answers from canned responses and records every
//! call it receives. Clones and scoped handles share the canned responses and
//! the call log; each scoped handle holds its own session, like the real client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::provider::{
    IdentityProvider, ProfileRecord, ProviderError, ResendType, ScopedProvider, Session,
    SignUpOutcome, SignUpRequest, User,
};

/// A call received by the mock provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    GetUser(Option<String>),
    SetSession,
    GetSession,
    /// Target table
    Upsert(String),
    Resend(ResendType, String),
    /// Email address
    SignUp(String),
}

#[derive(Debug, Clone, Default)]
struct CannedResponses {
    user: Option<User>,
    user_error: Option<ProviderError>,
    set_session_error: Option<ProviderError>,
    session_error: Option<ProviderError>,
    upsert_error: Option<ProviderError>,
    resend_error: Option<ProviderError>,
    sign_up: Option<Result<SignUpOutcome, ProviderError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
pub struct MockIdentityProvider {
    responses: Arc<CannedResponses>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    session: Arc<Mutex<Option<Session>>>,
    upserts: Arc<Mutex<Vec<ProfileRecord>>>,
}

impl MockIdentityProvider {
    /// Provider that knows no user and holds no session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(mut self, apply: impl FnOnce(&mut CannedResponses)) -> Self {
        apply(Arc::make_mut(&mut self.responses));
        self
    }

    /// User returned by `get_user` and attached to new sessions
    #[must_use]
    pub fn with_user(self, user: User) -> Self {
        self.configure(|r| r.user = Some(user))
    }

    #[must_use]
    pub fn with_user_error(self, err: ProviderError) -> Self {
        self.configure(|r| r.user_error = Some(err))
    }

    #[must_use]
    pub fn with_set_session_error(self, err: ProviderError) -> Self {
        self.configure(|r| r.set_session_error = Some(err))
    }

    #[must_use]
    pub fn with_session_error(self, err: ProviderError) -> Self {
        self.configure(|r| r.session_error = Some(err))
    }

    #[must_use]
    pub fn with_upsert_error(self, err: ProviderError) -> Self {
        self.configure(|r| r.upsert_error = Some(err))
    }

    #[must_use]
    pub fn with_resend_error(self, err: ProviderError) -> Self {
        self.configure(|r| r.resend_error = Some(err))
    }

    #[must_use]
    pub fn with_sign_up(self, outcome: Result<SignUpOutcome, ProviderError>) -> Self {
        self.configure(|r| r.sign_up = Some(outcome))
    }

    /// Session held by this handle from the start
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        *lock(&self.session) = Some(session);
        self
    }

    /// Every call received so far, across clones and scoped handles
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.calls).clone()
    }

    /// Profile rows passed to `upsert`
    #[must_use]
    pub fn upserts(&self) -> Vec<ProfileRecord> {
        lock(&self.upserts).clone()
    }

    fn record(&self, call: ProviderCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<User>, ProviderError> {
        self.record(ProviderCall::GetUser(access_token.map(str::to_string)));
        match &self.responses.user_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.responses.user.clone()),
        }
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ProviderError> {
        self.record(ProviderCall::SetSession);
        if let Some(err) = &self.responses.set_session_error {
            return Err(err.clone());
        }

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: None,
            user: self.responses.user.clone(),
        };
        *lock(&self.session) = Some(session.clone());
        Ok(session)
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.record(ProviderCall::GetSession);
        match &self.responses.session_error {
            Some(err) => Err(err.clone()),
            None => Ok(lock(&self.session).clone()),
        }
    }

    async fn upsert(
        &self,
        table: &str,
        record: &ProfileRecord,
        _conflict_key: &str,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Upsert(table.to_string()));
        if let Some(err) = &self.responses.upsert_error {
            return Err(err.clone());
        }
        lock(&self.upserts).push(record.clone());
        Ok(())
    }

    async fn resend(&self, kind: ResendType, email: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::Resend(kind, email.to_string()));
        match &self.responses.resend_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, ProviderError> {
        self.record(ProviderCall::SignUp(request.email.clone()));
        match &self.responses.sign_up {
            Some(Ok(SignUpOutcome::SessionCreated(session))) => {
                *lock(&self.session) = Some(session.clone());
                Ok(SignUpOutcome::SessionCreated(session.clone()))
            }
            Some(outcome) => outcome.clone(),
            None => Ok(SignUpOutcome::ConfirmationSent(User {
                id: "new-user".to_string(),
                email: Some(request.email.clone()),
                email_confirmed_at: None,
                user_metadata: serde_json::to_value(&request.metadata)
                    .unwrap_or(serde_json::Value::Null),
            })),
        }
    }

    fn current_session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }
}

impl ScopedProvider for MockIdentityProvider {
    fn scoped(&self, session: Option<Session>) -> Self {
        Self {
            responses: Arc::clone(&self.responses),
            calls: Arc::clone(&self.calls),
            session: Arc::new(Mutex::new(session)),
            upserts: Arc::clone(&self.upserts),
        }
    }
}

/// Analytics sink that keeps every event it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingAnalyticsSink {
    events: Arc<Mutex<Vec<AnalyticsEvent>>>,
}

impl RecordingAnalyticsSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingAnalyticsSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn emit(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}
