//! Identity provider abstraction
//!
//! The confirmation flow only ever talks to the hosted identity service through
//! [`IdentityProvider`]. [`SupabaseClient`] is the production implementation;
//! tests substitute `testing::mock::MockIdentityProvider`.

pub mod errors;
pub mod supabase;

pub use errors::{ProviderError, ProviderErrorKind};
pub use supabase::{SupabaseClient, SupabaseConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before `expires_at` at which a session is already treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 10;

/// A user account as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub user_metadata: serde_json::Value,
}

/// A provider session (token pair plus the user it belongs to)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// Whether the access token should be refreshed before use
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.timestamp() + EXPIRY_MARGIN_SECS)
    }
}

/// Row written to the application's profile table after a confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub email: Option<String>,
    pub email_confirmed: bool,
    pub confirmation_timestamp: String,
    pub last_access: String,
}

impl ProfileRecord {
    /// Profile row marking `user` as confirmed at `now`
    #[must_use]
    pub fn confirmed(user: &User, now: DateTime<Utc>) -> Self {
        let now = now.to_rfc3339();
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            email_confirmed: true,
            confirmation_timestamp: now.clone(),
            last_access: now,
        }
    }
}

/// Which email the provider should send again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResendType {
    Signup,
    EmailChange,
}

/// Extra profile data attached to a new account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub company_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub metadata: SignUpMetadata,
    /// Where the confirmation link should send the user
    pub email_redirect_to: Option<String>,
}

/// What the provider did with a sign-up
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// Account created, confirmation email sent
    ConfirmationSent(User),
    /// Account created and signed in immediately (email confirmation disabled)
    SessionCreated(Session),
}

/// Operations the confirmation and registration flows need from the provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the user owning `access_token`, or the held session's user when
    /// no token is given. `Ok(None)` means the provider knows no such user.
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<User>, ProviderError>;

    /// Establish (and hold) a session from a token pair
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ProviderError>;

    /// Return the held session, refreshing it if it has expired
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Insert or merge a profile row keyed on `conflict_key`
    async fn upsert(
        &self,
        table: &str,
        record: &ProfileRecord,
        conflict_key: &str,
    ) -> Result<(), ProviderError>;

    async fn resend(&self, kind: ResendType, email: &str) -> Result<(), ProviderError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, ProviderError>;

    /// Session currently held by this handle, without contacting the provider
    fn current_session(&self) -> Option<Session>;
}

/// A provider that can hand out request-scoped handles
///
/// Scoped handles share the underlying connection pool but own their session,
/// so one request's session never leaks into another.
pub trait ScopedProvider: IdentityProvider + Clone + 'static {
    #[must_use]
    fn scoped(&self, session: Option<Session>) -> Self;
}
