use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    HttpRequest,
};
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::provider::Session;
use crate::settings::{ConfirmrsSettings, MAX_SESSION_DURATION_HOURS};
use crate::utils::crypto::{decrypt_data, derive_encryption_key, encrypt_data, ENCRYPTION_KEY_SIZE};

/// Cookie carrying the encrypted provider session between page loads
pub const SESSION_COOKIE_NAME: &str = "confirmrs_session";

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Duration::hours(24),
        }
    }
}

/// Factory for the encrypted session cookie
///
/// The provider session established during a confirmation is sealed with
/// AES-256-GCM so that a later page load can fall back to it.
#[derive(Clone)]
pub struct SessionCookieFactory {
    encryption_key: [u8; ENCRYPTION_KEY_SIZE],
    cookie_secure: bool,
    session_duration_hours: u64,
}

impl SessionCookieFactory {
    /// Durations above [`MAX_SESSION_DURATION_HOURS`] are clamped to it
    #[must_use]
    pub fn new(
        encryption_key: [u8; ENCRYPTION_KEY_SIZE],
        cookie_secure: bool,
        session_duration_hours: u64,
    ) -> Self {
        Self {
            encryption_key,
            cookie_secure,
            session_duration_hours: session_duration_hours.min(MAX_SESSION_DURATION_HOURS),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ConfirmrsSettings) -> Self {
        Self::new(
            derive_encryption_key(settings.session.session_secret.as_bytes()),
            settings.cookies.secure,
            settings.session.session_duration_hours,
        )
    }

    /// Create a cookie holding `data` encrypted
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        options: CookieOptions,
    ) -> Result<Cookie<'static>> {
        let value = encrypt_data(data, &self.encryption_key)?;

        Ok(Cookie::build(name.to_owned(), value)
            .http_only(options.http_only)
            .secure(self.cookie_secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the session cookie for a provider session
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_session_cookie(&self, session: &Session) -> Result<Cookie<'static>> {
        self.create_cookie(
            SESSION_COOKIE_NAME,
            session,
            CookieOptions {
                max_age: Duration::hours(i64::try_from(self.session_duration_hours).unwrap_or(24)),
                ..Default::default()
            },
        )
    }

    /// Create an expired cookie to clear the session
    #[must_use]
    pub fn create_expired_cookie(&self) -> Cookie<'static> {
        create_expired_cookie(SESSION_COOKIE_NAME, self.cookie_secure)
    }

    /// Read the provider session from the request, if any
    ///
    /// An undecryptable cookie (rotated secret, tampering) counts as no session.
    #[must_use]
    pub fn session_from_request(&self, req: &HttpRequest) -> Option<Session> {
        self.decrypt_cookie(req, SESSION_COOKIE_NAME)
    }

    fn decrypt_cookie<T: DeserializeOwned>(&self, req: &HttpRequest, name: &str) -> Option<T> {
        let cookie = req.cookie(name)?;
        if cookie.value().is_empty() {
            return None;
        }

        match decrypt_data::<T>(cookie.value(), &self.encryption_key) {
            Ok(data) => Some(data),
            Err(e) => {
                log::debug!("Ignoring undecryptable {name} cookie: {e}");
                None
            }
        }
    }
}

/// Create an expired cookie to clear a specific cookie
#[must_use]
pub fn create_expired_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(-1))
        .finish()
}
