//! Test fixtures providing pre-built test objects

use chrono::{Duration, Utc};

use crate::provider::{Session, User};
use crate::session::SessionCookieFactory;
use crate::settings::{ConfirmrsSettings, ProviderSettings};

use super::constants::{
    TEST_ACCESS_TOKEN, TEST_EMAIL, TEST_REFRESH_TOKEN, TEST_SESSION_SECRET, TEST_USER_ID,
    TEST_USER_NAME,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// A confirmed user with profile metadata
    #[must_use]
    pub fn user() -> User {
        User {
            id: TEST_USER_ID.to_string(),
            email: Some(TEST_EMAIL.to_string()),
            email_confirmed_at: Some(Utc::now().to_rfc3339()),
            user_metadata: serde_json::json!({
                "full_name": TEST_USER_NAME,
                "company_name": "Test Company",
                "phone": "",
            }),
        }
    }

    /// A live session for [`TestFixtures::user`]
    #[must_use]
    pub fn session() -> Session {
        Session {
            access_token: TEST_ACCESS_TOKEN.to_string(),
            refresh_token: TEST_REFRESH_TOKEN.to_string(),
            expires_at: Some((Utc::now() + Duration::hours(1)).timestamp()),
            user: Some(Self::user()),
        }
    }

    /// Settings suitable for tests: fixed secret, insecure cookies, temp-free defaults
    #[must_use]
    pub fn settings() -> ConfirmrsSettings {
        let mut settings = ConfirmrsSettings::default();
        settings.session.session_secret = TEST_SESSION_SECRET.to_string();
        settings.cookies.secure = false;
        settings.application.redirect_base_url = "https://app.example.com".to_string();
        settings.provider = ProviderSettings {
            url: "https://project.supabase.co".to_string(),
            anon_key: Some("test-anon-key".to_string()),
            anon_key_env: None,
            request_timeout_secs: 5,
        };
        settings.analytics.log_events = false;
        settings
    }

    /// Cookie factory keyed with the fixture session secret
    #[must_use]
    pub fn cookie_factory() -> SessionCookieFactory {
        SessionCookieFactory::from_settings(&Self::settings())
    }
}
