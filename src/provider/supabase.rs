//! Supabase (GoTrue + PostgREST) implementation of [`IdentityProvider`]

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::{RequestBuilder, Response};
use serde_json::json;

use super::{
    IdentityProvider, ProfileRecord, ProviderError, ProviderErrorKind, ResendType, ScopedProvider,
    Session, SignUpOutcome, SignUpRequest, User,
};
use crate::settings::ProviderSettings;
use crate::utils::crypto::decode_jwt_payload;

/// Connection details for a Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout: Duration,
}

impl SupabaseConfig {
    /// Build the configuration from settings, resolving the key from the environment
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the project URL or anon key is missing
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let url = settings.url.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(ProviderError::new(
                ProviderErrorKind::Configuration,
                "Provider URL is not configured",
            ));
        }

        let anon_key = settings
            .get_anon_key()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Configuration,
                    "Provider anon key is not configured",
                )
            })?;

        Ok(Self {
            url,
            anon_key,
            request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
        })
    }
}

/// HTTP client for the Supabase auth and REST APIs
///
/// Clones share the connection pool and the session slot; use
/// [`ScopedProvider::scoped`] to get a handle with its own session.
#[derive(Clone)]
pub struct SupabaseClient {
    config: Arc<SupabaseConfig>,
    http: reqwest::Client,
    session: Arc<RwLock<Option<Session>>>,
}

impl SupabaseClient {
    /// Create a client for the given project
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    pub fn new(config: SupabaseConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Create a client from the `[provider]` settings section
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are incomplete or the HTTP client cannot be built
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Self::new(SupabaseConfig::from_settings(settings)?)
    }

    #[must_use]
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.url)
    }

    /// Attach the project key and a bearer token (the anon key when no user token)
    fn authorized(&self, builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.config.anon_key))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ProviderError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::from_response(status.as_u16(), &body))
    }

    fn store_session(&self, session: Option<Session>) {
        let mut slot = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *slot = session;
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        debug!("Refreshing provider session");
        let request = self
            .authorized(self.http.post(self.auth_url("token")), None)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        let session: Session = Self::send(request).await?.json().await?;
        Ok(session)
    }
}

/// Read the `exp` claim from an access token without verifying it
fn token_expiry(access_token: &str) -> Option<i64> {
    decode_jwt_payload(access_token)
        .ok()
        .and_then(|claims| claims.get("exp").and_then(serde_json::Value::as_i64))
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn get_user(&self, access_token: Option<&str>) -> Result<Option<User>, ProviderError> {
        let token = match access_token {
            Some(token) => token.to_string(),
            None => self
                .current_session()
                .map(|session| session.access_token)
                .ok_or_else(ProviderError::session_missing)?,
        };

        let request = self.authorized(self.http.get(self.auth_url("user")), Some(&token));
        match Self::send(request).await {
            Ok(response) => Ok(Some(response.json::<User>().await?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ProviderError> {
        let expires_at = token_expiry(access_token);
        let expired = expires_at.is_some_and(|exp| exp <= Utc::now().timestamp());

        let session = if expired {
            self.refresh_session(refresh_token).await?
        } else {
            let user = self.get_user(Some(access_token)).await?.ok_or_else(|| {
                ProviderError::new(ProviderErrorKind::NotFound, "User from access token not found")
            })?;
            Session {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at,
                user: Some(user),
            }
        };

        self.store_session(Some(session.clone()));
        Ok(session)
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(mut session) = self.current_session() else {
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            session = self.refresh_session(&session.refresh_token).await?;
            self.store_session(Some(session.clone()));
        }

        if session.user.is_none() {
            session.user = self.get_user(Some(&session.access_token)).await?;
            self.store_session(Some(session.clone()));
        }

        Ok(Some(session))
    }

    async fn upsert(
        &self,
        table: &str,
        record: &ProfileRecord,
        conflict_key: &str,
    ) -> Result<(), ProviderError> {
        let bearer = self.current_session().map(|session| session.access_token);
        let request = self
            .authorized(self.http.post(self.rest_url(table)), bearer.as_deref())
            .query(&[("on_conflict", conflict_key)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record);

        Self::send(request).await?;
        Ok(())
    }

    async fn resend(&self, kind: ResendType, email: &str) -> Result<(), ProviderError> {
        let request = self
            .authorized(self.http.post(self.auth_url("resend")), None)
            .json(&json!({ "type": kind, "email": email }));

        Self::send(request).await?;
        Ok(())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, ProviderError> {
        let mut builder = self.authorized(self.http.post(self.auth_url("signup")), None);
        if let Some(redirect_to) = &request.email_redirect_to {
            builder = builder.query(&[("redirect_to", redirect_to.as_str())]);
        }
        let builder = builder.json(&json!({
            "email": request.email,
            "password": request.password,
            "data": request.metadata,
        }));

        let body: serde_json::Value = Self::send(builder).await?.json().await?;

        // With autoconfirm on GoTrue answers with a full session, otherwise
        // with the bare user awaiting confirmation.
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            self.store_session(Some(session.clone()));
            Ok(SignUpOutcome::SessionCreated(session))
        } else {
            let user: User = serde_json::from_value(body)?;
            Ok(SignUpOutcome::ConfirmationSent(user))
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ScopedProvider for SupabaseClient {
    fn scoped(&self, session: Option<Session>) -> Self {
        Self {
            config: Arc::clone(&self.config),
            http: self.http.clone(),
            session: Arc::new(RwLock::new(session)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use crate::provider::SignUpMetadata;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn settings() -> ProviderSettings {
        ProviderSettings {
            url: "https://project.supabase.co/".to_string(),
            anon_key: Some("anon-key".to_string()),
            anon_key_env: None,
            request_timeout_secs: 5,
        }
    }

    fn client_for(server: &MockServer) -> SupabaseClient {
        let mut settings = settings();
        settings.url = server.uri();
        SupabaseClient::from_settings(&settings).unwrap()
    }

    fn user_json() -> serde_json::Value {
        json!({ "id": "user-1", "email": "jane@example.com" })
    }

    fn token_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
        format!("{header}.{payload}.signature")
    }

    fn session(access_token: &str) -> Session {
        Session {
            access_token: access_token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: None,
            user: None,
        }
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = SupabaseConfig::from_settings(&settings()).unwrap();
        assert_eq!(config.url, "https://project.supabase.co");
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        let client = SupabaseClient::new(config).unwrap();
        assert_eq!(
            client.auth_url("user"),
            "https://project.supabase.co/auth/v1/user"
        );
        assert_eq!(
            client.rest_url("profiles"),
            "https://project.supabase.co/rest/v1/profiles"
        );
    }

    #[test]
    fn test_config_requires_url_and_key() {
        let mut missing_url = settings();
        missing_url.url = String::new();
        let err = SupabaseConfig::from_settings(&missing_url).unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Configuration);

        let mut missing_key = settings();
        missing_key.anon_key = None;
        let err = SupabaseConfig::from_settings(&missing_key).unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Configuration);
    }

    #[test]
    fn test_token_expiry() {
        assert_eq!(token_expiry(&token_with_exp(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(token_expiry("not-a-jwt"), None);
    }

    #[test]
    fn test_scoped_handles_do_not_share_sessions() {
        let client = SupabaseClient::from_settings(&settings()).unwrap();
        let first = client.scoped(Some(session("first")));
        let second = client.scoped(None);

        assert_eq!(
            first.current_session().map(|s| s.access_token),
            Some("first".to_string())
        );
        assert!(second.current_session().is_none());
        assert!(client.current_session().is_none());

        // Clones of a scoped handle see the same slot
        let clone = first.clone();
        first.store_session(Some(session("rotated")));
        assert_eq!(
            clone.current_session().map(|s| s.access_token),
            Some("rotated".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_user_without_session_is_session_missing() {
        let client = SupabaseClient::from_settings(&settings()).unwrap();
        let err = client.get_user(None).await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::SessionMissing);
    }

    #[tokio::test]
    async fn test_get_session_without_session_is_none() {
        let client = SupabaseClient::from_settings(&settings()).unwrap();
        assert!(client.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_user_sends_key_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server)
            .get_user(Some("user-token"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("jane@example.com"));
    }

    #[tokio::test]
    async fn test_get_user_classifies_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "msg": "User not found" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "msg": "invalid JWT: token is expired" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.get_user(Some("gone")).await.unwrap().is_none());

        let err = client.get_user(Some("stale")).await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Unauthorized);
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "invalid JWT: token is expired");
    }

    #[tokio::test]
    async fn test_set_session_with_live_token_looks_up_user() {
        let server = MockServer::start().await;
        let access_token = token_with_exp(Utc::now().timestamp() + 3600);
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", format!("Bearer {access_token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = client.set_session(&access_token, "refresh").await.unwrap();

        assert_eq!(session.user.map(|user| user.id).as_deref(), Some("user-1"));
        assert_eq!(
            client.current_session().map(|s| s.access_token),
            Some(access_token)
        );
    }

    #[tokio::test]
    async fn test_set_session_with_expired_token_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "refresh_token": "fresh-refresh",
                "expires_at": Utc::now().timestamp() + 3600,
                "user": user_json(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let expired = token_with_exp(Utc::now().timestamp() - 60);
        let session = client.set_session(&expired, "refresh").await.unwrap();

        assert_eq!(session.access_token, "fresh-access");
        assert_eq!(
            client.current_session().map(|s| s.refresh_token),
            Some("fresh-refresh".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_session_refreshes_expired_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "refresh_token": "fresh-refresh",
                "user": user_json(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut held = session("old-access");
        held.expires_at = Some(Utc::now().timestamp() - 60);
        let client = client_for(&server).scoped(Some(held));

        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "fresh-access");
        assert_eq!(session.user.map(|user| user.id).as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_upsert_merges_on_conflict_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("on_conflict", "id"))
            .and(|req: &Request| {
                req.headers.get("prefer").and_then(|v| v.to_str().ok())
                    == Some("resolution=merge-duplicates,return=minimal")
            })
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/missing"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "PGRST205",
                "message": "Could not find the table 'public.missing' in the schema cache",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).scoped(Some(session("user-token")));
        let user = User {
            id: "user-1".to_string(),
            email: Some("jane@example.com".to_string()),
            email_confirmed_at: None,
            user_metadata: serde_json::Value::Null,
        };
        let record = ProfileRecord::confirmed(&user, Utc::now());

        client.upsert("profiles", &record, "id").await.unwrap();

        let err = client.upsert("missing", &record, "id").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resend_posts_type_and_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/resend"))
            .and(body_json(json!({ "type": "signup", "email": "jane@example.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .resend(ResendType::Signup, "jane@example.com")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resend_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/resend"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error_code": "over_email_send_rate_limit",
                "msg": "email rate limit exceeded",
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resend(ResendType::Signup, "jane@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::RateLimited);
    }

    fn sign_up_request() -> SignUpRequest {
        SignUpRequest {
            email: "jane@example.com".to_string(),
            password: "Sup3r-secret".to_string(),
            metadata: SignUpMetadata {
                full_name: "Jane Doe".to_string(),
                company_name: "Acme".to_string(),
                phone: "555-0100".to_string(),
            },
            email_redirect_to: Some("https://app.example.com/auth/confirm".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sign_up_awaiting_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(query_param("redirect_to", "https://app.example.com/auth/confirm"))
            .and(body_json(json!({
                "email": "jane@example.com",
                "password": "Sup3r-secret",
                "data": {
                    "full_name": "Jane Doe",
                    "company_name": "Acme",
                    "phone": "555-0100",
                },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.sign_up(&sign_up_request()).await.unwrap();

        assert!(matches!(outcome, SignUpOutcome::ConfirmationSent(user) if user.id == "user-1"));
        assert!(client.current_session().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_with_autoconfirm_holds_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "user": user_json(),
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.sign_up(&sign_up_request()).await.unwrap();

        assert!(matches!(outcome, SignUpOutcome::SessionCreated(_)));
        assert_eq!(
            client.current_session().map(|s| s.access_token),
            Some("new-access".to_string())
        );
    }

    #[tokio::test]
    async fn test_sign_up_existing_account_is_invalid_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error_code": "user_already_exists",
                "msg": "User already registered",
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_up(&sign_up_request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::InvalidRequest);
        assert_eq!(err.message(), "User already registered");
    }
}
