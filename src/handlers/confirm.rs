// Confirmation page and the endpoint its script calls
use std::sync::Arc;

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Result};
use log::{debug, error};

use crate::analytics::AnalyticsDispatcher;
use crate::flow::{ConfirmationFlow, ProfileSync};
use crate::models::{ConfirmPayload, ConfirmView, ConfirmationRequest};
use crate::provider::{IdentityProvider, ScopedProvider};
use crate::session::SessionCookieFactory;
use crate::settings::ConfirmrsSettings;
use crate::storage::ConfirmationStore;
use crate::utils::response_builder::ResponseBuilder;

const EMBEDDED_CONFIRM_PAGE: &str = include_str!("../static/confirm.html");

/// Everything a confirmation flow needs besides the provider handle
#[derive(Clone)]
pub struct FlowDependencies {
    pub store: Arc<dyn ConfirmationStore>,
    pub analytics: AnalyticsDispatcher,
    pub profile_sync: Option<ProfileSync>,
}

impl FlowDependencies {
    #[must_use]
    pub fn new(store: Arc<dyn ConfirmationStore>) -> Self {
        Self {
            store,
            analytics: AnalyticsDispatcher::default(),
            profile_sync: Some(ProfileSync::default()),
        }
    }

    /// Build a flow for one request around a request-scoped provider handle
    pub fn flow<P: IdentityProvider>(&self, provider: P) -> ConfirmationFlow<P> {
        ConfirmationFlow::new(provider, Arc::clone(&self.store))
            .with_analytics(self.analytics.clone())
            .with_profile_sync(self.profile_sync.clone())
    }
}

/// Confirmation page in its loading state
///
/// # Errors
/// Never fails; a missing page on disk falls back to the built-in copy
pub async fn confirm_page(settings: web::Data<ConfirmrsSettings>) -> Result<HttpResponse> {
    let html_path = format!("{}/confirm.html", settings.static_files.assets_folder);
    let page = std::fs::read_to_string(&html_path).unwrap_or_else(|_| {
        debug!("{html_path} not found, serving built-in confirmation page");
        EMBEDDED_CONFIRM_PAGE.to_string()
    });

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page))
}

/// Resolve the redirect parameters posted back by the confirmation page
///
/// Always answers 200 with a [`ConfirmView`]; the view's `state` tells the
/// page which region to show. When the flow ends with a provider session the
/// session cookie is set so later requests can fall back on it.
///
/// # Errors
/// Never fails; flow errors are rendered into the view
pub async fn confirm<P: ScopedProvider>(
    req: HttpRequest,
    payload: web::Json<ConfirmPayload>,
    provider: web::Data<P>,
    deps: web::Data<FlowDependencies>,
    cookie_factory: web::Data<SessionCookieFactory>,
) -> Result<HttpResponse> {
    let request = ConfirmationRequest::from_parts(&payload.query, &payload.fragment);
    let scoped = provider.scoped(cookie_factory.session_from_request(&req));
    let flow = deps.flow(scoped);

    let (outcome, record) = flow.resolve_recorded(&request).await;

    let mut cookies = Vec::new();
    if outcome.identity().is_some() {
        if let Some(session) = flow.provider().current_session() {
            match cookie_factory.create_session_cookie(&session) {
                Ok(cookie) => cookies.push(cookie),
                Err(e) => error!("Failed to create session cookie: {e}"),
            }
        }
    }

    let view = ConfirmView::from_outcome(&outcome, record);
    Ok(ResponseBuilder::json_with_cookies(StatusCode::OK, &view, cookies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowState;
    use crate::models::ConfirmationRecord;
    use crate::session::SESSION_COOKIE_NAME;
    use crate::storage::{MemoryConfirmationStore, StorageError};
    use crate::testing::{MockIdentityProvider, ProviderCall, RecordingAnalyticsSink, TestFixtures};
    use actix_web::{test, App};

    fn app_data(
        provider: &MockIdentityProvider,
        analytics: &RecordingAnalyticsSink,
    ) -> (web::Data<MockIdentityProvider>, web::Data<FlowDependencies>) {
        let mut deps = FlowDependencies::new(Arc::new(MemoryConfirmationStore::new()));
        deps.analytics = AnalyticsDispatcher::new().with_sink(Arc::new(analytics.clone()));
        (web::Data::new(provider.clone()), web::Data::new(deps))
    }

    macro_rules! confirm_app {
        ($provider:expr, $deps:expr) => {
            test::init_service(
                App::new()
                    .app_data($provider)
                    .app_data($deps)
                    .app_data(web::Data::new(TestFixtures::cookie_factory()))
                    .route(
                        "/auth/confirm",
                        web::post().to(confirm::<MockIdentityProvider>),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_signup_confirmation_sets_session_cookie() {
        let provider = MockIdentityProvider::new().with_user(TestFixtures::user());
        let analytics = RecordingAnalyticsSink::new();
        let (provider_data, deps) = app_data(&provider, &analytics);
        let app = confirm_app!(provider_data, deps);

        let req = test::TestRequest::post()
            .uri("/auth/confirm")
            .set_json(ConfirmPayload {
                query: String::new(),
                fragment: "#access_token=abc&refresh_token=def&type=signup".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .response()
            .cookies()
            .any(|cookie| cookie.name() == SESSION_COOKIE_NAME));

        let view: ConfirmView = test::read_body_json(resp).await;
        assert_eq!(view.state, FlowState::Success);
        assert_eq!(view.email.as_deref(), Some("test@example.com"));
        assert!(view.record.unwrap().confirmed);
        assert_eq!(analytics.events().len(), 1);
    }

    /// Slot that another request overwrote between our write and any read back
    struct OverwrittenStore;

    impl ConfirmationStore for OverwrittenStore {
        fn write(&self, _key: &str, _record: &ConfirmationRecord) -> Result<(), StorageError> {
            Ok(())
        }

        fn read(&self, _key: &str) -> Result<Option<ConfirmationRecord>, StorageError> {
            Ok(Some(ConfirmationRecord {
                timestamp: "2024-05-01T10:00:00+00:00".to_string(),
                email: "someone-else@example.com".to_string(),
                user_id: Some("other-user".to_string()),
                confirmed: true,
            }))
        }
    }

    #[actix_web::test]
    async fn test_view_carries_own_record_not_shared_slot() {
        let provider = MockIdentityProvider::new().with_user(TestFixtures::user());
        let deps = FlowDependencies::new(Arc::new(OverwrittenStore));
        let app = confirm_app!(web::Data::new(provider), web::Data::new(deps));

        let req = test::TestRequest::post()
            .uri("/auth/confirm")
            .set_json(ConfirmPayload {
                query: String::new(),
                fragment: "#access_token=abc&refresh_token=def&type=signup".to_string(),
            })
            .to_request();
        let view: ConfirmView = test::call_and_read_body_json(&app, req).await;

        assert_eq!(view.state, FlowState::Success);
        let record = view.record.unwrap();
        assert_eq!(record.email, "test@example.com");
        assert_eq!(record.user_id.as_deref(), Some(TestFixtures::user().id.as_str()));
    }

    #[actix_web::test]
    async fn test_redirect_error_renders_description() {
        let provider = MockIdentityProvider::new().with_user(TestFixtures::user());
        let analytics = RecordingAnalyticsSink::new();
        let (provider_data, deps) = app_data(&provider, &analytics);
        let app = confirm_app!(provider_data, deps);

        let req = test::TestRequest::post()
            .uri("/auth/confirm")
            .set_json(ConfirmPayload {
                query: "?error=access_denied&error_description=Email+link+is+invalid+or+has+expired"
                    .to_string(),
                fragment: String::new(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.response().cookies().count(), 0);

        let view: ConfirmView = test::read_body_json(resp).await;
        assert_eq!(view.state, FlowState::Error);
        assert_eq!(
            view.message.as_deref(),
            Some("Email link is invalid or has expired")
        );
        assert!(view.record.is_none());
        assert!(provider.calls().is_empty());
        assert!(analytics.events().is_empty());
    }

    #[actix_web::test]
    async fn test_session_fallback_uses_cookie() {
        let provider = MockIdentityProvider::new();
        let analytics = RecordingAnalyticsSink::new();
        let (provider_data, deps) = app_data(&provider, &analytics);
        let app = confirm_app!(provider_data, deps);

        let cookie = TestFixtures::cookie_factory()
            .create_session_cookie(&TestFixtures::session())
            .unwrap();
        let req = test::TestRequest::post()
            .uri("/auth/confirm")
            .cookie(cookie)
            .set_json(ConfirmPayload::default())
            .to_request();
        let view: ConfirmView = test::call_and_read_body_json(&app, req).await;

        assert_eq!(view.state, FlowState::Success);
        assert_eq!(provider.calls(), vec![ProviderCall::GetSession]);
    }

    #[actix_web::test]
    async fn test_session_fallback_without_cookie_fails() {
        let provider = MockIdentityProvider::new();
        let analytics = RecordingAnalyticsSink::new();
        let (provider_data, deps) = app_data(&provider, &analytics);
        let app = confirm_app!(provider_data, deps);

        let req = test::TestRequest::post()
            .uri("/auth/confirm")
            .set_json(ConfirmPayload::default())
            .to_request();
        let view: ConfirmView = test::call_and_read_body_json(&app, req).await;

        assert_eq!(view.state, FlowState::Error);
        assert_eq!(
            view.message.as_deref(),
            Some("confirmation could not be verified; link may have expired.")
        );
    }

    #[actix_web::test]
    async fn test_confirm_page_falls_back_to_embedded_copy() {
        let mut settings = TestFixtures::settings();
        settings.static_files.assets_folder = "/nonexistent".to_string();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .route("/auth/confirm", web::get().to(confirm_page)),
        )
        .await;

        let req = test::TestRequest::get().uri("/auth/confirm").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("/auth/confirm"));
    }
}
