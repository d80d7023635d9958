// Registration handlers: sign-up, resend, and the existing-session check
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Result};
use log::{debug, error, warn};

use crate::models::{RegistrationForm, RegistrationResponse, ResendPayload, SessionStatus};
use crate::provider::{ProviderErrorKind, ResendType, ScopedProvider, Session, SignUpOutcome};
use crate::session::SessionCookieFactory;
use crate::settings::ConfirmrsSettings;
use crate::utils::logging::LoggingHelper;
use crate::utils::response_builder::ResponseBuilder;
use crate::validation::registration::EMAIL_MESSAGE;
use crate::validation::{
    is_valid_email, validate_registration, RegistrationError, RESEND_FAILED_MESSAGE,
};

const CONFIRMATION_SENT_MESSAGE: &str =
    "Registration successful. Check your email to confirm your account.";
const SIGNED_IN_MESSAGE: &str = "Registration successful. You are now signed in.";
const RESENT_MESSAGE: &str = "Confirmation email sent again. Check your inbox.";

fn provider_unavailable(kind: ProviderErrorKind) -> bool {
    matches!(
        kind,
        ProviderErrorKind::Configuration
            | ProviderErrorKind::Network
            | ProviderErrorKind::Timeout
            | ProviderErrorKind::Api
            | ProviderErrorKind::Decode
    )
}

fn session_cookies(
    cookie_factory: &SessionCookieFactory,
    session: &Session,
) -> Vec<actix_web::cookie::Cookie<'static>> {
    match cookie_factory.create_session_cookie(session) {
        Ok(cookie) => vec![cookie],
        Err(e) => {
            error!("Failed to create session cookie: {e}");
            Vec::new()
        }
    }
}

/// Create an account from the registration form
///
/// # Errors
/// Never fails; validation and provider errors are returned as JSON error bodies
pub async fn register<P: ScopedProvider>(
    form: web::Json<RegistrationForm>,
    provider: web::Data<P>,
    settings: web::Data<ConfirmrsSettings>,
    cookie_factory: web::Data<SessionCookieFactory>,
) -> Result<HttpResponse> {
    let request = match validate_registration(&form, Some(settings.get_confirm_url())) {
        Ok(request) => request,
        Err(err) => return Ok(ResponseBuilder::bad_request_json(&err.to_string())),
    };

    let provider = provider.scoped(None);
    match provider.sign_up(&request).await {
        Ok(SignUpOutcome::ConfirmationSent(_)) => {
            LoggingHelper::log_sign_up(&request.email, true);
            Ok(HttpResponse::Ok().json(RegistrationResponse {
                confirmation_sent: true,
                email: request.email,
                message: CONFIRMATION_SENT_MESSAGE.to_string(),
            }))
        }
        Ok(SignUpOutcome::SessionCreated(session)) => {
            LoggingHelper::log_sign_up(&request.email, false);
            Ok(ResponseBuilder::json_with_cookies(
                StatusCode::OK,
                &RegistrationResponse {
                    confirmation_sent: false,
                    email: request.email,
                    message: SIGNED_IN_MESSAGE.to_string(),
                },
                session_cookies(&cookie_factory, &session),
            ))
        }
        Err(source) => {
            warn!("Sign-up for {} failed ({}): {source}", request.email, source.kind());
            let status = if provider_unavailable(source.kind()) {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::BAD_REQUEST
            };
            let err = RegistrationError::from_provider(source);
            Ok(ResponseBuilder::json_error(status, "registration_failed", &err.to_string()))
        }
    }
}

/// Ask the provider to send the sign-up confirmation email again
///
/// # Errors
/// Never fails; provider errors are returned as a JSON error body
pub async fn resend<P: ScopedProvider>(
    payload: web::Json<ResendPayload>,
    provider: web::Data<P>,
) -> Result<HttpResponse> {
    let email = payload.email.trim();
    if !is_valid_email(email) {
        return Ok(ResponseBuilder::bad_request_json(EMAIL_MESSAGE));
    }

    match provider.scoped(None).resend(ResendType::Signup, email).await {
        Ok(()) => {
            LoggingHelper::log_sign_up(email, true);
            Ok(HttpResponse::Ok().json(RegistrationResponse {
                confirmation_sent: true,
                email: email.to_string(),
                message: RESENT_MESSAGE.to_string(),
            }))
        }
        Err(e) => {
            warn!("Resend to {email} failed ({}): {e}", e.kind());
            Ok(ResponseBuilder::json_error(
                StatusCode::BAD_GATEWAY,
                "resend_failed",
                RESEND_FAILED_MESSAGE,
            ))
        }
    }
}

/// Report whether the session cookie still resolves to a user
///
/// A refreshed session replaces the cookie; an unusable one clears it.
///
/// # Errors
/// Never fails; provider errors are treated as no session
pub async fn session_status<P: ScopedProvider>(
    req: HttpRequest,
    provider: web::Data<P>,
    cookie_factory: web::Data<SessionCookieFactory>,
) -> Result<HttpResponse> {
    let Some(cookie_session) = cookie_factory.session_from_request(&req) else {
        return Ok(HttpResponse::Ok().json(SessionStatus::anonymous()));
    };

    let provider = provider.scoped(Some(cookie_session.clone()));
    let session = match provider.get_session().await {
        Ok(session) => session,
        Err(e) => {
            debug!("Session check failed ({}): {e}", e.kind());
            None
        }
    };

    let resolved = session
        .as_ref()
        .and_then(|current| current.user.as_ref().map(|user| (current, user)));

    match resolved {
        Some((current, user)) => {
            let status = SessionStatus {
                authenticated: true,
                user_id: Some(user.id.clone()),
                email: user.email.clone(),
                email_confirmed_at: user.email_confirmed_at.clone(),
            };
            let cookies = if current.access_token == cookie_session.access_token {
                Vec::new()
            } else {
                session_cookies(&cookie_factory, current)
            };
            Ok(ResponseBuilder::json_with_cookies(StatusCode::OK, &status, cookies))
        }
        None => Ok(ResponseBuilder::json_with_cookies(
            StatusCode::OK,
            &SessionStatus::anonymous(),
            vec![cookie_factory.create_expired_cookie()],
        )),
    }
}
