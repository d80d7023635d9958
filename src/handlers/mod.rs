// HTTP request handlers for the confirmation service
pub mod confirm;
pub mod registration;
pub mod static_files;

use actix_web::web;

use crate::provider::ScopedProvider;

// Re-export the main handler functions
pub use confirm::{confirm, confirm_page, FlowDependencies};
pub use registration::{register, resend, session_status};
pub use static_files::{health, serve_static};

/// Register every route, with provider-facing handlers bound to `P`
///
/// Expects `web::Data<P>`, `web::Data<FlowDependencies>`,
/// `web::Data<SessionCookieFactory>` and `web::Data<ConfirmrsSettings>` in app data.
pub fn configure_services<P: ScopedProvider>(cfg: &mut web::ServiceConfig) {
    cfg
        // Confirmation flow
        .route("/auth/confirm", web::get().to(confirm_page))
        .route("/auth/confirm", web::post().to(confirm::<P>))
        // Registration
        .route("/auth/register", web::post().to(register::<P>))
        .route("/auth/resend", web::post().to(resend::<P>))
        .route("/auth/session", web::get().to(session_status::<P>))
        // Static files endpoint
        .route("/auth/static/{filename:.*}", web::get().to(serve_static))
        // Health endpoint
        .route("/ping", web::get().to(health));
}
