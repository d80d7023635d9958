//! Provider session persistence between page loads

pub mod cookie;

pub use cookie::{create_expired_cookie, SessionCookieFactory, SESSION_COOKIE_NAME};
