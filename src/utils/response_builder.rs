use actix_web::{cookie::Cookie, http::StatusCode, HttpResponse};
use serde::Serialize;

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// JSON body with optional cookies attached
    pub fn json_with_cookies<T: Serialize>(
        status: StatusCode,
        body: &T,
        cookies: Vec<Cookie<'static>>,
    ) -> HttpResponse {
        let mut builder = HttpResponse::build(status);
        for cookie in cookies {
            builder.cookie(cookie);
        }
        builder.json(body)
    }

    /// Standard `{error, message}` JSON error body
    pub fn json_error(status: StatusCode, error: &str, message: &str) -> HttpResponse {
        HttpResponse::build(status).json(serde_json::json!({
            "error": error,
            "message": message,
        }))
    }

    pub fn bad_request_json(message: &str) -> HttpResponse {
        Self::json_error(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found_json(message: &str) -> HttpResponse {
        Self::json_error(StatusCode::NOT_FOUND, "not_found", message)
    }
}
