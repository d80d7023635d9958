use crate::models::HealthResponse;
use crate::settings::ConfirmrsSettings;
use crate::utils::response_builder::ResponseBuilder;
use actix_web::{web, HttpResponse, Result};
use log::debug;
use std::fs;

/// Health check endpoint
///
/// # Errors
/// Returns an error if health status cannot be determined
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Confirmrs registration confirmation service is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "text/plain",
    }
}

/// Serve static files from the configured static directory
///
/// # Errors
/// Never fails; unknown or unsafe paths answer 404
pub async fn serve_static(
    path: web::Path<String>,
    settings: web::Data<ConfirmrsSettings>,
) -> Result<HttpResponse> {
    let filename = path.into_inner();
    if filename.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        debug!("Rejected static path: {filename}");
        return Ok(ResponseBuilder::not_found_json("File not found"));
    }

    let file_path = format!("{}/{}", settings.static_files.assets_folder, filename);
    debug!("Attempting to serve static file: {file_path}");

    Ok(fs::read(&file_path).map_or_else(
        |_| {
            debug!("Static file not found: {file_path}");
            ResponseBuilder::not_found_json("File not found")
        },
        |contents| {
            HttpResponse::Ok()
                .content_type(content_type_for(&filename))
                .body(contents)
        },
    ))
}
