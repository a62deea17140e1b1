use std::fs;
use std::path::Path;

use actix_web::{web, HttpResponse};
use log::debug;
use serde_json::json;

use crate::settings::Settings;

/// Health check endpoint
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "WebAuthn relying party is running"
    }))
}

fn content_type(file_name: &str) -> &'static str {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "text/plain",
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": "not_found",
        "message": "File not found"
    }))
}

fn read_static(folder: &str, file_name: &str) -> HttpResponse {
    if file_name.is_empty() || file_name.contains("..") || file_name.contains('\\') {
        return not_found();
    }
    let file_path = Path::new(folder).join(file_name);
    debug!("Attempting to serve static file: {}", file_path.display());

    fs::read(&file_path).map_or_else(
        |_| {
            debug!("Static file not found: {}", file_path.display());
            not_found()
        },
        |contents| {
            HttpResponse::Ok()
                .content_type(content_type(file_name))
                .body(contents)
        },
    )
}

/// Serve a file from the configured static folder
pub async fn serve_static(path: web::Path<String>, settings: web::Data<Settings>) -> HttpResponse {
    read_static(&settings.application.static_folder, &path.into_inner())
}

/// Serve the demo page
pub async fn index(settings: web::Data<Settings>) -> HttpResponse {
    read_static(&settings.application.static_folder, "index.html")
}
