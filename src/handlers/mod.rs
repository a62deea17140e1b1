// HTTP request handlers for the demo relying party
pub mod passkey;
pub mod static_files;

use actix_web::web;

pub use passkey::{begin_login, begin_registration, finish_login, finish_registration};
pub use static_files::{health, index, serve_static};

/// Register the ceremony, static file and health routes
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg
        // Ceremony endpoints
        .route("/register/begin", web::post().to(begin_registration))
        .route("/register/finish", web::post().to(finish_registration))
        .route("/login/begin", web::post().to(begin_login))
        .route("/login/finish", web::post().to(finish_login))
        // Static files
        .route("/", web::get().to(index))
        .route("/static/{filename}", web::get().to(serve_static))
        // Health endpoint
        .route("/ping", web::get().to(health));
}
