#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use webauthn_rp::{
    handlers::configure_services,
    settings::Settings,
    store::{ChallengeStore, CredentialStore, InMemoryChallengeStore, InMemoryCredentialStore},
    webauthn::WebAuthnService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = Settings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let config = settings
        .webauthn
        .to_config()
        .map_err(|e| std::io::Error::other(format!("Invalid WebAuthn settings: {e}")))?;
    let aaguids = settings
        .webauthn
        .load_aaguids()
        .map_err(|e| std::io::Error::other(format!("Failed to load AAGUID names: {e}")))?;
    let service = WebAuthnService::new(config, Arc::new(aaguids))
        .map_err(|e| std::io::Error::other(format!("Failed to initialize WebAuthn: {e}")))?;

    start_server(settings, service).await
}

/// Start the demo relying party server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(settings: Settings, service: WebAuthnService) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let challenges: Arc<dyn ChallengeStore> = Arc::new(InMemoryChallengeStore::with_timeout_ms(
        service.config().timeout_ms,
    ));
    let users: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
    let challenges = web::Data::from(challenges);
    let users = web::Data::from(users);
    let service = web::Data::new(service);
    let settings = web::Data::new(settings);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(challenges.clone())
            .app_data(users.clone())
            .app_data(settings.clone())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &Settings) {
    println!("🚀 Starting WebAuthn relying party on http://{bind_address}");
    println!("   RP ID: {}", settings.webauthn.rp_id);
    println!("   Allowed origins: {}", settings.webauthn.rp_origins.join(", "));
    println!("   Static files: {}", settings.application.static_folder);
}
