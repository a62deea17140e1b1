//! Passkey ceremony endpoints
//!
//! Thin HTTP wrappers around [`WebAuthnService`]. Challenges and credentials
//! are kept in the injected stores; every ceremony failure is reported to
//! the client with a generic message and logged with its error kind.

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::store::{
    CeremonyKind, ChallengeStore, CredentialStore, PendingCeremony, StoreError, StoredCredential,
};
use crate::webauthn::{
    PublicKeyCredential, PublicKeyCredentialAssertion, UserEntity, UserVerificationRequirement,
    WebAuthnService,
};

/// Body of `/register/begin`
#[derive(Debug, Deserialize)]
pub struct BeginRegistrationRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Body of `/login/begin`
#[derive(Debug, Deserialize)]
pub struct BeginLoginRequest {
    #[serde(default)]
    pub email: String,
}

fn json_error(status: StatusCode, error: &str, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "error": error,
        "message": message
    }))
}

fn store_error_to_response(error: &StoreError) -> HttpResponse {
    warn!("Store operation failed: {error}");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "An internal error occurred",
    )
}

fn challenge_not_found() -> HttpResponse {
    json_error(
        StatusCode::BAD_REQUEST,
        "challenge_not_found",
        "Challenge not found or expired",
    )
}

/// Start registration for a new user
pub async fn begin_registration(
    body: web::Json<BeginRegistrationRequest>,
    service: web::Data<WebAuthnService>,
    challenges: web::Data<dyn ChallengeStore>,
    users: web::Data<dyn CredentialStore>,
) -> HttpResponse {
    let request = body.into_inner();
    let email = request.email.trim().to_string();
    let username = request.username.trim().to_string();
    if username.is_empty() || email.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Username and email are required",
        );
    }

    // an abandoned registration may be restarted until a credential exists
    let user = match users.get_user(&email) {
        Ok(record) if record.credential.is_some() => {
            return json_error(StatusCode::CONFLICT, "user_exists", "Email already registered");
        }
        Ok(record) => record.user,
        Err(StoreError::UserNotFound(_)) => {
            let user = UserEntity {
                id: Uuid::new_v4().as_bytes().to_vec(),
                name: email.clone(),
                display_name: username,
            };
            if let Err(e) = users.create_user(user.clone()) {
                return store_error_to_response(&e);
            }
            user
        }
        Err(e) => return store_error_to_response(&e),
    };

    let options = match service.begin_registration(user) {
        Ok(options) => options,
        Err(e) => {
            warn!("Failed to begin registration: {e}");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Failed to begin registration",
            );
        }
    };

    if let Err(e) = challenges.save_challenge(
        &options.challenge,
        PendingCeremony::new(email.as_str(), CeremonyKind::Registration),
    ) {
        return store_error_to_response(&e);
    }

    info!("Begin registration for {email}");
    HttpResponse::Ok().json(options)
}

/// Complete registration with the browser's credential
pub async fn finish_registration(
    body: web::Bytes,
    service: web::Data<WebAuthnService>,
    challenges: web::Data<dyn ChallengeStore>,
    users: web::Data<dyn CredentialStore>,
) -> HttpResponse {
    let credential = match PublicKeyCredential::parse(&body) {
        Ok(credential) => credential,
        Err(e) => {
            debug!("Rejected registration payload: {e}");
            return json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "Failed to parse request body",
            );
        }
    };

    let Ok(pending) = challenges.take_challenge(credential.challenge(), CeremonyKind::Registration)
    else {
        return challenge_not_found();
    };

    let result = match service.finish_registration(&credential.to_registration_data()) {
        Ok(result) => result,
        Err(e) => {
            warn!(
                "Registration failed for {} ({:?})",
                pending.user_name,
                e.kind()
            );
            return json_error(
                StatusCode::BAD_REQUEST,
                "registration_failed",
                "Registration verification failed",
            );
        }
    };

    let authenticator_name = result.authenticator_name.clone();
    let aaguid = result.aaguid.clone();
    if let Err(e) = users.save_credential(&pending.user_name, StoredCredential::from(result)) {
        return store_error_to_response(&e);
    }

    info!(
        "Registration successful for {} with {authenticator_name}",
        pending.user_name
    );
    HttpResponse::Ok().json(json!({
        "success": true,
        "authenticatorName": authenticator_name,
        "aaguid": aaguid,
    }))
}

/// Start login for a registered user
pub async fn begin_login(
    body: web::Json<BeginLoginRequest>,
    service: web::Data<WebAuthnService>,
    challenges: web::Data<dyn ChallengeStore>,
    users: web::Data<dyn CredentialStore>,
) -> HttpResponse {
    let email = body.email.trim();
    if email.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "invalid_request", "Email is required");
    }

    // unknown users and users without a credential look the same
    let credential = match users.get_user(email) {
        Ok(record) => record.credential,
        Err(StoreError::UserNotFound(_)) => None,
        Err(e) => return store_error_to_response(&e),
    };
    let Some(credential) = credential else {
        debug!("No credential for {email}");
        return json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "No credential registered for this user",
        );
    };

    let options = match service.begin_login(&[credential.credential_id]) {
        Ok(options) => options,
        Err(e) => {
            warn!("Failed to begin login: {e}");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Failed to begin login",
            );
        }
    };

    if let Err(e) = challenges.save_challenge(
        &options.challenge,
        PendingCeremony::new(email, CeremonyKind::Login),
    ) {
        return store_error_to_response(&e);
    }

    info!("Begin login for {email}");
    HttpResponse::Ok().json(options)
}

/// Complete login with the browser's assertion
pub async fn finish_login(
    body: web::Bytes,
    service: web::Data<WebAuthnService>,
    challenges: web::Data<dyn ChallengeStore>,
    users: web::Data<dyn CredentialStore>,
) -> HttpResponse {
    let assertion = match PublicKeyCredentialAssertion::parse(&body) {
        Ok(assertion) => assertion,
        Err(e) => {
            debug!("Rejected assertion payload: {e}");
            return json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "Failed to parse request body",
            );
        }
    };

    let Ok(pending) = challenges.take_challenge(assertion.challenge(), CeremonyKind::Login) else {
        return challenge_not_found();
    };

    let record = match users.get_user(&pending.user_name) {
        Ok(record) => record,
        Err(e) => return store_error_to_response(&e),
    };
    let Some(credential) = record.credential else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "authentication_failed",
            "Login verification failed",
        );
    };

    if assertion.id != credential.credential_id {
        warn!("Credential ID mismatch for {}", pending.user_name);
        return json_error(
            StatusCode::BAD_REQUEST,
            "authentication_failed",
            "Login verification failed",
        );
    }

    let stored_sign_count = credential.sign_count;
    let login_data = assertion.to_login_data(stored_sign_count, credential.public_key);
    let output = match service.finish_login(&login_data) {
        Ok(output) => output,
        Err(e) => {
            warn!("Login failed for {} ({:?})", pending.user_name, e.kind());
            return json_error(
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                "Login verification failed",
            );
        }
    };

    if service.config().user_verification == UserVerificationRequirement::Required
        && !output.user_verified
    {
        warn!("User verification required but not performed for {}", pending.user_name);
        return json_error(
            StatusCode::UNAUTHORIZED,
            "authentication_failed",
            "Login verification failed",
        );
    }

    match users.update_sign_count(&pending.user_name, stored_sign_count, output.new_sign_count) {
        Ok(()) => {}
        Err(e @ StoreError::SignCountConflict { .. }) => {
            warn!("Login rejected for {}: {e}", pending.user_name);
            return json_error(
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                "Login verification failed",
            );
        }
        Err(e) => return store_error_to_response(&e),
    }

    info!(
        "Login successful for {} (sign count {}, user verified: {})",
        pending.user_name, output.new_sign_count, output.user_verified
    );
    HttpResponse::Ok().json(json!({
        "success": true,
        "userVerified": output.user_verified,
        "username": record.user.display_name,
    }))
}
