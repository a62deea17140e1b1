// End-to-end tests of the demo server routes
use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use webauthn_rp::handlers::configure_services;
use webauthn_rp::store::{
    ChallengeStore, CredentialStore, InMemoryChallengeStore, InMemoryCredentialStore, StoreError,
    StoredCredential, UserRecord,
};
use webauthn_rp::testing::constants::{TEST_EMAIL, TEST_ORIGIN, TEST_RP_ID, TEST_USER_NAME};
use webauthn_rp::testing::{TestAuthenticator, TestFixtures};
use webauthn_rp::webauthn::UserEntity;

macro_rules! init_app {
    () => {
        init_app!(Arc::new(InMemoryCredentialStore::new()))
    };
    ($users:expr) => {{
        let challenges: Arc<dyn ChallengeStore> =
            Arc::new(InMemoryChallengeStore::with_timeout_ms(60_000));
        let users: Arc<dyn CredentialStore> = $users;
        test::init_service(
            App::new()
                .app_data(web::Data::new(TestFixtures::service()))
                .app_data(web::Data::from(challenges))
                .app_data(web::Data::from(users))
                .app_data(web::Data::new(TestFixtures::settings()))
                .configure(configure_services),
        )
        .await
    }};
}

fn post_json(uri: &str, body: &Value) -> test::TestRequest {
    test::TestRequest::post().uri(uri).set_json(body)
}

fn post_payload(uri: &str, payload: String) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header(("content-type", "application/json"))
        .set_payload(payload)
}

fn registration_body() -> Value {
    json!({ "username": TEST_USER_NAME, "email": TEST_EMAIL })
}

/// Credential store whose counter updates always fail
struct FailingCounterStore {
    inner: InMemoryCredentialStore,
    conflict: bool,
}

impl CredentialStore for FailingCounterStore {
    fn create_user(&self, user: UserEntity) -> Result<(), StoreError> {
        self.inner.create_user(user)
    }

    fn get_user(&self, name: &str) -> Result<UserRecord, StoreError> {
        self.inner.get_user(name)
    }

    fn save_credential(&self, name: &str, credential: StoredCredential) -> Result<(), StoreError> {
        self.inner.save_credential(name, credential)
    }

    fn update_sign_count(
        &self,
        _name: &str,
        expected: u32,
        _sign_count: u32,
    ) -> Result<(), StoreError> {
        if self.conflict {
            Err(StoreError::SignCountConflict {
                expected,
                stored: expected + 1,
            })
        } else {
            Err(StoreError::Poisoned)
        }
    }
}

/// Register a credential and return the status of the first login
macro_rules! login_status {
    ($app:expr) => {{
        let mut authenticator = TestAuthenticator::es256();
        let options: Value = test::call_and_read_body_json(
            &$app,
            post_json("/register/begin", &registration_body()).to_request(),
        )
        .await;
        let challenge = options["challenge"].as_str().unwrap().to_string();
        let payload = authenticator.registration_payload(TEST_RP_ID, TEST_ORIGIN, &challenge);
        let resp =
            test::call_service(&$app, post_payload("/register/finish", payload).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let options: Value = test::call_and_read_body_json(
            &$app,
            post_json("/login/begin", &json!({ "email": TEST_EMAIL })).to_request(),
        )
        .await;
        let challenge = options["challenge"].as_str().unwrap().to_string();
        let payload = authenticator.assertion_payload(TEST_RP_ID, TEST_ORIGIN, &challenge);
        let resp =
            test::call_service(&$app, post_payload("/login/finish", payload).to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

#[actix_web::test]
async fn test_register_then_login() {
    let app = init_app!();
    let mut authenticator = TestAuthenticator::es256();

    let options: Value =
        test::call_and_read_body_json(&app, post_json("/register/begin", &registration_body()).to_request())
            .await;
    assert_eq!(options["rp"]["id"], TEST_RP_ID);
    assert_eq!(options["user"]["name"], TEST_EMAIL);
    assert_eq!(options["pubKeyCredParams"][0]["alg"], -7);
    let challenge = options["challenge"].as_str().unwrap().to_string();

    let payload = authenticator.registration_payload(TEST_RP_ID, TEST_ORIGIN, &challenge);
    let resp = test::call_service(&app, post_payload("/register/finish", payload).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["authenticatorName"], "YubiKey 5 NFC");

    let options: Value = test::call_and_read_body_json(
        &app,
        post_json("/login/begin", &json!({ "email": TEST_EMAIL })).to_request(),
    )
    .await;
    assert_eq!(
        options["allowCredentials"][0]["id"],
        authenticator.credential_id_base64url()
    );
    let challenge = options["challenge"].as_str().unwrap().to_string();

    let payload = authenticator.assertion_payload(TEST_RP_ID, TEST_ORIGIN, &challenge);
    let resp = test::call_service(&app, post_payload("/login/finish", payload.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["userVerified"], true);
    assert_eq!(body["username"], TEST_USER_NAME);

    // the challenge was consumed by the first attempt
    let resp = test::call_service(&app, post_payload("/login/finish", payload).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "challenge_not_found");
}

#[actix_web::test]
async fn test_duplicate_registration_conflicts() {
    let app = init_app!();
    let authenticator = TestAuthenticator::es256();

    let options: Value =
        test::call_and_read_body_json(&app, post_json("/register/begin", &registration_body()).to_request())
            .await;
    let challenge = options["challenge"].as_str().unwrap().to_string();
    let payload = authenticator.registration_payload(TEST_RP_ID, TEST_ORIGIN, &challenge);
    let resp = test::call_service(&app, post_payload("/register/finish", payload).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, post_json("/register/begin", &registration_body()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_failed_registration_reports_generic_error() {
    let app = init_app!();
    let authenticator = TestAuthenticator::es256();

    let options: Value =
        test::call_and_read_body_json(&app, post_json("/register/begin", &registration_body()).to_request())
            .await;
    let challenge = options["challenge"].as_str().unwrap().to_string();
    let payload =
        authenticator.registration_payload(TEST_RP_ID, "https://evil.example.com", &challenge);
    let resp = test::call_service(&app, post_payload("/register/finish", payload).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "registration_failed");

    // an abandoned registration can be restarted
    let resp = test::call_service(&app, post_json("/register/begin", &registration_body()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_unknown_challenge_is_rejected() {
    let app = init_app!();
    let authenticator = TestAuthenticator::es256();
    let payload = authenticator.registration_payload(TEST_RP_ID, TEST_ORIGIN, "never-issued");
    let resp = test::call_service(&app, post_payload("/register/finish", payload).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "challenge_not_found");
}

#[actix_web::test]
async fn test_request_validation() {
    let app = init_app!();

    let resp = test::call_service(
        &app,
        post_json("/register/begin", &json!({ "username": "", "email": TEST_EMAIL })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, post_payload("/login/finish", "{".to_string()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_login_begin_does_not_reveal_unknown_users() {
    let app = init_app!();

    // registered name without a credential yet
    let resp =
        test::call_service(&app, post_json("/register/begin", &registration_body()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(
        &app,
        post_json("/login/begin", &json!({ "email": TEST_EMAIL })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let known: Value = test::read_body_json(resp).await;

    let resp = test::call_service(
        &app,
        post_json("/login/begin", &json!({ "email": "nobody@example.com" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let unknown: Value = test::read_body_json(resp).await;
    assert_eq!(unknown, known);
    assert_eq!(unknown["error"], "invalid_request");
}

#[actix_web::test]
async fn test_sign_count_store_failure_fails_login() {
    let app = init_app!(Arc::new(FailingCounterStore {
        inner: InMemoryCredentialStore::new(),
        conflict: false,
    }));
    let (status, body) = login_status!(app);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
}

#[actix_web::test]
async fn test_concurrent_counter_change_fails_login() {
    let app = init_app!(Arc::new(FailingCounterStore {
        inner: InMemoryCredentialStore::new(),
        conflict: true,
    }));
    let (status, body) = login_status!(app);
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication_failed");
    assert!(body.get("success").is_none());
}

#[actix_web::test]
async fn test_health_endpoint() {
    let app = init_app!();
    let req = test::TestRequest::get().uri("/ping").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}
