//! Test fixtures providing pre-built test objects
//!
//! [`TestAuthenticator`] is a software authenticator backed by `ring` key
//! pairs. It produces registration and assertion payloads that pass the
//! ceremony checks, which tests then corrupt one field at a time.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::value::Value;
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING,
};
use serde_json::json;
use uuid::Uuid;

use crate::settings::Settings;
use crate::webauthn::{
    cbor, signed_message, AaguidRegistry, AttestationPreference, LoginData, RegistrationData,
    RelyingPartyConfig, UserEntity, UserVerificationRequirement, WebAuthnService,
};

use super::builders::{AttestationObjectBuilder, AuthenticatorDataBuilder, ClientDataBuilder};
use super::constants::{
    TEST_AAGUID, TEST_EMAIL, TEST_ORIGIN, TEST_RP_ID, TEST_RP_NAME, TEST_USER_NAME,
};

enum SigningKey {
    P256(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

/// Software authenticator holding one credential
pub struct TestAuthenticator {
    key: SigningKey,
    rng: SystemRandom,
    credential_id: Vec<u8>,
    aaguid: Uuid,
    sign_count: u32,
    user_verified: bool,
}

impl TestAuthenticator {
    /// ES256 authenticator with a fresh P-256 key
    ///
    /// # Panics
    /// Panics if key generation fails.
    #[must_use]
    pub fn es256() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .expect("Failed to generate P-256 key");
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
            .expect("Failed to load P-256 key");
        Self::with_key(SigningKey::P256(pair), rng)
    }

    /// EdDSA authenticator with a fresh Ed25519 key
    ///
    /// # Panics
    /// Panics if key generation fails.
    #[must_use]
    pub fn ed25519() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("Failed to generate Ed25519 key");
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("Failed to load Ed25519 key");
        Self::with_key(SigningKey::Ed25519(pair), rng)
    }

    fn with_key(key: SigningKey, rng: SystemRandom) -> Self {
        Self {
            key,
            rng,
            credential_id: Uuid::new_v4().as_bytes().to_vec(),
            aaguid: Uuid::parse_str(TEST_AAGUID).unwrap_or_default(),
            sign_count: 0,
            user_verified: true,
        }
    }

    #[must_use]
    pub fn with_aaguid(mut self, aaguid: Uuid) -> Self {
        self.aaguid = aaguid;
        self
    }

    #[must_use]
    pub fn with_sign_count(mut self, sign_count: u32) -> Self {
        self.sign_count = sign_count;
        self
    }

    /// Report the UV flag on future ceremonies
    #[must_use]
    pub fn with_user_verification(mut self, user_verified: bool) -> Self {
        self.user_verified = user_verified;
        self
    }

    #[must_use]
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    #[must_use]
    pub fn credential_id_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.credential_id)
    }

    #[must_use]
    pub const fn aaguid(&self) -> Uuid {
        self.aaguid
    }

    #[must_use]
    pub const fn sign_count(&self) -> u32 {
        self.sign_count
    }

    /// COSE encoding of the public key
    ///
    /// # Panics
    /// Panics if CBOR encoding fails.
    #[must_use]
    pub fn cose_key(&self) -> Vec<u8> {
        let int = |n: i64| Value::Integer(n.into());
        let map = match &self.key {
            SigningKey::P256(pair) => {
                // SEC1 uncompressed: 0x04 || x || y
                let point = pair.public_key().as_ref();
                vec![
                    (int(1), int(2)),
                    (int(3), int(-7)),
                    (int(-1), int(1)),
                    (int(-2), Value::Bytes(point[1..33].to_vec())),
                    (int(-3), Value::Bytes(point[33..65].to_vec())),
                ]
            }
            SigningKey::Ed25519(pair) => vec![
                (int(1), int(1)),
                (int(3), int(-8)),
                (int(-1), int(6)),
                (int(-2), Value::Bytes(pair.public_key().as_ref().to_vec())),
            ],
        };
        cbor::encode(&Value::Map(map)).expect("Failed to encode COSE key")
    }

    /// Sign `message` with the credential key
    ///
    /// # Panics
    /// Panics if signing fails.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.key {
            SigningKey::P256(pair) => pair
                .sign(&self.rng, message)
                .expect("Failed to sign")
                .as_ref()
                .to_vec(),
            SigningKey::Ed25519(pair) => pair.sign(message).as_ref().to_vec(),
        }
    }

    /// Authenticator data for a new credential scoped to `rp_id`
    #[must_use]
    pub fn registration_auth_data(&self, rp_id: &str) -> AuthenticatorDataBuilder {
        AuthenticatorDataBuilder::new(rp_id)
            .user_verified(self.user_verified)
            .sign_count(self.sign_count)
            .attested_credential(self.aaguid, &self.credential_id, &self.cose_key())
    }

    /// Output of `navigator.credentials.create()` for `challenge`
    #[must_use]
    pub fn make_credential(&self, rp_id: &str, origin: &str, challenge: &str) -> RegistrationData {
        let auth_data = self.registration_auth_data(rp_id).build();
        RegistrationData {
            client_data_json: ClientDataBuilder::create(challenge)
                .origin(origin)
                .build_base64url(),
            attestation_object: AttestationObjectBuilder::new(auth_data).build_base64url(),
        }
    }

    /// Flattened JSON body for a registration, as the demo page posts it
    #[must_use]
    pub fn registration_payload(&self, rp_id: &str, origin: &str, challenge: &str) -> String {
        let data = self.make_credential(rp_id, origin, challenge);
        let id = self.credential_id_base64url();
        json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "attestationObject": data.attestation_object,
            "clientDataJSON": data.client_data_json,
        })
        .to_string()
    }

    /// Produce an assertion signed over `auth_data`
    ///
    /// The returned `LoginData` carries this authenticator's public key and
    /// the given stored counter.
    #[must_use]
    pub fn assert_with(
        &self,
        auth_data: &[u8],
        client_data: &ClientDataBuilder,
        stored_sign_count: u32,
    ) -> LoginData {
        let client_data_json = client_data.build();
        let signature = self.sign(&signed_message(auth_data, &client_data_json));
        LoginData {
            client_data_json: URL_SAFE_NO_PAD.encode(&client_data_json),
            authenticator_data: URL_SAFE_NO_PAD.encode(auth_data),
            signature: URL_SAFE_NO_PAD.encode(signature),
            stored_sign_count,
            public_key: self.cose_key(),
        }
    }

    /// Output of `navigator.credentials.get()`, advancing the counter
    #[must_use]
    pub fn get_assertion(
        &mut self,
        rp_id: &str,
        origin: &str,
        challenge: &str,
        stored_sign_count: u32,
    ) -> LoginData {
        self.sign_count += 1;
        let auth_data = AuthenticatorDataBuilder::new(rp_id)
            .user_verified(self.user_verified)
            .sign_count(self.sign_count)
            .build();
        self.assert_with(
            &auth_data,
            &ClientDataBuilder::get(challenge).origin(origin),
            stored_sign_count,
        )
    }

    /// Flattened JSON body for an assertion, as the demo page posts it
    #[must_use]
    pub fn assertion_payload(&mut self, rp_id: &str, origin: &str, challenge: &str) -> String {
        let data = self.get_assertion(rp_id, origin, challenge, 0);
        let id = self.credential_id_base64url();
        json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "authenticatorData": data.authenticator_data,
            "clientDataJSON": data.client_data_json,
            "signature": data.signature,
            "userHandle": null,
        })
        .to_string()
    }
}

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Relying party configuration for `example.com`
    #[must_use]
    pub fn config() -> RelyingPartyConfig {
        RelyingPartyConfig {
            rp_id: TEST_RP_ID.to_string(),
            rp_display_name: TEST_RP_NAME.to_string(),
            rp_origins: vec![TEST_ORIGIN.to_string()],
            timeout_ms: 60_000,
            user_verification: UserVerificationRequirement::Preferred,
            attestation: AttestationPreference::None,
        }
    }

    /// Service over [`Self::config`] with the bundled AAGUID table
    #[must_use]
    pub fn service() -> WebAuthnService {
        Self::service_with(Self::config())
    }

    /// # Panics
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn service_with(config: RelyingPartyConfig) -> WebAuthnService {
        let aaguids = AaguidRegistry::bundled().expect("Bundled AAGUID table is valid");
        WebAuthnService::new(config, Arc::new(aaguids)).expect("Test configuration is valid")
    }

    #[must_use]
    pub fn user() -> UserEntity {
        UserEntity {
            id: TEST_EMAIL.as_bytes().to_vec(),
            name: TEST_EMAIL.to_string(),
            display_name: TEST_USER_NAME.to_string(),
        }
    }

    /// Demo server settings matching [`Self::config`]
    #[must_use]
    pub fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.webauthn.rp_id = TEST_RP_ID.to_string();
        settings.webauthn.rp_name = TEST_RP_NAME.to_string();
        settings.webauthn.rp_origins = vec![TEST_ORIGIN.to_string()];
        settings
    }

    /// A valid registration for a fresh ES256 authenticator
    #[must_use]
    pub fn registration_data(challenge: &str) -> (TestAuthenticator, RegistrationData) {
        let authenticator = TestAuthenticator::es256();
        let data = authenticator.make_credential(TEST_RP_ID, TEST_ORIGIN, challenge);
        (authenticator, data)
    }

    /// A valid assertion for `authenticator` against `stored_sign_count`
    #[must_use]
    pub fn login_data(
        authenticator: &mut TestAuthenticator,
        challenge: &str,
        stored_sign_count: u32,
    ) -> LoginData {
        authenticator.get_assertion(TEST_RP_ID, TEST_ORIGIN, challenge, stored_sign_count)
    }
}
