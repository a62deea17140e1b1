//! `WebAuthn` service implementation
//!
//! This module provides the relying party engine, handling registration and
//! authentication ceremonies. The service holds only immutable configuration
//! and can be shared freely between threads.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::debug;

use super::aaguid::AaguidRegistry;
use super::assertion;
use super::attestation::AttestationObject;
use super::authenticator_data::ParsedAuthenticatorData;
use super::client_data::{ClientData, TYPE_CREATE};
use super::config::{OriginValidator, RelyingPartyConfig, UserVerificationRequirement};
use super::cose::{CoseAlgorithm, CoseKey};
use super::crypto::{self, decode_base64url};
use super::errors::WebAuthnError;
use super::types::{
    BeginRegistrationOptions, CredentialParameter, LoginData, PublicKeyCredentialDescriptor,
    PublicKeyCredentialRequestOptions, RegistrationData, RegistrationResult, RelyingPartyEntity,
    UserEntity, ValidationOutput,
};

/// Algorithms offered at registration, in order of preference
pub const OFFERED_ALGORITHMS: [CoseAlgorithm; 2] = [CoseAlgorithm::Es256, CoseAlgorithm::Rs256];

/// Relying party ceremony engine
#[derive(Debug, Clone)]
pub struct WebAuthnService {
    config: RelyingPartyConfig,
    origins: OriginValidator,
    aaguids: Arc<AaguidRegistry>,
}

impl WebAuthnService {
    /// Create a service from a relying party configuration
    ///
    /// # Errors
    /// Returns a configuration error if the RP ID, display name, timeout or
    /// origins are invalid.
    pub fn new(
        config: RelyingPartyConfig,
        aaguids: Arc<AaguidRegistry>,
    ) -> Result<Self, WebAuthnError> {
        let origins = config.validate()?;
        debug!(
            "WebAuthn service configured for RP {} with {} origin(s)",
            config.rp_id,
            origins.allowed().len()
        );
        Ok(Self {
            config,
            origins,
            aaguids,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.config.rp_id
    }

    #[must_use]
    pub fn aaguids(&self) -> &AaguidRegistry {
        &self.aaguids
    }

    /// Check an origin against the configured list
    ///
    /// # Errors
    /// Returns `OriginParse` or `OriginNotAllowed`.
    pub fn is_allowed_origin(&self, origin: &str) -> Result<bool, WebAuthnError> {
        self.origins.is_allowed_origin(origin)
    }

    /// Create registration options for a new credential
    ///
    /// The returned challenge must be stored by the caller and consumed by
    /// exactly one `finish_registration`.
    ///
    /// # Errors
    /// Returns `RandomSource` if no challenge can be generated.
    pub fn begin_registration(
        &self,
        user: UserEntity,
    ) -> Result<BeginRegistrationOptions, WebAuthnError> {
        let challenge = crypto::generate_challenge()?;
        Ok(BeginRegistrationOptions {
            challenge,
            rp: RelyingPartyEntity {
                id: self.config.rp_id.clone(),
                name: self.config.rp_display_name.clone(),
            },
            user,
            pub_key_cred_params: OFFERED_ALGORITHMS
                .into_iter()
                .map(CredentialParameter::public_key)
                .collect(),
            timeout: self.config.timeout_ms,
            attestation: self.config.attestation,
            user_verification: self.config.user_verification,
        })
    }

    /// Complete registration with the client response
    ///
    /// Challenge correlation is the caller's job; this validates everything
    /// else about the new credential.
    ///
    /// # Errors
    /// Returns a `WebAuthnError` for the first check that fails.
    pub fn finish_registration(
        &self,
        data: &RegistrationData,
    ) -> Result<RegistrationResult, WebAuthnError> {
        self.validate_registration(data).inspect_err(|e| {
            debug!(
                "Registration failed for RP {} ({:?}): {e}",
                self.config.rp_id,
                e.kind()
            );
        })
    }

    fn validate_registration(
        &self,
        data: &RegistrationData,
    ) -> Result<RegistrationResult, WebAuthnError> {
        let (client_data, _) = ClientData::from_base64url(&data.client_data_json)?;
        client_data.expect_type(TYPE_CREATE)?;
        self.origins.is_allowed_origin(&client_data.origin)?;

        let attestation_bytes = decode_base64url(&data.attestation_object).map_err(|e| {
            WebAuthnError::AttestationDecode {
                source: Box::new(e),
            }
        })?;
        let attestation = AttestationObject::decode(&attestation_bytes)?;
        let format = attestation.format()?;

        let auth_data = ParsedAuthenticatorData::parse(&attestation.auth_data)?;
        if !crypto::rp_id_hash_matches(&self.config.rp_id, &auth_data.rp_id_hash) {
            return Err(WebAuthnError::RpIdHashMismatch);
        }
        if !auth_data.flags.user_present() {
            return Err(WebAuthnError::UserPresentFlagNotSet);
        }
        if self.config.user_verification == UserVerificationRequirement::Required
            && !auth_data.flags.user_verified()
        {
            return Err(WebAuthnError::UserVerifiedFlagNotSet);
        }

        let public_key = auth_data
            .public_key()
            .ok_or(WebAuthnError::MissingPublicKey)?;
        let key = CoseKey::from_bytes(public_key).map_err(|e| WebAuthnError::InvalidPublicKey {
            source: Box::new(e),
        })?;
        let credential_id = auth_data
            .credential_id()
            .filter(|id| !id.is_empty())
            .ok_or(WebAuthnError::MissingCredentialId)?;
        // present whenever a credential ID is
        let aaguid = auth_data.aaguid().unwrap_or_default();
        let authenticator_name = self.aaguids.resolve(&aaguid).to_string();

        debug!(
            "Registered {:?} credential with {format} attestation from {authenticator_name}",
            key.algorithm()
        );

        Ok(RegistrationResult {
            credential_id: URL_SAFE_NO_PAD.encode(credential_id),
            public_key: public_key.to_vec(),
            aaguid: aaguid.hyphenated().to_string(),
            authenticator_name,
            sign_count: auth_data.sign_count,
        })
    }

    /// Create request options for an assertion
    ///
    /// # Errors
    /// Returns `RandomSource` if no challenge can be generated.
    pub fn begin_login(
        &self,
        allowed_credential_ids: &[String],
    ) -> Result<PublicKeyCredentialRequestOptions, WebAuthnError> {
        let challenge = crypto::generate_challenge()?;
        Ok(PublicKeyCredentialRequestOptions {
            challenge,
            timeout: self.config.timeout_ms,
            rp_id: self.config.rp_id.clone(),
            allow_credentials: allowed_credential_ids
                .iter()
                .map(|id| PublicKeyCredentialDescriptor::public_key(id.as_str()))
                .collect(),
            user_verification: self.config.user_verification,
        })
    }

    /// Complete an assertion against a stored public key and counter
    ///
    /// # Errors
    /// Returns a `WebAuthnError` for the first check that fails.
    pub fn finish_login(&self, data: &LoginData) -> Result<ValidationOutput, WebAuthnError> {
        assertion::validate_assertion(&self.config.rp_id, &self.origins, data).inspect_err(|e| {
            debug!(
                "Login failed for RP {} ({:?}): {e}",
                self.config.rp_id,
                e.kind()
            );
        })
    }
}
