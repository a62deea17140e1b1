//! `WebAuthn` ceremony data model
//!
//! Option and result records exchanged with the client, using the
//! `WebAuthn` JSON field names. Binary fields travel as unpadded base64url.

use serde::{Deserialize, Serialize};

use super::config::{AttestationPreference, UserVerificationRequirement};
use super::cose::CoseAlgorithm;

/// Credential type used in every parameter and descriptor
pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

/// Serde adapter for byte fields carried as base64url text
pub mod base64url_bytes {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    /// Never fails on its own; propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    /// # Errors
    /// Returns an error if the text is not unpadded base64url.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// The registering or authenticating principal
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserEntity {
    /// Opaque user handle chosen by the caller
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Relying party identity sent with registration options
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

/// Algorithm offered in `pubKeyCredParams`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CredentialParameter {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i64,
}

impl CredentialParameter {
    #[must_use]
    pub fn public_key(algorithm: CoseAlgorithm) -> Self {
        Self {
            type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            alg: algorithm.id(),
        }
    }
}

/// Options for `navigator.credentials.create()`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BeginRegistrationOptions {
    pub challenge: String,
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    #[serde(rename = "pubKeyCredParams")]
    pub pub_key_cred_params: Vec<CredentialParameter>,
    pub timeout: u32,
    pub attestation: AttestationPreference,
    #[serde(rename = "userVerification")]
    pub user_verification: UserVerificationRequirement,
}

/// Entry of `allowCredentials`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: String,
    /// Base64url-encoded credential ID
    pub id: String,
}

impl PublicKeyCredentialDescriptor {
    #[must_use]
    pub fn public_key(id: impl Into<String>) -> Self {
        Self {
            type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            id: id.into(),
        }
    }
}

/// Options for `navigator.credentials.get()`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublicKeyCredentialRequestOptions {
    pub challenge: String,
    pub timeout: u32,
    #[serde(rename = "rpId")]
    pub rp_id: String,
    #[serde(rename = "allowCredentials")]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(rename = "userVerification")]
    pub user_verification: UserVerificationRequirement,
}

/// Input of the registration finish step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegistrationData {
    /// Base64url-encoded client data JSON
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    /// Base64url-encoded CBOR attestation object
    #[serde(rename = "attestationObject")]
    pub attestation_object: String,
}

/// A newly registered credential
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegistrationResult {
    /// Base64url-encoded credential ID
    #[serde(rename = "credentialId")]
    pub credential_id: String,
    /// COSE-encoded public key
    #[serde(rename = "publicKey", with = "base64url_bytes")]
    pub public_key: Vec<u8>,
    pub aaguid: String,
    #[serde(rename = "authenticatorName")]
    pub authenticator_name: String,
    #[serde(rename = "signCount")]
    pub sign_count: u32,
}

/// Input of the login finish step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LoginData {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: String,
    pub signature: String,
    /// Counter persisted after the previous successful ceremony
    #[serde(rename = "storedSignCount")]
    pub stored_sign_count: u32,
    /// COSE public key stored at registration
    #[serde(rename = "publicKey", with = "base64url_bytes")]
    pub public_key: Vec<u8>,
}

/// Result of a successful assertion; the caller must persist `new_sign_count`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationOutput {
    #[serde(rename = "newSignCount")]
    pub new_sign_count: u32,
    #[serde(rename = "userVerified")]
    pub user_verified: bool,
}
