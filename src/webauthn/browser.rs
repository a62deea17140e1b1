//! Credential payloads posted by the browser
//!
//! The client script flattens `PublicKeyCredential` into JSON with
//! base64url-encoded buffers. Parsing also decodes the embedded client
//! data so the caller can look up the stored challenge before running the
//! ceremony.

use serde::Deserialize;
use thiserror::Error;

use super::client_data::ClientData;
use super::crypto::{decode_base64url, Base64UrlError};
use super::types::{LoginData, RegistrationData};

/// Failure to parse a browser payload
#[derive(Debug, Error)]
pub enum BrowserPayloadError {
    #[error("failed to unmarshal credential payload")]
    Unmarshal(#[source] serde_json::Error),
    #[error("failed to decode client data")]
    DecodeClientData(#[source] Base64UrlError),
    #[error("failed to parse client data")]
    ParseClientData(#[source] serde_json::Error),
}

fn decode_client_data(encoded: &str) -> Result<ClientData, BrowserPayloadError> {
    let raw = decode_base64url(encoded).map_err(BrowserPayloadError::DecodeClientData)?;
    serde_json::from_slice(&raw).map_err(BrowserPayloadError::ParseClientData)
}

#[derive(Deserialize)]
struct RawCredential {
    id: String,
    #[serde(rename = "attestationObject")]
    attestation_object: String,
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
}

/// Result of `navigator.credentials.create()`
#[derive(Debug, Clone)]
pub struct PublicKeyCredential {
    pub id: String,
    pub attestation_object: String,
    pub client_data_json: String,
    client_data: ClientData,
}

impl PublicKeyCredential {
    /// Parse the JSON body posted at the end of registration
    ///
    /// # Errors
    /// Returns an error if the body or its embedded client data is malformed.
    pub fn parse(body: &[u8]) -> Result<Self, BrowserPayloadError> {
        let raw: RawCredential =
            serde_json::from_slice(body).map_err(BrowserPayloadError::Unmarshal)?;
        let client_data = decode_client_data(&raw.client_data_json)?;
        Ok(Self {
            id: raw.id,
            attestation_object: raw.attestation_object,
            client_data_json: raw.client_data_json,
            client_data,
        })
    }

    #[must_use]
    pub fn client_data(&self) -> &ClientData {
        &self.client_data
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.client_data.challenge
    }

    #[must_use]
    pub fn to_registration_data(&self) -> RegistrationData {
        RegistrationData {
            client_data_json: self.client_data_json.clone(),
            attestation_object: self.attestation_object.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RawAssertion {
    id: String,
    #[serde(rename = "type", default)]
    type_: Option<String>,
    #[serde(rename = "authenticatorData")]
    authenticator_data: String,
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    signature: String,
    #[serde(rename = "userHandle", default)]
    user_handle: Option<String>,
}

/// Result of `navigator.credentials.get()`
#[derive(Debug, Clone)]
pub struct PublicKeyCredentialAssertion {
    pub id: String,
    pub type_: Option<String>,
    pub authenticator_data: String,
    pub client_data_json: String,
    pub signature: String,
    pub user_handle: Option<String>,
    client_data: ClientData,
}

impl PublicKeyCredentialAssertion {
    /// Parse the JSON body posted at the end of login
    ///
    /// # Errors
    /// Returns an error if the body or its embedded client data is malformed.
    pub fn parse(body: &[u8]) -> Result<Self, BrowserPayloadError> {
        let raw: RawAssertion =
            serde_json::from_slice(body).map_err(BrowserPayloadError::Unmarshal)?;
        let client_data = decode_client_data(&raw.client_data_json)?;
        Ok(Self {
            id: raw.id,
            type_: raw.type_,
            authenticator_data: raw.authenticator_data,
            client_data_json: raw.client_data_json,
            signature: raw.signature,
            user_handle: raw.user_handle,
            client_data,
        })
    }

    #[must_use]
    pub fn client_data(&self) -> &ClientData {
        &self.client_data
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.client_data.challenge
    }

    /// Combine the assertion with the stored credential state
    #[must_use]
    pub fn to_login_data(&self, stored_sign_count: u32, public_key: Vec<u8>) -> LoginData {
        LoginData {
            client_data_json: self.client_data_json.clone(),
            authenticator_data: self.authenticator_data.clone(),
            signature: self.signature.clone(),
            stored_sign_count,
            public_key,
        }
    }
}
