//! Client data JSON handling

use serde::{Deserialize, Serialize};

use super::crypto::decode_base64url;
use super::errors::WebAuthnError;

/// `type` of client data produced by `navigator.credentials.create()`
pub const TYPE_CREATE: &str = "webauthn.create";
/// `type` of client data produced by `navigator.credentials.get()`
pub const TYPE_GET: &str = "webauthn.get";

/// Browser-side context signed over by the authenticator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(rename = "type")]
    pub type_: String,
    pub challenge: String,
    pub origin: String,
    #[serde(rename = "crossOrigin", default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
}

impl ClientData {
    /// Decode base64url client data and parse it
    ///
    /// Returns the parsed data together with the raw JSON bytes, which are
    /// what the assertion signature covers.
    ///
    /// # Errors
    /// Returns `ParseClientData` if decoding or JSON parsing fails.
    pub fn from_base64url(encoded: &str) -> Result<(Self, Vec<u8>), WebAuthnError> {
        let raw = decode_base64url(encoded).map_err(|e| WebAuthnError::ParseClientData {
            source: Box::new(e),
        })?;
        let parsed = Self::from_json(&raw)?;
        Ok((parsed, raw))
    }

    /// Parse raw client data JSON
    ///
    /// # Errors
    /// Returns `ParseClientData` if the JSON does not match the schema.
    pub fn from_json(raw: &[u8]) -> Result<Self, WebAuthnError> {
        serde_json::from_slice(raw).map_err(|e| WebAuthnError::ParseClientData {
            source: Box::new(e),
        })
    }

    /// Require an exact ceremony type
    ///
    /// # Errors
    /// Returns `TypeMismatch` when the type differs.
    pub fn expect_type(&self, expected: &'static str) -> Result<(), WebAuthnError> {
        if self.type_ == expected {
            Ok(())
        } else {
            Err(WebAuthnError::TypeMismatch {
                expected,
                actual: self.type_.clone(),
            })
        }
    }
}
