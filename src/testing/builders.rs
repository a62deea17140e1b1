//! Fluent builders for authenticator output
//!
//! These produce the raw bytes and base64url strings a browser and
//! authenticator would send, with every field overridable so tests can
//! construct malformed or hostile inputs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::value::Value;
use serde_json::json;
use uuid::Uuid;

use crate::webauthn::authenticator_data::AuthenticatorFlags;
use crate::webauthn::cbor;
use crate::webauthn::crypto::sha256;

use super::constants::{TEST_ORIGIN, TEST_RP_ID};

/// Builder for raw authenticator data
#[derive(Debug, Clone)]
pub struct AuthenticatorDataBuilder {
    rp_id_hash: [u8; 32],
    flags: u8,
    sign_count: u32,
    attested: Option<(Uuid, Vec<u8>, Vec<u8>)>,
    extensions: Option<Vec<u8>>,
}

impl AuthenticatorDataBuilder {
    /// Header for `rp_id` with only the UP flag set
    #[must_use]
    pub fn new(rp_id: &str) -> Self {
        Self {
            rp_id_hash: sha256(rp_id.as_bytes()),
            flags: AuthenticatorFlags::USER_PRESENT,
            sign_count: 0,
            attested: None,
            extensions: None,
        }
    }

    #[must_use]
    pub fn rp_id_hash(mut self, hash: [u8; 32]) -> Self {
        self.rp_id_hash = hash;
        self
    }

    /// Replace the whole flag byte
    #[must_use]
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn user_present(mut self, present: bool) -> Self {
        self.set_flag(AuthenticatorFlags::USER_PRESENT, present);
        self
    }

    #[must_use]
    pub fn user_verified(mut self, verified: bool) -> Self {
        self.set_flag(AuthenticatorFlags::USER_VERIFIED, verified);
        self
    }

    #[must_use]
    pub fn sign_count(mut self, sign_count: u32) -> Self {
        self.sign_count = sign_count;
        self
    }

    /// Append attested credential data and set AT
    #[must_use]
    pub fn attested_credential(
        mut self,
        aaguid: Uuid,
        credential_id: &[u8],
        cose_key: &[u8],
    ) -> Self {
        self.set_flag(AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA, true);
        self.attested = Some((aaguid, credential_id.to_vec(), cose_key.to_vec()));
        self
    }

    /// Append raw extension bytes and set ED
    #[must_use]
    pub fn extensions(mut self, extensions: &[u8]) -> Self {
        self.set_flag(AuthenticatorFlags::EXTENSION_DATA, true);
        self.extensions = Some(extensions.to_vec());
        self
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// # Panics
    /// Panics if the credential ID is longer than `u16::MAX` bytes.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut data = self.rp_id_hash.to_vec();
        data.push(self.flags);
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some((aaguid, credential_id, cose_key)) = &self.attested {
            let len = u16::try_from(credential_id.len()).expect("credential ID fits in u16");
            data.extend_from_slice(aaguid.as_bytes());
            data.extend_from_slice(&len.to_be_bytes());
            data.extend_from_slice(credential_id);
            data.extend_from_slice(cose_key);
        }
        if let Some(extensions) = &self.extensions {
            data.extend_from_slice(extensions);
        }
        data
    }

    #[must_use]
    pub fn build_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.build())
    }
}

/// Builder for CBOR attestation objects
#[derive(Debug, Clone)]
pub struct AttestationObjectBuilder {
    fmt: String,
    auth_data: Vec<u8>,
    att_stmt: Vec<(Value, Value)>,
}

impl AttestationObjectBuilder {
    /// A "none" attestation wrapping `auth_data`
    #[must_use]
    pub fn new(auth_data: Vec<u8>) -> Self {
        Self {
            fmt: "none".to_string(),
            auth_data,
            att_stmt: Vec::new(),
        }
    }

    #[must_use]
    pub fn fmt(mut self, fmt: &str) -> Self {
        self.fmt = fmt.to_string();
        self
    }

    #[must_use]
    pub fn statement_entry(mut self, key: &str, value: Value) -> Self {
        self.att_stmt.push((Value::Text(key.to_string()), value));
        self
    }

    /// # Panics
    /// Panics if CBOR encoding fails.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        cbor::encode(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(self.fmt.clone())),
            (
                Value::Text("attStmt".into()),
                Value::Map(self.att_stmt.clone()),
            ),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.auth_data.clone()),
            ),
        ]))
        .expect("Failed to encode attestation object")
    }

    #[must_use]
    pub fn build_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.build())
    }
}

/// Builder for client data JSON
#[derive(Debug, Clone)]
pub struct ClientDataBuilder {
    type_: String,
    challenge: String,
    origin: String,
    cross_origin: Option<bool>,
}

impl ClientDataBuilder {
    #[must_use]
    pub fn create(challenge: &str) -> Self {
        Self::with_type("webauthn.create", challenge)
    }

    #[must_use]
    pub fn get(challenge: &str) -> Self {
        Self::with_type("webauthn.get", challenge)
    }

    #[must_use]
    pub fn with_type(type_: &str, challenge: &str) -> Self {
        Self {
            type_: type_.to_string(),
            challenge: challenge.to_string(),
            origin: TEST_ORIGIN.to_string(),
            cross_origin: None,
        }
    }

    #[must_use]
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    #[must_use]
    pub fn cross_origin(mut self, cross_origin: bool) -> Self {
        self.cross_origin = Some(cross_origin);
        self
    }

    /// Raw JSON bytes, in the key order browsers use
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut value = json!({
            "type": self.type_,
            "challenge": self.challenge,
            "origin": self.origin,
        });
        if let (Some(cross_origin), Some(map)) = (self.cross_origin, value.as_object_mut()) {
            map.insert("crossOrigin".to_string(), json!(cross_origin));
        }
        value.to_string().into_bytes()
    }

    #[must_use]
    pub fn build_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.build())
    }
}

impl Default for AuthenticatorDataBuilder {
    fn default() -> Self {
        Self::new(TEST_RP_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::{AttestationObject, ClientData, ParsedAuthenticatorData};

    #[test]
    fn test_authenticator_data_builder_output_parses() {
        let data = AuthenticatorDataBuilder::default()
            .user_verified(true)
            .sign_count(9)
            .build();
        let parsed = ParsedAuthenticatorData::parse(&data).unwrap();
        assert!(parsed.flags.user_present());
        assert!(parsed.flags.user_verified());
        assert_eq!(parsed.sign_count, 9);
        assert_eq!(parsed.rp_id_hash, sha256(TEST_RP_ID.as_bytes()));
    }

    #[test]
    fn test_attestation_builder_output_decodes() {
        let bytes = AttestationObjectBuilder::new(vec![1, 2])
            .fmt("packed")
            .statement_entry("alg", Value::Integer((-7).into()))
            .build();
        let decoded = AttestationObject::decode(&bytes).unwrap();
        assert_eq!(decoded.fmt, "packed");
        assert_eq!(decoded.auth_data, vec![1, 2]);
        assert_eq!(decoded.att_stmt.len(), 1);
    }

    #[test]
    fn test_client_data_builder() {
        let raw = ClientDataBuilder::get("abc").cross_origin(false).build();
        let parsed = ClientData::from_json(&raw).unwrap();
        assert_eq!(parsed.type_, "webauthn.get");
        assert_eq!(parsed.origin, TEST_ORIGIN);
        assert_eq!(parsed.cross_origin, Some(false));
    }
}
