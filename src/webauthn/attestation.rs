//! `WebAuthn` attestation object decoding
//!
//! The attestation object is a CBOR map `{fmt, authData, attStmt}`. Only the
//! format name is checked; the statement itself is kept opaque.

use std::fmt;
use std::str::FromStr;

use ciborium::value::Value;

use super::cbor::{self, CborError};
use super::errors::WebAuthnError;

/// Attestation statement formats accepted at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationFormat {
    None,
    Indirect,
    Packed,
}

impl AttestationFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Indirect => "indirect",
            Self::Packed => "packed",
        }
    }
}

impl FromStr for AttestationFormat {
    type Err = WebAuthnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "indirect" => Ok(Self::Indirect),
            "packed" => Ok(Self::Packed),
            other => Err(WebAuthnError::UnsupportedAttestationFormat(other.to_string())),
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded attestation object with the format name still unchecked
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub fmt: String,
    pub auth_data: Vec<u8>,
    pub att_stmt: Vec<(Value, Value)>,
}

impl AttestationObject {
    /// Decode the CBOR attestation object
    ///
    /// # Errors
    /// Returns `AttestationDecode` if the bytes are not a CBOR map holding a
    /// text `fmt`, a byte string `authData` and a map `attStmt`.
    pub fn decode(bytes: &[u8]) -> Result<Self, WebAuthnError> {
        decode_fields(bytes).map_err(|e| WebAuthnError::AttestationDecode {
            source: Box::new(e),
        })
    }

    /// Check the format name against the supported set
    ///
    /// # Errors
    /// Returns `UnsupportedAttestationFormat` for any other format.
    pub fn format(&self) -> Result<AttestationFormat, WebAuthnError> {
        self.fmt.parse()
    }
}

fn decode_fields(bytes: &[u8]) -> Result<AttestationObject, CborError> {
    let Value::Map(map) = cbor::decode_exact(bytes)? else {
        return Err(CborError::Shape("attestation object is not a map"));
    };
    let fmt = cbor::get_text_key(&map, "fmt")
        .and_then(Value::as_text)
        .ok_or(CborError::Shape("missing fmt"))?
        .to_string();
    let auth_data = cbor::get_text_key(&map, "authData")
        .and_then(Value::as_bytes)
        .ok_or(CborError::Shape("missing authData"))?
        .clone();
    let att_stmt = match cbor::get_text_key(&map, "attStmt") {
        Some(Value::Map(statement)) => statement.clone(),
        Some(_) => return Err(CborError::Shape("attStmt is not a map")),
        None => Vec::new(),
    };
    Ok(AttestationObject {
        fmt,
        auth_data,
        att_stmt,
    })
}
