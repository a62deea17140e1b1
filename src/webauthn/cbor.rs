//! CBOR processing for `WebAuthn`
//!
//! Thin helpers over `ciborium` for decoding attestation objects, COSE keys
//! and extension maps out of authenticator data.

use ciborium::value::Value;
use thiserror::Error;

/// Error produced by the `ciborium` decoder
pub type CiboriumError = ciborium::de::Error<std::io::Error>;

/// CBOR decoding failure
#[derive(Debug, Error)]
pub enum CborError {
    #[error("invalid CBOR: {0}")]
    Decode(#[from] CiboriumError),
    #[error("{0} trailing bytes after CBOR item")]
    TrailingBytes(usize),
    #[error("unexpected CBOR structure: {0}")]
    Shape(&'static str),
}

/// Decode one CBOR item from the front of `bytes`
///
/// Returns the item and the number of bytes it occupied, so the caller can
/// continue with whatever follows it.
///
/// # Errors
/// Returns an error if no complete CBOR item can be decoded.
pub fn decode_prefix(bytes: &[u8]) -> Result<(Value, usize), CborError> {
    let mut reader = bytes;
    let value: Value = ciborium::de::from_reader(&mut reader)?;
    Ok((value, bytes.len() - reader.len()))
}

/// Decode a buffer that must contain exactly one CBOR item
///
/// # Errors
/// Returns an error if decoding fails or bytes remain after the item.
pub fn decode_exact(bytes: &[u8]) -> Result<Value, CborError> {
    let (value, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(CborError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(value)
}

/// Decode an authenticator extension map (text keys only)
///
/// # Errors
/// Returns an error if the bytes are not exactly one CBOR map keyed by text.
pub fn decode_extensions(bytes: &[u8]) -> Result<Vec<(String, Value)>, CborError> {
    let Value::Map(entries) = decode_exact(bytes)? else {
        return Err(CborError::Shape("extensions are not a map"));
    };
    entries
        .into_iter()
        .map(|(key, value)| match key {
            Value::Text(name) => Ok((name, value)),
            _ => Err(CborError::Shape("extension identifier is not text")),
        })
        .collect()
}

/// Look up a text key in a CBOR map
#[must_use]
pub fn get_text_key<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Look up an integer key in a CBOR map (COSE labels)
#[must_use]
pub fn get_int_key(map: &[(Value, Value)], key: i64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

/// Read a CBOR integer as `i64`
#[must_use]
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => i64::try_from(*i).ok(),
        _ => None,
    }
}

/// Encode a CBOR value to bytes
///
/// # Errors
/// Returns an error if the writer fails.
pub fn encode(value: &Value) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)?;
    Ok(buf)
}
