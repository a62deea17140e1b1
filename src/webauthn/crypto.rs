//! `WebAuthn` cryptography helpers
//!
//! Challenge generation, hashing and the constant-time RP ID hash check.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

use super::errors::WebAuthnError;

/// Number of random bytes in a ceremony challenge (256 bits)
pub const CHALLENGE_LENGTH: usize = 32;

/// Generate a secure random challenge
///
/// # Errors
/// Returns `RandomSource` if the system random source fails.
pub fn generate_challenge() -> Result<String, WebAuthnError> {
    let mut bytes = [0u8; CHALLENGE_LENGTH];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| WebAuthnError::RandomSource)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash data using SHA-256
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

/// Compare a received RP ID hash with `sha256(rp_id)` in constant time
#[must_use]
pub fn rp_id_hash_matches(rp_id: &str, received: &[u8]) -> bool {
    constant_time_eq::constant_time_eq(&sha256(rp_id.as_bytes()), received)
}

/// Failure of strict base64url decoding
#[derive(Debug, Error)]
pub enum Base64UrlError {
    #[error("failed to decode base64url")]
    Decode(#[from] base64::DecodeError),
    #[error("decoded base64url data is empty")]
    Empty,
}

/// Decode unpadded base64url, rejecting empty payloads
///
/// # Errors
/// Returns an error if the input is not valid base64url or decodes to nothing.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, Base64UrlError> {
    let bytes = URL_SAFE_NO_PAD.decode(input)?;
    if bytes.is_empty() {
        return Err(Base64UrlError::Empty);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_is_32_random_bytes() {
        let first = generate_challenge().unwrap();
        let second = generate_challenge().unwrap();
        assert_ne!(first, second);
        // 32 bytes encode to 43 unpadded characters
        assert_eq!(first.len(), 43);
        assert!(!first.contains('='));
        assert_eq!(URL_SAFE_NO_PAD.decode(&first).unwrap().len(), CHALLENGE_LENGTH);
    }

    #[test]
    fn test_rp_id_hash_matches() {
        let hash = sha256(b"example.com");
        assert!(rp_id_hash_matches("example.com", &hash));
        assert!(!rp_id_hash_matches("example.org", &hash));

        let mut last_byte_differs = hash;
        last_byte_differs[31] ^= 0x01;
        assert!(!rp_id_hash_matches("example.com", &last_byte_differs));

        let mut first_byte_differs = hash;
        first_byte_differs[0] ^= 0x80;
        assert!(!rp_id_hash_matches("example.com", &first_byte_differs));

        assert!(!rp_id_hash_matches("example.com", &hash[..31]));
        assert!(!rp_id_hash_matches("example.com", &[]));
    }

    #[test]
    fn test_sha256_known_vector() {
        let hash = sha256(b"abc");
        assert_eq!(
            hash[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256('abc') starts with ba7816bf"
        );
    }

    #[test]
    fn test_decode_base64url() {
        assert_eq!(decode_base64url("aGVsbG8").unwrap(), b"hello");
        assert!(matches!(decode_base64url(""), Err(Base64UrlError::Empty)));
        assert!(matches!(
            decode_base64url("not base64!"),
            Err(Base64UrlError::Decode(_))
        ));
        // padded input is not accepted by the unpadded engine
        assert!(decode_base64url("aGVsbG8=").is_err());
    }
}
