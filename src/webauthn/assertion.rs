//! Assertion validation for the authentication ceremony

use log::debug;

use super::authenticator_data::ParsedAuthenticatorData;
use super::client_data::{ClientData, TYPE_GET};
use super::config::OriginValidator;
use super::cose::CoseKey;
use super::crypto::{self, decode_base64url};
use super::errors::WebAuthnError;
use super::types::{LoginData, ValidationOutput};

/// Anti-cloning counter rule
///
/// A counter must strictly increase, except that authenticators which never
/// count may report zero forever.
///
/// # Errors
/// Returns `SignCountRegression` otherwise.
pub fn check_sign_count(received: u32, stored: u32) -> Result<(), WebAuthnError> {
    if received > stored || (received == 0 && stored == 0) {
        Ok(())
    } else {
        Err(WebAuthnError::SignCountRegression { received, stored })
    }
}

/// Bytes covered by an assertion signature
#[must_use]
pub fn signed_message(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(auth_data.len() + 32);
    message.extend_from_slice(auth_data);
    message.extend_from_slice(&crypto::sha256(client_data_json));
    message
}

pub(crate) fn validate_assertion(
    rp_id: &str,
    origins: &OriginValidator,
    data: &LoginData,
) -> Result<ValidationOutput, WebAuthnError> {
    let (client_data, client_data_raw) = ClientData::from_base64url(&data.client_data_json)?;
    client_data.expect_type(TYPE_GET)?;
    origins.is_allowed_origin(&client_data.origin)?;

    let auth_data_raw = decode_base64url(&data.authenticator_data).map_err(|e| {
        WebAuthnError::AuthenticatorDataDecode {
            source: Box::new(e),
        }
    })?;
    let auth_data = ParsedAuthenticatorData::parse(&auth_data_raw)?;
    if !crypto::rp_id_hash_matches(rp_id, &auth_data.rp_id_hash) {
        return Err(WebAuthnError::RpIdHashMismatch);
    }
    if !auth_data.flags.user_present() {
        return Err(WebAuthnError::UserPresentFlagNotSet);
    }
    let user_verified = auth_data.flags.user_verified();

    let signature = decode_base64url(&data.signature).map_err(|e| {
        WebAuthnError::SignatureDecode {
            source: Box::new(e),
        }
    })?;

    let message = signed_message(&auth_data_raw, &client_data_raw);
    let key = CoseKey::from_bytes(&data.public_key).map_err(|e| {
        WebAuthnError::SignatureVerification {
            source: Box::new(e),
        }
    })?;
    let valid = key
        .verify(&message, &signature)
        .map_err(|e| WebAuthnError::SignatureVerification {
            source: Box::new(e),
        })?;
    if !valid {
        return Err(WebAuthnError::InvalidSignature);
    }

    check_sign_count(auth_data.sign_count, data.stored_sign_count)?;
    debug!(
        "Assertion verified with {:?} key, sign count {} -> {}",
        key.algorithm(),
        data.stored_sign_count,
        auth_data.sign_count
    );

    Ok(ValidationOutput {
        new_sign_count: auth_data.sign_count,
        user_verified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_count_rule() {
        assert!(check_sign_count(6, 5).is_ok());
        assert!(check_sign_count(0, 0).is_ok());
        assert!(check_sign_count(1, 0).is_ok());
        assert!(check_sign_count(u32::MAX, 0).is_ok());
        assert!(matches!(
            check_sign_count(5, 5),
            Err(WebAuthnError::SignCountRegression {
                received: 5,
                stored: 5
            })
        ));
        assert!(check_sign_count(4, 5).is_err());
        assert!(check_sign_count(0, 1).is_err());
    }

    #[test]
    fn test_sign_count_rule_exhaustive_small_grid() {
        for stored in 0..8u32 {
            for received in 0..8u32 {
                let accepted = check_sign_count(received, stored).is_ok();
                assert_eq!(
                    accepted,
                    received > stored || (received == 0 && stored == 0),
                    "stored={stored} received={received}"
                );
            }
        }
    }

    #[test]
    fn test_signed_message_layout() {
        let message = signed_message(&[1, 2, 3], b"{}");
        assert_eq!(message.len(), 35);
        assert_eq!(&message[..3], &[1, 2, 3]);
        assert_eq!(&message[3..], &crypto::sha256(b"{}"));
    }
}
