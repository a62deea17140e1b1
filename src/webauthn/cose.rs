//! COSE public keys
//!
//! Parses the `COSE_Key` encoding found in attested credential data and
//! verifies assertion signatures with `ring`.

use ciborium::value::Value;
use ring::signature;
use thiserror::Error;

use super::cbor::{self, CborError};

// COSE key labels
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
const LABEL_N: i64 = -1;
const LABEL_E: i64 = -2;

// Key types
const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

// Curves
const CRV_P256: i64 = 1;
const CRV_P384: i64 = 2;
const CRV_ED25519: i64 = 6;

/// Smallest RSA modulus `ring` verifies with (2048 bits)
const MIN_RSA_MODULUS_LEN: usize = 256;

/// COSE signature algorithms the engine can verify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    /// ECDSA w/ SHA-256
    Es256,
    /// ECDSA w/ SHA-384
    Es384,
    /// RSASSA-PKCS1-v1_5 w/ SHA-256
    Rs256,
    /// EdDSA (Ed25519)
    EdDsa,
}

impl CoseAlgorithm {
    /// COSE algorithm identifier
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Es384 => -35,
            Self::Rs256 => -257,
            Self::EdDsa => -8,
        }
    }

    /// Look up an algorithm by its COSE identifier
    #[must_use]
    pub const fn from_id(id: i64) -> Option<Self> {
        match id {
            -7 => Some(Self::Es256),
            -35 => Some(Self::Es384),
            -257 => Some(Self::Rs256),
            -8 => Some(Self::EdDsa),
            _ => None,
        }
    }
}

/// COSE key parse or verification failure
#[derive(Debug, Error)]
pub enum CoseError {
    #[error("error parsing COSE key data: {0}")]
    Cbor(#[from] CborError),
    #[error("COSE key is not a map")]
    NotAMap,
    #[error("COSE key is missing or has an invalid {0}")]
    InvalidField(&'static str),
    #[error("unsupported COSE key type {0}")]
    UnsupportedKeyType(i64),
    #[error("unsupported COSE algorithm {0}")]
    UnsupportedAlgorithm(i64),
    #[error("unsupported curve {curve} for algorithm {alg}")]
    UnsupportedCurve { curve: i64, alg: i64 },
    #[error("RSA modulus of {0} bytes is too small to verify")]
    RsaKeyTooSmall(usize),
}

/// Key material of a parsed COSE key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Elliptic curve point as SEC1 uncompressed bytes (`0x04 || x || y`)
    Ec2 { point: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
    /// Ed25519 public key
    Okp { x: Vec<u8> },
}

/// A credential public key decoded from its COSE encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    algorithm: CoseAlgorithm,
    material: KeyMaterial,
}

impl CoseKey {
    /// Parse a buffer holding exactly one COSE key
    ///
    /// # Errors
    /// Returns an error if the bytes are not a well-formed, supported COSE key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoseError> {
        Self::from_value(&cbor::decode_exact(bytes)?)
    }

    /// Parse a COSE key from the front of `bytes`
    ///
    /// Returns the key and the number of bytes it occupied.
    ///
    /// # Errors
    /// Returns an error if no well-formed, supported COSE key starts the buffer.
    pub fn from_prefix(bytes: &[u8]) -> Result<(Self, usize), CoseError> {
        let (value, consumed) = cbor::decode_prefix(bytes)?;
        Ok((Self::from_value(&value)?, consumed))
    }

    /// Interpret a decoded CBOR value as a COSE key
    ///
    /// # Errors
    /// Returns an error for unsupported key types, algorithms or curves and
    /// for missing or malformed parameters.
    pub fn from_value(value: &Value) -> Result<Self, CoseError> {
        let Value::Map(map) = value else {
            return Err(CoseError::NotAMap);
        };

        let kty = int_field(map, LABEL_KTY, "kty")?;
        let alg_id = int_field(map, LABEL_ALG, "alg")?;
        let algorithm =
            CoseAlgorithm::from_id(alg_id).ok_or(CoseError::UnsupportedAlgorithm(alg_id))?;

        let material = match (kty, algorithm) {
            (KTY_EC2, CoseAlgorithm::Es256 | CoseAlgorithm::Es384) => {
                let curve = int_field(map, LABEL_CRV, "crv")?;
                let coordinate_len = match (curve, algorithm) {
                    (CRV_P256, CoseAlgorithm::Es256) => 32,
                    (CRV_P384, CoseAlgorithm::Es384) => 48,
                    _ => {
                        return Err(CoseError::UnsupportedCurve {
                            curve,
                            alg: alg_id,
                        })
                    }
                };
                let x = bytes_field(map, LABEL_X, "x")?;
                let y = bytes_field(map, LABEL_Y, "y")?;
                if x.len() != coordinate_len {
                    return Err(CoseError::InvalidField("x"));
                }
                if y.len() != coordinate_len {
                    return Err(CoseError::InvalidField("y"));
                }
                let mut point = Vec::with_capacity(1 + 2 * coordinate_len);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                KeyMaterial::Ec2 { point }
            }
            (KTY_RSA, CoseAlgorithm::Rs256) => {
                let n = bytes_field(map, LABEL_N, "n")?;
                let e = bytes_field(map, LABEL_E, "e")?;
                if n.is_empty() {
                    return Err(CoseError::InvalidField("n"));
                }
                if e.is_empty() {
                    return Err(CoseError::InvalidField("e"));
                }
                KeyMaterial::Rsa {
                    n: n.clone(),
                    e: e.clone(),
                }
            }
            (KTY_OKP, CoseAlgorithm::EdDsa) => {
                let curve = int_field(map, LABEL_CRV, "crv")?;
                if curve != CRV_ED25519 {
                    return Err(CoseError::UnsupportedCurve {
                        curve,
                        alg: alg_id,
                    });
                }
                let x = bytes_field(map, LABEL_X, "x")?;
                if x.len() != 32 {
                    return Err(CoseError::InvalidField("x"));
                }
                KeyMaterial::Okp { x: x.clone() }
            }
            (KTY_EC2 | KTY_RSA | KTY_OKP, _) => {
                return Err(CoseError::UnsupportedAlgorithm(alg_id));
            }
            (other, _) => return Err(CoseError::UnsupportedKeyType(other)),
        };

        Ok(Self {
            algorithm,
            material,
        })
    }

    #[must_use]
    pub const fn algorithm(&self) -> CoseAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub const fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Verify `signature` over `message`
    ///
    /// Returns `Ok(false)` for a structurally valid key whose signature
    /// does not match.
    ///
    /// # Errors
    /// Returns an error if the key cannot be used for verification at all.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, CoseError> {
        let outcome = match (&self.material, self.algorithm) {
            (KeyMaterial::Ec2 { point }, CoseAlgorithm::Es256) => {
                signature::UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, point)
                    .verify(message, signature)
            }
            (KeyMaterial::Ec2 { point }, CoseAlgorithm::Es384) => {
                signature::UnparsedPublicKey::new(&signature::ECDSA_P384_SHA384_ASN1, point)
                    .verify(message, signature)
            }
            (KeyMaterial::Rsa { n, e }, CoseAlgorithm::Rs256) => {
                let modulus_len = n.iter().skip_while(|b| **b == 0).count();
                if modulus_len < MIN_RSA_MODULUS_LEN {
                    return Err(CoseError::RsaKeyTooSmall(modulus_len));
                }
                signature::RsaPublicKeyComponents { n, e }.verify(
                    &signature::RSA_PKCS1_2048_8192_SHA256,
                    message,
                    signature,
                )
            }
            (KeyMaterial::Okp { x }, CoseAlgorithm::EdDsa) => {
                signature::UnparsedPublicKey::new(&signature::ED25519, x)
                    .verify(message, signature)
            }
            _ => return Err(CoseError::UnsupportedAlgorithm(self.algorithm.id())),
        };
        Ok(outcome.is_ok())
    }
}

fn int_field(map: &[(Value, Value)], label: i64, name: &'static str) -> Result<i64, CoseError> {
    cbor::get_int_key(map, label)
        .and_then(cbor::as_i64)
        .ok_or(CoseError::InvalidField(name))
}

fn bytes_field<'a>(
    map: &'a [(Value, Value)],
    label: i64,
    name: &'static str,
) -> Result<&'a Vec<u8>, CoseError> {
    cbor::get_int_key(map, label)
        .and_then(Value::as_bytes)
        .ok_or(CoseError::InvalidField(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair};

    fn int(v: i64) -> Value {
        Value::Integer(v.into())
    }

    fn ec2_map(point: &[u8]) -> Value {
        Value::Map(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(-7)),
            (int(LABEL_CRV), int(CRV_P256)),
            (int(LABEL_X), Value::Bytes(point[1..33].to_vec())),
            (int(LABEL_Y), Value::Bytes(point[33..65].to_vec())),
        ])
    }

    fn p256_key_pair() -> EcdsaKeyPair {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
                .unwrap();
        EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .unwrap()
    }

    #[test]
    fn test_es256_key_verifies_signature() {
        let rng = SystemRandom::new();
        let key_pair = p256_key_pair();
        let bytes = cbor::encode(&ec2_map(key_pair.public_key().as_ref())).unwrap();

        let key = CoseKey::from_bytes(&bytes).unwrap();
        assert_eq!(key.algorithm(), CoseAlgorithm::Es256);

        let message = b"authenticator data || client data hash";
        let sig = key_pair.sign(&rng, message).unwrap();
        assert!(key.verify(message, sig.as_ref()).unwrap());
        assert!(!key.verify(b"something else", sig.as_ref()).unwrap());
        assert!(!key.verify(message, &[0x30, 0x00]).unwrap());
    }

    #[test]
    fn test_ed25519_key_verifies_signature() {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let map = Value::Map(vec![
            (int(LABEL_KTY), int(KTY_OKP)),
            (int(LABEL_ALG), int(-8)),
            (int(LABEL_CRV), int(CRV_ED25519)),
            (
                int(LABEL_X),
                Value::Bytes(key_pair.public_key().as_ref().to_vec()),
            ),
        ]);
        let key = CoseKey::from_value(&map).unwrap();
        let sig = key_pair.sign(b"message");
        assert!(key.verify(b"message", sig.as_ref()).unwrap());
        assert!(!key.verify(b"tampered", sig.as_ref()).unwrap());
    }

    #[test]
    fn test_prefix_parse_reports_key_length() {
        let key_pair = p256_key_pair();
        let mut bytes = cbor::encode(&ec2_map(key_pair.public_key().as_ref())).unwrap();
        let key_len = bytes.len();
        bytes.extend_from_slice(&[0xA0]);
        let (_, consumed) = CoseKey::from_prefix(&bytes).unwrap();
        assert_eq!(consumed, key_len);
        assert!(CoseKey::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_malformed_keys_rejected() {
        assert!(matches!(
            CoseKey::from_value(&Value::Array(vec![])),
            Err(CoseError::NotAMap)
        ));

        let missing_alg = Value::Map(vec![(int(LABEL_KTY), int(KTY_EC2))]);
        assert!(matches!(
            CoseKey::from_value(&missing_alg),
            Err(CoseError::InvalidField("alg"))
        ));

        let unknown_kty = Value::Map(vec![(int(LABEL_KTY), int(9)), (int(LABEL_ALG), int(-7))]);
        assert!(matches!(
            CoseKey::from_value(&unknown_kty),
            Err(CoseError::UnsupportedKeyType(9))
        ));

        let wrong_curve = Value::Map(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(-7)),
            (int(LABEL_CRV), int(CRV_P384)),
        ]);
        assert!(matches!(
            CoseKey::from_value(&wrong_curve),
            Err(CoseError::UnsupportedCurve { .. })
        ));

        let short_x = Value::Map(vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), int(-7)),
            (int(LABEL_CRV), int(CRV_P256)),
            (int(LABEL_X), Value::Bytes(vec![1; 31])),
            (int(LABEL_Y), Value::Bytes(vec![1; 32])),
        ]);
        assert!(matches!(
            CoseKey::from_value(&short_x),
            Err(CoseError::InvalidField("x"))
        ));

        assert!(matches!(
            CoseKey::from_bytes(&[0xFF, 0x00]),
            Err(CoseError::Cbor(_))
        ));
    }

    #[test]
    fn test_small_rsa_key_cannot_verify() {
        let map = Value::Map(vec![
            (int(LABEL_KTY), int(KTY_RSA)),
            (int(LABEL_ALG), int(-257)),
            (int(LABEL_N), Value::Bytes(vec![0xC1; 128])),
            (int(LABEL_E), Value::Bytes(vec![0x01, 0x00, 0x01])),
        ]);
        let key = CoseKey::from_value(&map).unwrap();
        assert_eq!(key.algorithm(), CoseAlgorithm::Rs256);
        assert!(matches!(
            key.verify(b"message", &[0u8; 128]),
            Err(CoseError::RsaKeyTooSmall(128))
        ));
    }

    #[test]
    fn test_rsa_signature_mismatch_is_not_an_error() {
        let map = Value::Map(vec![
            (int(LABEL_KTY), int(KTY_RSA)),
            (int(LABEL_ALG), int(-257)),
            (int(LABEL_N), Value::Bytes(vec![0xC1; 256])),
            (int(LABEL_E), Value::Bytes(vec![0x01, 0x00, 0x01])),
        ]);
        let key = CoseKey::from_value(&map).unwrap();
        assert!(!key.verify(b"message", &[0u8; 256]).unwrap());
    }

    // RSA-2048 key and PKCS#1 v1.5 SHA-256 signature generated with openssl
    const RSA_MODULUS: &str = concat!(
        "687hcAr6G7BV6CIHCQHzm0TsZ0BUnnGui0PzQUI0LgdbOL2mXWoU1mciyXVlt5VB",
        "zGzukOS92A1wZuiJRVFEEnn_iYo6byKi57E430u80Kcz4_e2ij-baCX1_CK5cMDV",
        "Rc4vF2_KBn8BhTOOOLdnHoww24V7sLcJLjfEupR0et6sXo8NRfPSpJ8_PRf5NmTc",
        "8ypn7dXTE2oJ2I1As1MmjV7_4v6bxpgG4c2mnm8gK5AJZXWRHwcGhwBu3pFyIyky",
        "WEiCJCnCqjgSonUaOvv2DdgGekxf-CfUm0e1-nDygOzqCC_-ckI9wgIKB4pYr8NW",
        "FgSn5Z_DPKVfquHjq5n2aQ",
    );
    const RSA_SIGNATURE: &str = concat!(
        "Bj_DSm-ug3oSdoBs_iFaKvj-v57eg91_AIg_pItdtQUuOgTqQ-L_o__yksfVa7A7",
        "CwzBVhGOZA1QtzyH37k9WaW85pF4nuqVKlhGTnWUe7V34BhpHpKSqgsc98iz5ZTC",
        "cnAC4M-esJg2MdcJfdVELYeHgmNyS4g4VqqxcmnnVAEpR_slkGaX2yDD5fis0nLN",
        "evDtziIX7D7NbRnYuAFvbks8AzAVgpsYKEcaIb4Ho7IAv_gtKVf5Blaie_Z9hxfr",
        "pP1VWc6AJF2g0hnGB5Xmqpal3o_zOSjICQ3WfJpLLxzYHCspcVsOlMDPzWYk1rfX",
        "U1D-vx0cR8zbXCHZFGnGJw",
    );
    const RSA_MESSAGE: &[u8] = b"webauthn rs256 test message";

    #[test]
    fn test_rs256_known_signature_verifies() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

        let n = URL_SAFE_NO_PAD.decode(RSA_MODULUS).unwrap();
        assert_eq!(n.len(), 256);
        let signature = URL_SAFE_NO_PAD.decode(RSA_SIGNATURE).unwrap();
        let map = Value::Map(vec![
            (int(LABEL_KTY), int(KTY_RSA)),
            (int(LABEL_ALG), int(-257)),
            (int(LABEL_N), Value::Bytes(n)),
            (int(LABEL_E), Value::Bytes(vec![0x01, 0x00, 0x01])),
        ]);
        let key = CoseKey::from_bytes(&cbor::encode(&map).unwrap()).unwrap();
        assert!(key.verify(RSA_MESSAGE, &signature).unwrap());
        assert!(!key.verify(b"webauthn rs256 test messagf", &signature).unwrap());

        let mut tampered = signature;
        tampered[0] ^= 0x01;
        assert!(!key.verify(RSA_MESSAGE, &tampered).unwrap());
    }
}
