//! Authenticator data parsing
//!
//! Layout (big-endian):
//! - 32 bytes: RP ID hash
//! - 1 byte: flags
//! - 4 bytes: signature counter
//! - if AT: 16 bytes AAGUID, 2 bytes credential ID length (L),
//!   L bytes credential ID, then the COSE public key
//! - if ED: CBOR extension map

use ciborium::value::Value;
use log::{debug, warn};
use uuid::Uuid;

use super::cbor;
use super::cose::CoseKey;
use super::errors::WebAuthnError;
use super::reader::ByteReader;

/// Length of the fixed header (RP ID hash, flags, counter)
pub const HEADER_LENGTH: usize = 37;

/// Length of the AAGUID plus the credential ID length field
pub const ATTESTED_HEADER_LENGTH: usize = 18;

/// COSE key label for `kty`
const COSE_KEY_TYPE_LABEL: i64 = 1;

/// Authenticator data flag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKED_UP: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// UP, bit 0
    #[must_use]
    pub const fn user_present(self) -> bool {
        self.is_set(Self::USER_PRESENT)
    }

    /// UV, bit 2
    #[must_use]
    pub const fn user_verified(self) -> bool {
        self.is_set(Self::USER_VERIFIED)
    }

    #[must_use]
    pub const fn backup_eligible(self) -> bool {
        self.is_set(Self::BACKUP_ELIGIBLE)
    }

    #[must_use]
    pub const fn backed_up(self) -> bool {
        self.is_set(Self::BACKED_UP)
    }

    /// AT, bit 6
    #[must_use]
    pub const fn has_attested_credential_data(self) -> bool {
        self.is_set(Self::ATTESTED_CREDENTIAL_DATA)
    }

    /// ED, bit 7
    #[must_use]
    pub const fn has_extension_data(self) -> bool {
        self.is_set(Self::EXTENSION_DATA)
    }
}

/// Credential material present when the AT flag is set
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData<'a> {
    pub aaguid: Uuid,
    pub credential_id: &'a [u8],
    /// COSE-encoded public key; empty when an unparseable key was
    /// tolerated because the ED flag is set
    pub public_key: &'a [u8],
}

/// Authenticator extension outputs present when the ED flag is set
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorExtensions<'a> {
    pub raw: &'a [u8],
    pub entries: Vec<(String, Value)>,
}

impl AuthenticatorExtensions<'_> {
    /// Look up an extension output by identifier
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == identifier)
            .map(|(_, value)| value)
    }
}

/// Decoded authenticator data, borrowing from the raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAuthenticatorData<'a> {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorFlags,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredentialData<'a>>,
    pub extensions: Option<AuthenticatorExtensions<'a>>,
}

impl<'a> ParsedAuthenticatorData<'a> {
    /// Parse raw authenticator data
    ///
    /// # Errors
    /// - `TooShort` if fewer than 37 bytes are given
    /// - `TooShortAttested` / `TooShortCredentialId` if the attested block is truncated
    /// - `MissingAttestedKeyData` if AT is set, ED is clear and no key bytes remain
    /// - `InvalidPublicKey` if the key is not a well-formed COSE key and ED is clear
    /// - `MissingExtensionData` / `ExtensionDecode` for a bad extension block
    pub fn parse(data: &'a [u8]) -> Result<Self, WebAuthnError> {
        if data.len() < HEADER_LENGTH {
            return Err(WebAuthnError::TooShort { len: data.len() });
        }

        let mut reader = ByteReader::new(data);
        let too_short = |_| WebAuthnError::TooShort { len: data.len() };
        let rp_id_hash = reader.take_array::<32>().map_err(too_short)?;
        let flags = AuthenticatorFlags::from_bits(reader.read_u8().map_err(too_short)?);
        let sign_count = reader.read_u32_be().map_err(too_short)?;

        let attested_credential = if flags.has_attested_credential_data() {
            Some(parse_attested_credential(&mut reader, flags)?)
        } else {
            None
        };

        let extensions = if flags.has_extension_data() {
            Some(parse_extensions(&mut reader)?)
        } else {
            None
        };

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential,
            extensions,
        })
    }

    #[must_use]
    pub fn aaguid(&self) -> Option<Uuid> {
        self.attested_credential.as_ref().map(|a| a.aaguid)
    }

    #[must_use]
    pub fn credential_id(&self) -> Option<&'a [u8]> {
        self.attested_credential.as_ref().map(|a| a.credential_id)
    }

    /// COSE public key bytes, if any were identified
    #[must_use]
    pub fn public_key(&self) -> Option<&'a [u8]> {
        self.attested_credential
            .as_ref()
            .map(|a| a.public_key)
            .filter(|key| !key.is_empty())
    }

    /// Serialize the parsed fields back into authenticator data
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LENGTH);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(self.flags.bits());
        out.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some(attested) = &self.attested_credential {
            out.extend_from_slice(attested.aaguid.as_bytes());
            // the length was read from a u16 field
            let len = u16::try_from(attested.credential_id.len()).unwrap_or(u16::MAX);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(attested.credential_id);
            out.extend_from_slice(attested.public_key);
        }
        if let Some(extensions) = &self.extensions {
            out.extend_from_slice(extensions.raw);
        }
        out
    }
}

fn parse_attested_credential<'a>(
    reader: &mut ByteReader<'a>,
    flags: AuthenticatorFlags,
) -> Result<AttestedCredentialData<'a>, WebAuthnError> {
    if reader.remaining() < ATTESTED_HEADER_LENGTH {
        return Err(WebAuthnError::TooShortAttested {
            remaining: reader.remaining(),
        });
    }
    let attested_too_short = |e: super::reader::Insufficient| WebAuthnError::TooShortAttested {
        remaining: e.remaining,
    };
    let aaguid = Uuid::from_bytes(reader.take_array::<16>().map_err(attested_too_short)?);
    let credential_id_len = usize::from(reader.read_u16_be().map_err(attested_too_short)?);
    let credential_id =
        reader
            .take(credential_id_len)
            .map_err(|e| WebAuthnError::TooShortCredentialId {
                expected: credential_id_len,
                remaining: e.remaining,
            })?;

    let rest = reader.rest();
    let public_key = if rest.is_empty() {
        if !flags.has_extension_data() {
            return Err(WebAuthnError::MissingAttestedKeyData);
        }
        rest
    } else if flags.has_extension_data() {
        // Extension data follows the key, so only a leading COSE item is the key.
        // An unsupported key that is still an integer-keyed CBOR map is kept
        // as opaque bytes; anything else is left for the extension block.
        match CoseKey::from_prefix(rest) {
            Ok((_, consumed)) => reader.take(consumed).map_err(attested_too_short)?,
            Err(e) => match cbor::decode_prefix(rest) {
                Ok((Value::Map(entries), consumed))
                    if cbor::get_int_key(&entries, COSE_KEY_TYPE_LABEL).is_some() =>
                {
                    warn!("Keeping unsupported credential public key as opaque bytes: {e}");
                    reader.take(consumed).map_err(attested_too_short)?
                }
                _ => {
                    warn!(
                        "Tolerating unparseable credential public key because ED flag is set: {e}"
                    );
                    &rest[..0]
                }
            },
        }
    } else {
        CoseKey::from_bytes(rest).map_err(|e| WebAuthnError::InvalidPublicKey {
            source: Box::new(e),
        })?;
        reader.take(rest.len()).map_err(attested_too_short)?
    };

    Ok(AttestedCredentialData {
        aaguid,
        credential_id,
        public_key,
    })
}

fn parse_extensions<'a>(
    reader: &mut ByteReader<'a>,
) -> Result<AuthenticatorExtensions<'a>, WebAuthnError> {
    if reader.is_empty() {
        return Err(WebAuthnError::MissingExtensionData);
    }
    let raw = reader.rest();
    let entries = cbor::decode_extensions(raw).map_err(|e| WebAuthnError::ExtensionDecode {
        source: Box::new(e),
    })?;
    reader
        .advance(raw.len())
        .map_err(|_| WebAuthnError::MissingExtensionData)?;
    debug!(
        "Parsed authenticator extensions: {:?}",
        entries.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>()
    );
    Ok(AuthenticatorExtensions { raw, entries })
}
