//! `WebAuthn` error types
//!
//! Every failure carries a machine-checkable [`ErrorKind`] and, where one
//! exists, the underlying cause as its `source()`.

use thiserror::Error;

/// Boxed underlying cause of a failure
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a `WebAuthn` failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad relying party setup, fatal at construction
    Config,
    /// Unparseable or disallowed origin
    Origin,
    /// Malformed client data, authenticator data, attestation or extension CBOR
    Parse,
    /// A security check rejected the ceremony
    Security,
    /// Unsupported attestation format or missing credential material
    Format,
    /// The engine itself failed (random source)
    Internal,
}

/// Which decoding stage a parse failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStage {
    ClientData,
    AuthenticatorData,
    AttestationObject,
    Extensions,
    Signature,
}

/// `WebAuthn` errors that can occur during ceremonies
#[derive(Debug, Error)]
pub enum WebAuthnError {
    // Configuration
    #[error("RP ID cannot be empty")]
    EmptyRpId,

    #[error("RP display name cannot be empty")]
    EmptyRpDisplayName,

    #[error("timeout must be greater than 0")]
    InvalidTimeout,

    #[error("at least one RP origin is required")]
    NoOrigins,

    #[error("invalid RP origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("unsupported attestation preference: {0}")]
    UnsupportedAttestationPreference(String),

    #[error("invalid user verification requirement: {0}")]
    InvalidUserVerification(String),

    // Origin
    #[error("error parsing origin {origin}")]
    OriginParse {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),

    // Parse
    #[error("failed to parse client data")]
    ParseClientData {
        #[source]
        source: Cause,
    },

    #[error("failed to decode authenticator data")]
    AuthenticatorDataDecode {
        #[source]
        source: Cause,
    },

    #[error("auth data too short, expected at least 37 bytes, got {len}")]
    TooShort { len: usize },

    #[error("auth data too short for attested credential data header, {remaining} bytes remain")]
    TooShortAttested { remaining: usize },

    #[error("auth data too short for credential ID of {expected} bytes, {remaining} bytes remain")]
    TooShortCredentialId { expected: usize, remaining: usize },

    #[error("AT flag set, but no data remains for public key")]
    MissingAttestedKeyData,

    #[error("ED flag set, but no data remains for extensions")]
    MissingExtensionData,

    #[error("failed to decode extension data")]
    ExtensionDecode {
        #[source]
        source: Cause,
    },

    #[error("failed to decode attestation object")]
    AttestationDecode {
        #[source]
        source: Cause,
    },

    #[error("failed to decode signature")]
    SignatureDecode {
        #[source]
        source: Cause,
    },

    // Security
    #[error("client data type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error("RP ID hash mismatch")]
    RpIdHashMismatch,

    #[error("flag User Present not set")]
    UserPresentFlagNotSet,

    #[error("flag User Verified not set")]
    UserVerifiedFlagNotSet,

    #[error("signature verification error")]
    SignatureVerification {
        #[source]
        source: Cause,
    },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signature count regression: received {received}, stored {stored}")]
    SignCountRegression { received: u32, stored: u32 },

    // Format
    #[error("unsupported attestation format received: {0}")]
    UnsupportedAttestationFormat(String),

    #[error("missing public key")]
    MissingPublicKey,

    #[error("invalid public key format")]
    InvalidPublicKey {
        #[source]
        source: Cause,
    },

    #[error("missing credential ID")]
    MissingCredentialId,

    // Internal
    #[error("secure random source failed")]
    RandomSource,
}

impl WebAuthnError {
    /// Classify the error for logging and metrics
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyRpId
            | Self::EmptyRpDisplayName
            | Self::InvalidTimeout
            | Self::NoOrigins
            | Self::InvalidOrigin { .. }
            | Self::UnsupportedAttestationPreference(_)
            | Self::InvalidUserVerification(_) => ErrorKind::Config,
            Self::OriginParse { .. } | Self::OriginNotAllowed(_) => ErrorKind::Origin,
            Self::ParseClientData { .. }
            | Self::AuthenticatorDataDecode { .. }
            | Self::TooShort { .. }
            | Self::TooShortAttested { .. }
            | Self::TooShortCredentialId { .. }
            | Self::MissingAttestedKeyData
            | Self::MissingExtensionData
            | Self::ExtensionDecode { .. }
            | Self::AttestationDecode { .. }
            | Self::SignatureDecode { .. } => ErrorKind::Parse,
            Self::TypeMismatch { .. }
            | Self::RpIdHashMismatch
            | Self::UserPresentFlagNotSet
            | Self::UserVerifiedFlagNotSet
            | Self::SignatureVerification { .. }
            | Self::InvalidSignature
            | Self::SignCountRegression { .. } => ErrorKind::Security,
            Self::UnsupportedAttestationFormat(_)
            | Self::MissingPublicKey
            | Self::InvalidPublicKey { .. }
            | Self::MissingCredentialId => ErrorKind::Format,
            Self::RandomSource => ErrorKind::Internal,
        }
    }

    /// The decoding stage that failed, for parse errors
    #[must_use]
    pub fn parse_stage(&self) -> Option<ParseStage> {
        match self {
            Self::ParseClientData { .. } => Some(ParseStage::ClientData),
            Self::AuthenticatorDataDecode { .. }
            | Self::TooShort { .. }
            | Self::TooShortAttested { .. }
            | Self::TooShortCredentialId { .. }
            | Self::MissingAttestedKeyData
            | Self::MissingExtensionData => Some(ParseStage::AuthenticatorData),
            Self::ExtensionDecode { .. } => Some(ParseStage::Extensions),
            Self::AttestationDecode { .. } => Some(ParseStage::AttestationObject),
            Self::SignatureDecode { .. } => Some(ParseStage::Signature),
            _ => None,
        }
    }
}
