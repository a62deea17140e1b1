//! `WebAuthn` relying party engine
//!
//! This module provides the ceremony validation engine independent of any
//! storage or transport. It parses authenticator output, checks origins and
//! RP binding, verifies signatures and enforces the signature counter rule.

pub mod aaguid;
mod assertion;
pub mod attestation;
pub mod authenticator_data;
pub mod browser;
pub mod cbor;
pub mod client_data;
pub mod config;
pub mod cose;
pub mod crypto;
mod errors;
mod reader;
mod service;
mod settings;
mod types;

// Re-exports for public use
pub use aaguid::{parse_aaguid, AaguidError, AaguidRegistry, UNKNOWN_AUTHENTICATOR};
pub use assertion::{check_sign_count, signed_message};
pub use attestation::{AttestationFormat, AttestationObject};
pub use authenticator_data::{AuthenticatorFlags, ParsedAuthenticatorData};
pub use browser::{BrowserPayloadError, PublicKeyCredential, PublicKeyCredentialAssertion};
pub use client_data::ClientData;
pub use config::{
    AttestationPreference, NormalizedOrigin, OriginValidator, RelyingPartyConfig,
    UserVerificationRequirement,
};
pub use cose::{CoseAlgorithm, CoseKey};
pub use crypto::generate_challenge;
pub use errors::{ErrorKind, ParseStage, WebAuthnError};
pub use reader::{ByteReader, Insufficient};
pub use service::{WebAuthnService, OFFERED_ALGORITHMS};
pub use settings::WebAuthnSettings;
pub use types::*;
