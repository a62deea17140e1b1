//! `WebAuthn` settings implementation
//!
//! This module defines the relying party section of the configuration file.
//! Values are kept as plain strings here and converted into a validated
//! [`RelyingPartyConfig`] when the engine is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::aaguid::{AaguidError, AaguidRegistry};
use super::config::RelyingPartyConfig;
use super::errors::WebAuthnError;

/// `WebAuthn` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebAuthnSettings {
    /// Relying Party ID (usually the domain)
    pub rp_id: String,
    /// Relying Party name (displayed to user)
    pub rp_name: String,
    /// Allowed origins (e.g., <https://example.com>)
    pub rp_origins: Vec<String>,
    /// Timeout in milliseconds advertised to the client
    pub timeout_ms: u32,
    /// User verification requirement ("required", "preferred", "discouraged")
    pub user_verification: String,
    /// Attestation preference ("none", "indirect", "packed")
    pub attestation: String,
    /// Optional JSON file replacing the bundled AAGUID names
    pub aaguid_file: Option<String>,
}

impl Default for WebAuthnSettings {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "WebAuthn RP".to_string(),
            rp_origins: vec!["http://localhost:8080".to_string()],
            timeout_ms: 300_000,
            user_verification: "preferred".to_string(),
            attestation: "none".to_string(),
            aaguid_file: None,
        }
    }
}

impl WebAuthnSettings {
    /// Convert into an engine configuration
    ///
    /// # Errors
    /// Returns `InvalidUserVerification` or `UnsupportedAttestationPreference`
    /// for unknown policy names.
    pub fn to_config(&self) -> Result<RelyingPartyConfig, WebAuthnError> {
        Ok(RelyingPartyConfig {
            rp_id: self.rp_id.clone(),
            rp_display_name: self.rp_name.clone(),
            rp_origins: self.rp_origins.clone(),
            timeout_ms: self.timeout_ms,
            user_verification: self.user_verification.trim().to_ascii_lowercase().parse()?,
            attestation: self.attestation.trim().to_ascii_lowercase().parse()?,
        })
    }

    /// Load the AAGUID registry from the configured file or the bundled data
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_aaguids(&self) -> Result<AaguidRegistry, AaguidError> {
        match &self.aaguid_file {
            Some(path) if !path.is_empty() => AaguidRegistry::from_file(Path::new(path)),
            _ => AaguidRegistry::bundled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::config::{AttestationPreference, UserVerificationRequirement};
    use crate::webauthn::errors::ErrorKind;

    #[test]
    fn test_default_settings_convert() {
        let config = WebAuthnSettings::default().to_config().unwrap();
        assert_eq!(config.rp_id, "localhost");
        assert_eq!(config.user_verification, UserVerificationRequirement::Preferred);
        assert_eq!(config.attestation, AttestationPreference::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_names_are_case_insensitive() {
        let settings = WebAuthnSettings {
            user_verification: "Required".to_string(),
            attestation: " INDIRECT ".to_string(),
            ..WebAuthnSettings::default()
        };
        let config = settings.to_config().unwrap();
        assert_eq!(config.user_verification, UserVerificationRequirement::Required);
        assert_eq!(config.attestation, AttestationPreference::Indirect);
    }

    #[test]
    fn test_unknown_policies_are_config_errors() {
        let settings = WebAuthnSettings {
            attestation: "direct".to_string(),
            ..WebAuthnSettings::default()
        };
        let err = settings.to_config().unwrap_err();
        assert!(matches!(err, WebAuthnError::UnsupportedAttestationPreference(_)));
        assert_eq!(err.kind(), ErrorKind::Config);

        let settings = WebAuthnSettings {
            user_verification: "sometimes".to_string(),
            ..WebAuthnSettings::default()
        };
        assert!(matches!(
            settings.to_config(),
            Err(WebAuthnError::InvalidUserVerification(_))
        ));
    }

    #[test]
    fn test_load_aaguids() {
        assert!(!WebAuthnSettings::default().load_aaguids().unwrap().is_empty());
        let missing = WebAuthnSettings {
            aaguid_file: Some("/nonexistent/aaguid.json".to_string()),
            ..WebAuthnSettings::default()
        };
        assert!(matches!(missing.load_aaguids(), Err(AaguidError::Io(_))));
    }
}
