//! Relying party configuration and origin validation
//!
//! The configuration is validated once when the engine is built. Allowed
//! origins are pre-parsed into lower-cased (scheme, host) pairs so that
//! every ceremony only has to parse the candidate origin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::WebAuthnError;

/// Attestation conveyance preference sent to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationPreference {
    #[default]
    None,
    Indirect,
    Packed,
}

impl AttestationPreference {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Indirect => "indirect",
            Self::Packed => "packed",
        }
    }
}

impl FromStr for AttestationPreference {
    type Err = WebAuthnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "indirect" => Ok(Self::Indirect),
            "packed" => Ok(Self::Packed),
            other => Err(WebAuthnError::UnsupportedAttestationPreference(
                other.to_string(),
            )),
        }
    }
}

impl fmt::Display for AttestationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User verification requirement for ceremonies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

impl UserVerificationRequirement {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

impl FromStr for UserVerificationRequirement {
    type Err = WebAuthnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "required" => Ok(Self::Required),
            "preferred" => Ok(Self::Preferred),
            "discouraged" => Ok(Self::Discouraged),
            other => Err(WebAuthnError::InvalidUserVerification(other.to_string())),
        }
    }
}

impl fmt::Display for UserVerificationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relying party identity and ceremony defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    /// Relying Party ID (e.g., "example.com")
    pub rp_id: String,
    /// Relying Party display name (e.g., "Example Corp")
    pub rp_display_name: String,
    /// Allowed origins (e.g., `https://example.com`, `https://login.example.com:2137`)
    pub rp_origins: Vec<String>,
    /// Timeout advertised to the client, in milliseconds
    pub timeout_ms: u32,
    pub user_verification: UserVerificationRequirement,
    pub attestation: AttestationPreference,
}

impl RelyingPartyConfig {
    /// Validate the configuration and pre-parse its origins
    ///
    /// # Errors
    /// Returns a configuration error if:
    /// - The origin list is empty
    /// - The RP ID or display name is empty
    /// - The timeout is zero
    /// - Any origin fails URL parsing or lacks a scheme or host
    pub fn validate(&self) -> Result<OriginValidator, WebAuthnError> {
        if self.rp_origins.is_empty() {
            return Err(WebAuthnError::NoOrigins);
        }
        if self.rp_id.is_empty() {
            return Err(WebAuthnError::EmptyRpId);
        }
        if self.rp_display_name.is_empty() {
            return Err(WebAuthnError::EmptyRpDisplayName);
        }
        if self.timeout_ms == 0 {
            return Err(WebAuthnError::InvalidTimeout);
        }
        OriginValidator::new(&self.rp_origins)
    }
}

/// An allowed origin reduced to its lower-cased scheme and host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedOrigin {
    scheme: String,
    host: String,
}

impl NormalizedOrigin {
    /// Parse an origin into its (scheme, host) pair
    ///
    /// The host is the authority exactly as written, so an explicit port
    /// (`example.com:1234`, and also `example.com:443`) stays part of it.
    /// Returns `Ok(None)` when the string is a URL without a host.
    fn parse(origin: &str) -> Result<Option<Self>, url::ParseError> {
        let url = Url::parse(origin)?;
        if url.host_str().map_or(true, str::is_empty) {
            return Ok(None);
        }
        let Some(host) = authority(origin) else {
            return Ok(None);
        };
        Ok(Some(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
        }))
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Host and port of a `scheme://authority/...` string, without user info
///
/// `Url` drops default ports, which would make `https://example.com:443`
/// equal to `https://example.com`.
fn authority(origin: &str) -> Option<&str> {
    let (_, rest) = origin.split_once("://")?;
    let end = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    (!host.is_empty()).then_some(host)
}

/// Case-insensitive matcher over the configured origins
#[derive(Debug, Clone)]
pub struct OriginValidator {
    allowed: Vec<NormalizedOrigin>,
}

impl OriginValidator {
    /// Build a validator from configured origin strings
    ///
    /// # Errors
    /// Returns `NoOrigins` for an empty list and `InvalidOrigin` for an
    /// origin that cannot be parsed or lacks a scheme or host.
    pub fn new(origins: &[String]) -> Result<Self, WebAuthnError> {
        if origins.is_empty() {
            return Err(WebAuthnError::NoOrigins);
        }
        let allowed = origins
            .iter()
            .map(|origin| match NormalizedOrigin::parse(origin) {
                Ok(Some(parsed)) => Ok(parsed),
                Ok(None) => Err(WebAuthnError::InvalidOrigin {
                    origin: origin.clone(),
                    reason: "missing scheme or host".to_string(),
                }),
                Err(e) => Err(WebAuthnError::InvalidOrigin {
                    origin: origin.clone(),
                    reason: e.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { allowed })
    }

    /// Check a client-reported origin against the allowed list
    ///
    /// Only scheme and host (including an explicit port) take part in the
    /// comparison, both case-insensitively.
    ///
    /// # Errors
    /// Returns `OriginParse` if the origin is not a URL and
    /// `OriginNotAllowed` if it matches no configured origin.
    pub fn is_allowed_origin(&self, origin: &str) -> Result<bool, WebAuthnError> {
        let candidate =
            NormalizedOrigin::parse(origin).map_err(|source| WebAuthnError::OriginParse {
                origin: origin.to_string(),
                source,
            })?;
        match candidate {
            Some(candidate) if self.allowed.contains(&candidate) => Ok(true),
            _ => Err(WebAuthnError::OriginNotAllowed(origin.to_string())),
        }
    }

    /// Normalized allowed origins, in configuration order
    #[must_use]
    pub fn allowed(&self) -> &[NormalizedOrigin] {
        &self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::errors::ErrorKind;

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig {
            rp_id: "example.com".to_string(),
            rp_display_name: "Example".to_string(),
            rp_origins: vec![
                "https://example.com".to_string(),
                "https://login.example.com:2137".to_string(),
            ],
            timeout_ms: 60_000,
            user_verification: UserVerificationRequirement::Preferred,
            attestation: AttestationPreference::None,
        }
    }

    #[test]
    fn test_valid_config_normalizes_origins() {
        let validator = config().validate().unwrap();
        let hosts: Vec<&str> = validator.allowed().iter().map(NormalizedOrigin::host).collect();
        assert_eq!(hosts, vec!["example.com", "login.example.com:2137"]);
        assert!(validator.allowed().iter().all(|o| o.scheme() == "https"));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut c = config();
        c.rp_origins.clear();
        assert!(matches!(c.validate(), Err(WebAuthnError::NoOrigins)));

        let mut c = config();
        c.rp_id.clear();
        assert!(matches!(c.validate(), Err(WebAuthnError::EmptyRpId)));

        let mut c = config();
        c.rp_display_name.clear();
        assert!(matches!(c.validate(), Err(WebAuthnError::EmptyRpDisplayName)));

        let mut c = config();
        c.timeout_ms = 0;
        assert!(matches!(c.validate(), Err(WebAuthnError::InvalidTimeout)));

        for bad in ["not a url", "localhost:8080", "/relative/path"] {
            let mut c = config();
            c.rp_origins = vec![bad.to_string()];
            let err = c.validate().unwrap_err();
            assert!(
                matches!(err, WebAuthnError::InvalidOrigin { .. }),
                "origin {bad} should be rejected, got {err:?}"
            );
            assert_eq!(err.kind(), ErrorKind::Config);
        }
    }

    #[test]
    fn test_origin_matching_is_case_insensitive() {
        let validator = config().validate().unwrap();
        assert!(validator.is_allowed_origin("HTTPS://Example.COM").unwrap());
        assert!(validator.is_allowed_origin("https://example.com/some/path").unwrap());
        assert!(validator
            .is_allowed_origin("https://LOGIN.example.com:2137")
            .unwrap());
    }

    #[test]
    fn test_port_is_part_of_host() {
        let validator = config().validate().unwrap();
        assert!(matches!(
            validator.is_allowed_origin("https://example.com:1234"),
            Err(WebAuthnError::OriginNotAllowed(_))
        ));
        assert!(matches!(
            validator.is_allowed_origin("https://login.example.com"),
            Err(WebAuthnError::OriginNotAllowed(_))
        ));
    }

    #[test]
    fn test_default_port_is_not_implied() {
        let validator = config().validate().unwrap();
        assert!(matches!(
            validator.is_allowed_origin("https://example.com:443"),
            Err(WebAuthnError::OriginNotAllowed(_))
        ));

        let validator =
            OriginValidator::new(&["https://Example.com:443".to_string()]).unwrap();
        assert_eq!(validator.allowed()[0].host(), "example.com:443");
        assert!(validator.is_allowed_origin("https://example.com:443/").unwrap());
        assert!(validator.is_allowed_origin("https://user@example.com:443").unwrap());
        assert!(matches!(
            validator.is_allowed_origin("https://example.com"),
            Err(WebAuthnError::OriginNotAllowed(_))
        ));
    }

    #[test]
    fn test_disallowed_and_unparseable_origins() {
        let validator = config().validate().unwrap();
        assert!(matches!(
            validator.is_allowed_origin("http://example.com"),
            Err(WebAuthnError::OriginNotAllowed(_))
        ));
        assert!(matches!(
            validator.is_allowed_origin("https://evil.com"),
            Err(WebAuthnError::OriginNotAllowed(_))
        ));
        let err = validator.is_allowed_origin("").unwrap_err();
        assert!(matches!(err, WebAuthnError::OriginParse { .. }));
        assert_eq!(err.kind(), ErrorKind::Origin);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(
            "required".parse::<UserVerificationRequirement>().unwrap(),
            UserVerificationRequirement::Required
        );
        assert_eq!(
            "indirect".parse::<AttestationPreference>().unwrap(),
            AttestationPreference::Indirect
        );
        assert!(matches!(
            "sometimes".parse::<UserVerificationRequirement>(),
            Err(WebAuthnError::InvalidUserVerification(_))
        ));
        assert!(matches!(
            "enterprise".parse::<AttestationPreference>(),
            Err(WebAuthnError::UnsupportedAttestationPreference(_))
        ));
        assert_eq!(
            serde_json::to_string(&UserVerificationRequirement::Discouraged).unwrap(),
            "\"discouraged\""
        );
    }
}
