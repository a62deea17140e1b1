//! Authenticator model names by AAGUID
//!
//! The registry is loaded once (bundled data or a JSON file) and shared by
//! reference afterwards. Lookups never fail.

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use thiserror::Error;
use uuid::Uuid;

/// Name returned for AAGUIDs missing from the registry
pub const UNKNOWN_AUTHENTICATOR: &str = "Unknown Authenticator";

const BUNDLED_AAGUIDS: &str = include_str!("../../data/aaguid.json");

#[derive(Debug, Error)]
pub enum AaguidError {
    #[error("no AAGUID provided")]
    Empty,
    #[error("invalid AAGUID {aaguid}")]
    Invalid {
        aaguid: String,
        #[source]
        source: uuid::Error,
    },
    #[error("failed to read AAGUID file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse AAGUID JSON")]
    Json(#[from] serde_json::Error),
}

/// Parse an AAGUID in hyphenated or bare hex form
///
/// # Errors
/// Returns `Empty` for an empty string and `Invalid` for anything that is
/// not a UUID.
pub fn parse_aaguid(text: &str) -> Result<Uuid, AaguidError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AaguidError::Empty);
    }
    Uuid::parse_str(text).map_err(|source| AaguidError::Invalid {
        aaguid: text.to_string(),
        source,
    })
}

/// Canonical hyphenated lower-case form of an AAGUID string
///
/// # Errors
/// Same as [`parse_aaguid`].
pub fn normalize_aaguid(text: &str) -> Result<String, AaguidError> {
    parse_aaguid(text).map(|uuid| uuid.hyphenated().to_string())
}

/// Immutable AAGUID to display name table
#[derive(Debug, Clone, Default)]
pub struct AaguidRegistry {
    names: HashMap<Uuid, String>,
}

impl AaguidRegistry {
    /// Registry with no entries; every lookup yields the sentinel
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry built from the dataset shipped with the crate
    ///
    /// # Errors
    /// Returns an error if the bundled JSON is malformed.
    pub fn bundled() -> Result<Self, AaguidError> {
        Self::from_json(BUNDLED_AAGUIDS)
    }

    /// Parse a JSON object mapping AAGUID strings to names
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or a key is not a UUID.
    pub fn from_json(json: &str) -> Result<Self, AaguidError> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        let names = raw
            .into_iter()
            .map(|(aaguid, name)| parse_aaguid(&aaguid).map(|uuid| (uuid, name)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        debug!("Loaded {} AAGUID entries", names.len());
        Ok(Self { names })
    }

    /// Load the table from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, AaguidError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Display name for an AAGUID, or [`UNKNOWN_AUTHENTICATOR`]
    #[must_use]
    pub fn resolve(&self, aaguid: &Uuid) -> &str {
        self.names
            .get(aaguid)
            .map_or(UNKNOWN_AUTHENTICATOR, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
